use std::time::{Duration, Instant};

/// Monotonic millisecond time source that can also wait
pub trait Clock: Clone {
    /// Milliseconds since an arbitrary, fixed epoch.
    fn now_ms(&self) -> f64;

    /// Blocks (or, for virtual clocks, jumps) until `deadline_ms`.
    /// Returns immediately when the deadline has already passed.
    fn sleep_until(&mut self, deadline_ms: f64);

    fn elapsed_ms(&self, since_ms: f64) -> f64 {
        (self.now_ms() - since_ms).max(0.0)
    }
}

/// Wall clock backed by `Instant`, sleeping with the platform's most
/// precise primitive.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1_000.0
    }

    /// Sleeps again after an early wake, e.g. an interrupted
    /// `clock_nanosleep`, until the deadline has really passed.
    fn sleep_until(&mut self, deadline_ms: f64) {
        loop {
            let remaining = deadline_ms - self.now_ms();
            if remaining <= 0.0 {
                return;
            }
            high_precision_sleep(Duration::from_secs_f64(remaining / 1_000.0));
        }
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
pub fn high_precision_sleep(duration: Duration) {
    use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

    let req = timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    };

    // SAFETY: `req` is a valid timespec and the remainder pointer may be null
    // for a relative sleep.
    let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut()) };
    if rc != 0 {
        tracing::trace!(rc, "clock_nanosleep interrupted");
    }
}

#[cfg(not(target_os = "linux"))]
pub fn high_precision_sleep(duration: Duration) {
    std::thread::sleep(duration);
}

/// Virtual clock for tests and offline simulation. Time only moves when
/// told to; sleeping jumps straight to the deadline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: f64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now_ms: f64) -> Self {
        Self { now_ms }
    }

    pub fn advance(&mut self, ms: f64) -> f64 {
        self.now_ms += ms.max(0.0);
        self.now_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now_ms
    }

    fn sleep_until(&mut self, deadline_ms: f64) {
        if deadline_ms > self.now_ms {
            self.now_ms = deadline_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_advances() {
        let mut clock = MonotonicClock::new();
        let t1 = clock.now_ms();
        clock.sleep_until(t1 + 5.0);
        let t2 = clock.now_ms();
        assert!(t2 >= t1 + 5.0);
        assert!(clock.elapsed_ms(t1) >= 5.0);
    }

    #[test]
    fn monotonic_sleep_never_returns_before_deadline() {
        let mut clock = MonotonicClock::new();
        let start = clock.now_ms();
        for step in 1..=20 {
            let deadline = start + step as f64 * 0.3;
            clock.sleep_until(deadline);
            assert!(clock.now_ms() >= deadline, "woke early at step {step}");
        }
    }

    #[test]
    fn manual_clock_never_goes_backwards() {
        let mut clock = ManualClock::starting_at(100.0);
        clock.sleep_until(50.0);
        assert_eq!(clock.now_ms(), 100.0);
        clock.sleep_until(250.0);
        assert_eq!(clock.now_ms(), 250.0);
        assert_eq!(clock.advance(-10.0), 250.0);
        assert_eq!(clock.advance(10.0), 260.0);
    }
}
