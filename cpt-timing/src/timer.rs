/// Handle to one armed timer. Tokens are generation-counted, so a token for
/// a timer that was replaced or canceled can never touch its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    generation: u64,
}

/// When a timer counts as due relative to its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Due once `now >= deadline`.
    Inclusive,
    /// Due once `now > deadline`; an event at exactly the deadline still
    /// happens before the timer.
    Exclusive,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    token: TimerToken,
    due_ms: f64,
    boundary: Boundary,
    tag: T,
}

/// A timer that fired
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expired<T> {
    pub token: TimerToken,
    pub due_ms: f64,
    pub tag: T,
}

/// Single-shot, cancelable delay holding at most one pending timer.
///
/// Nothing runs by itself: the owner polls with the current time and gets
/// the expired tag back, which keeps every transition on the caller's
/// thread.
#[derive(Debug, Clone)]
pub struct TimerSlot<T> {
    pending: Option<Pending<T>>,
    generation: u64,
}

impl<T: Copy> TimerSlot<T> {
    pub fn new() -> Self {
        Self {
            pending: None,
            generation: 0,
        }
    }

    /// Arms `tag` to fire `delay_ms` after `from_ms`, replacing any timer
    /// already pending.
    pub fn after(&mut self, from_ms: f64, delay_ms: f64, tag: T) -> TimerToken {
        self.arm(from_ms + delay_ms, Boundary::Inclusive, tag)
    }

    /// Like [`TimerSlot::after`] but with an exclusive deadline.
    pub fn after_exclusive(&mut self, from_ms: f64, delay_ms: f64, tag: T) -> TimerToken {
        self.arm(from_ms + delay_ms, Boundary::Exclusive, tag)
    }

    fn arm(&mut self, due_ms: f64, boundary: Boundary, tag: T) -> TimerToken {
        self.generation += 1;
        let token = TimerToken {
            generation: self.generation,
        };
        self.pending = Some(Pending {
            token,
            due_ms,
            boundary,
            tag,
        });
        token
    }

    /// Cancels the timer behind `token`. Returns false when that timer
    /// already fired, was canceled, or was replaced.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        match &self.pending {
            Some(p) if p.token == token => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Drops whatever is pending.
    pub fn clear(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<f64> {
        self.pending.as_ref().map(|p| p.due_ms)
    }

    pub fn pending_tag(&self) -> Option<T> {
        self.pending.as_ref().map(|p| p.tag)
    }

    /// Takes the pending timer if it is due at `now_ms`.
    pub fn take_due(&mut self, now_ms: f64) -> Option<Expired<T>> {
        let due = match &self.pending {
            Some(p) => match p.boundary {
                Boundary::Inclusive => now_ms >= p.due_ms,
                Boundary::Exclusive => now_ms > p.due_ms,
            },
            None => false,
        };
        if !due {
            return None;
        }
        self.pending.take().map(|p| Expired {
            token: p.token,
            due_ms: p.due_ms,
            tag: p.tag,
        })
    }
}

impl<T: Copy> Default for TimerSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
