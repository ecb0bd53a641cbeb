use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cpt_core::SessionResult;
use cpt_experiment::{
    ConditionScore, ExperimentConfig, Interpretation, Runner, Session, SimulatedSubject,
    SubjectProfile,
};
use cpt_timing::{Clock, ManualClock, MonotonicClock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cpt")]
#[command(version, about = "Run a continuous performance test against a simulated subject", long_about = None)]
pub struct Cli {
    /// Seed for the trial sequence; the subject uses seed + 1. Random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// JSON file overriding the protocol defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run against the wall clock instead of simulated time
    #[arg(long)]
    pub realtime: bool,

    /// Write the scored result as JSON to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = 0.9)]
    pub hit_rate: f64,

    #[arg(long, default_value_t = 0.15)]
    pub commission_rate: f64,

    #[arg(long, default_value_t = 350.0)]
    pub mean_rt: f64,

    #[arg(long, default_value_t = 80.0)]
    pub jitter: f64,

    /// Probability of a press between trials
    #[arg(long, default_value_t = 0.05)]
    pub stray_rate: f64,
}

#[derive(Serialize)]
struct Report<'a> {
    seed: u64,
    calibration_offset_ms: f64,
    result: &'a SessionResult,
    interpretation: Interpretation,
    summary: String,
    conditions: Vec<ConditionScore>,
}

pub struct App {
    cli: Cli,
    config: ExperimentConfig,
    seed: u64,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => ExperimentConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ExperimentConfig::default(),
        };
        let seed = cli.seed.unwrap_or_else(|| rand::rng().random());
        Ok(Self { cli, config, seed })
    }

    fn profile(&self) -> SubjectProfile {
        SubjectProfile {
            hit_rate: self.cli.hit_rate,
            commission_rate: self.cli.commission_rate,
            mean_rt_ms: self.cli.mean_rt,
            rt_jitter_ms: self.cli.jitter,
            stray_press_rate: self.cli.stray_rate,
            ..SubjectProfile::default()
        }
    }

    pub fn run(self) -> Result<()> {
        println!("=== CONTINUOUS PERFORMANCE TEST ===");
        println!("Platform: {}", std::env::consts::OS);
        println!(
            "Protocol: {} blocks x {} trials, seed {}",
            self.config.total_blocks(),
            self.config.trials_per_block,
            self.seed
        );
        if self.cli.realtime {
            println!("Clock: wall time (about {} s)\n", self.estimated_secs());
            self.run_with(MonotonicClock::new())
        } else {
            println!("Clock: simulated\n");
            self.run_with(ManualClock::new())
        }
    }

    fn estimated_secs(&self) -> u64 {
        let c = &self.config;
        let trial_ms = c.stimulus_duration_ms + c.response_window_ms + c.inter_stimulus_interval_ms;
        let countdown_ms = f64::from(c.countdown_steps) * c.countdown_step_ms;
        let blocks = c.total_blocks() as f64;
        (blocks * (countdown_ms + f64::from(c.trials_per_block) * trial_ms) / 1_000.0) as u64
    }

    fn run_with<C: Clock>(self, clock: C) -> Result<()> {
        let mut session = Session::seeded(self.config.clone(), self.seed)?;
        let mut subject =
            SimulatedSubject::new(self.profile(), StdRng::seed_from_u64(self.seed.wrapping_add(1)));
        let mut runner = Runner::new(clock);

        let offset = runner.calibrate(&mut session, &mut subject)?;
        println!("Calibration offset: {offset:.0} ms");

        let result = runner.run(&mut session, &mut subject)?;
        let conditions = session.condition_breakdown()?;
        let interpretation = Interpretation::from_result(&result);

        println!("\nResults ({} records):", result.raw_log.len());
        println!("  Attentiveness: {:.1}%", result.attentiveness);
        println!("  Timeliness:    {:.1} ms", result.timeliness);
        println!("  Impulsivity:   {:.1}%", result.impulsivity);
        println!("  Hyperactivity: {:.1}%", result.hyperactivity);
        println!("\n{}", interpretation.summary());

        println!("\nBy condition:");
        for c in &conditions {
            println!(
                "  {:<9} hits {:>2}  misses {:>2}  commissions {:>2}  timing {:>2}  rt {:>6.1} ms",
                c.label,
                c.tally.hits,
                c.tally.misses,
                c.tally.commissions,
                c.tally.timing_errors,
                c.metrics.timeliness
            );
        }

        if let Some(path) = &self.cli.output {
            let report = Report {
                seed: self.seed,
                calibration_offset_ms: offset,
                result: &result,
                interpretation,
                summary: interpretation.summary(),
                conditions,
            };
            let json = serde_json::to_string_pretty(&report)?;
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "result written");
        }

        Ok(())
    }
}
