//! Session scoring.
//!
//! Every metric whose denominator is empty is defined as 0 so that an
//! aborted or very short run still yields a well-formed result.

use cpt_core::{BlockCondition, Classification, ResponseRecord, SessionResult, StimulusType};
use serde::Serialize;

use crate::log::{SessionLog, Tally};

/// The four session metrics without the raw log
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Metrics {
    pub attentiveness: f64,
    pub timeliness: f64,
    pub impulsivity: f64,
    pub hyperactivity: f64,
}

fn percent(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        100.0 * numerator as f64 / denominator as f64
    }
}

/// Computes the metrics over any subset of records.
///
/// `timeliness` re-derives each hit's latency from its timestamps and
/// subtracts `offset_ms` once.
pub fn metrics<'a>(records: impl IntoIterator<Item = &'a ResponseRecord> + Clone, offset_ms: f64) -> Metrics {
    let tally = Tally::from_records(records.clone());

    let mut rt_sum = 0.0;
    let mut rt_count = 0usize;
    for r in records {
        if !r.is(Classification::Hit) {
            continue;
        }
        if let Some(rt) = r.raw_reaction_time_ms() {
            rt_sum += rt - offset_ms;
            rt_count += 1;
        }
    }
    let timeliness = if rt_count == 0 {
        0.0
    } else {
        rt_sum / rt_count as f64
    };

    Metrics {
        attentiveness: percent(tally.hits, tally.targets),
        timeliness,
        impulsivity: percent(tally.commissions, tally.non_targets),
        hyperactivity: percent(tally.timing_errors, tally.total()),
    }
}

/// Scores a finished session.
pub fn score(log: &SessionLog, offset_ms: f64) -> SessionResult {
    let m = metrics(log.records(), offset_ms);
    SessionResult {
        attentiveness: m.attentiveness,
        timeliness: m.timeliness,
        impulsivity: m.impulsivity,
        hyperactivity: m.hyperactivity,
        raw_log: log.to_vec(),
    }
}

/// Metrics restricted to one block distractor condition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionScore {
    pub condition: BlockCondition,
    pub label: &'static str,
    pub tally: Tally,
    pub metrics: Metrics,
}

/// Breaks the session down by distractor condition, in the order each
/// condition first appears in the log.
pub fn score_by_condition(log: &SessionLog, offset_ms: f64) -> Vec<ConditionScore> {
    let mut conditions: Vec<BlockCondition> = Vec::new();
    for r in log {
        let c = r.condition();
        if !conditions.contains(&c) {
            conditions.push(c);
        }
    }

    conditions
        .into_iter()
        .map(|condition| {
            let subset: Vec<&ResponseRecord> =
                log.iter().filter(|r| r.condition() == condition).collect();
            ConditionScore {
                condition,
                label: condition.label(),
                tally: Tally::from_records(subset.iter().copied()),
                metrics: metrics(subset.iter().copied(), offset_ms),
            }
        })
        .collect()
}

/// Non-target records that were not commissions, i.e. presses that fell
/// outside every window after a non-target.
pub fn non_target_timing_errors(log: &SessionLog) -> usize {
    log.iter()
        .filter(|r| {
            r.stimulus_type == StimulusType::NonTarget && r.is(Classification::TimingError)
        })
        .count()
}
