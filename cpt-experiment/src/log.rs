use cpt_core::{Classification, ResponseRecord, StimulusType};
use serde::Serialize;

/// Append-only record of one test run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SessionLog {
    records: Vec<ResponseRecord>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, record: ResponseRecord) {
        self.records.push(record);
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[ResponseRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResponseRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&ResponseRecord> {
        self.records.last()
    }

    pub fn tally(&self) -> Tally {
        Tally::from_records(&self.records)
    }

    pub fn to_vec(&self) -> Vec<ResponseRecord> {
        self.records.clone()
    }
}

impl FromIterator<ResponseRecord> for SessionLog {
    fn from_iter<I: IntoIterator<Item = ResponseRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SessionLog {
    type Item = &'a ResponseRecord;
    type IntoIter = std::slice::Iter<'a, ResponseRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Outcome counts over a set of records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub hits: usize,
    pub misses: usize,
    pub commissions: usize,
    pub timing_errors: usize,
    pub targets: usize,
    pub non_targets: usize,
}

impl Tally {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ResponseRecord>) -> Self {
        let mut t = Tally::default();
        for r in records {
            match r.classification {
                Classification::Hit => t.hits += 1,
                Classification::Miss => t.misses += 1,
                Classification::Commission => t.commissions += 1,
                Classification::TimingError => t.timing_errors += 1,
            }
            match r.stimulus_type {
                StimulusType::Target => t.targets += 1,
                StimulusType::NonTarget => t.non_targets += 1,
            }
        }
        t
    }

    pub fn total(&self) -> usize {
        self.targets + self.non_targets
    }
}
