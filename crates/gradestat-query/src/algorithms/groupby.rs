//! Streaming hash group-by.
//!
//! An [`AccumulatorTable`] maps grouping keys to running accumulators for a
//! single spec. Entries are created on the first record seen for a key and
//! never removed before finalization, so memory is proportional to the
//! number of distinct keys rather than the number of records.

use std::collections::HashMap;
use std::sync::Arc;

use gradestat_types::error::{GradeStatError, Result};
use gradestat_types::group_key::{GroupKey, KeyPart};
use gradestat_types::record::Record;

use crate::algorithms::aggregators::Accumulator;
use crate::result::{GroupSummary, SpecResult};
use crate::spec::AggregationSpec;

pub struct AccumulatorTable {
    spec: Arc<AggregationSpec>,
    groups: HashMap<GroupKey, Accumulator>,
    // Reused per record to avoid reallocating.
    measures: Vec<f64>,
    labels: Vec<KeyPart>,
}

impl AccumulatorTable {
    pub fn new(spec: Arc<AggregationSpec>) -> Self {
        AccumulatorTable {
            spec,
            groups: HashMap::new(),
            measures: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn spec(&self) -> &AggregationSpec {
        &self.spec
    }

    /// Fold `measures` (and collected `labels`) into the entry for `key`.
    pub fn update(&mut self, key: GroupKey, measures: &[f64], labels: &[KeyPart]) {
        let spec = &self.spec;
        self.groups
            .entry(key)
            .or_insert_with(|| spec.new_accumulator())
            .add(measures, labels);
    }

    /// Extract key, measures and labels from `record` and fold them.
    pub fn fold(&mut self, record: &Record) {
        let key = self.spec.key(record);
        let mut measures = std::mem::take(&mut self.measures);
        let mut labels = std::mem::take(&mut self.labels);
        self.spec.extract_measures(record, &mut measures);
        self.spec.extract_labels(record, &mut labels);
        self.update(key, &measures, &labels);
        self.measures = measures;
        self.labels = labels;
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, key: &GroupKey) -> Option<&Accumulator> {
        self.groups.get(key)
    }

    /// Combine a table built from another shard of the same stream.
    pub fn merge(&mut self, other: AccumulatorTable) -> Result<()> {
        if self.spec.name() != other.spec.name() {
            return Err(GradeStatError::Merge(format!(
                "cannot merge table for `{}` into `{}`",
                other.spec.name(),
                self.spec.name()
            )));
        }
        for (key, acc) in other.groups {
            match self.groups.get_mut(&key) {
                Some(existing) => existing.merge(&acc)?,
                None => {
                    self.groups.insert(key, acc);
                }
            }
        }
        Ok(())
    }

    /// Finalize every group, sorted by key. Consumes the table.
    pub fn finalize(self) -> SpecResult {
        let mut groups: Vec<GroupSummary> = self
            .groups
            .into_iter()
            .map(|(key, acc)| GroupSummary {
                summary: acc.finalize(&self.spec),
                key,
            })
            .collect();
        groups.sort_by(|a, b| a.key.cmp(&b.key));

        SpecResult {
            name: self.spec.name().to_string(),
            groups,
        }
    }
}
