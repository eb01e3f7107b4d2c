//! Per-key running accumulators.
//!
//! Each accumulator folds one record's measures at a time without keeping
//! raw values, and merges with another accumulator of the same kind so that
//! shards of a stream can be folded independently. Every merge is a plain
//! monoidal combine (sums and counts add, min/max combine), hence
//! associative and commutative.

use std::collections::BTreeSet;

use gradestat_types::error::{GradeStatError, Result};
use gradestat_types::group_key::KeyPart;

use crate::result::{DistinctValues, MeasureSummary, Spread, Summary};
use crate::spec::{AccumulatorKind, AggregationSpec};

/// Mean accumulator: `{count, sum}` per measure.
#[derive(Clone, Debug, PartialEq)]
pub struct MeanAccumulator {
    count: u64,
    sums: Vec<f64>,
}

impl MeanAccumulator {
    pub fn new(num_measures: usize) -> Self {
        MeanAccumulator {
            count: 0,
            sums: vec![0.0; num_measures],
        }
    }

    pub fn add(&mut self, measures: &[f64]) {
        self.count += 1;
        for (sum, x) in self.sums.iter_mut().zip(measures) {
            *sum += x;
        }
    }

    pub fn merge(&mut self, other: &MeanAccumulator) -> Result<()> {
        check_width(self.sums.len(), other.sums.len())?;
        self.count += other.count;
        for (sum, o) in self.sums.iter_mut().zip(&other.sums) {
            *sum += o;
        }
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn means(&self) -> Vec<f64> {
        if self.count == 0 {
            return vec![f64::NAN; self.sums.len()];
        }
        self.sums.iter().map(|s| s / self.count as f64).collect()
    }

    fn finalize(&self, spec: &AggregationSpec) -> Summary {
        Summary {
            count: self.count,
            measures: spec
                .measures()
                .iter()
                .zip(self.means())
                .map(|(m, mean)| MeasureSummary {
                    name: m.name.clone(),
                    mean,
                    spread: None,
                })
                .collect(),
            distinct: Vec::new(),
        }
    }
}

/// Running moments of one measure.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Moments {
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
}

impl Moments {
    fn new() -> Self {
        Moments {
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn add(&mut self, x: f64) {
        self.sum += x;
        self.sum_sq += x * x;
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    fn merge(&mut self, other: &Moments) {
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    fn spread(&self, count: u64) -> (f64, Spread) {
        let n = count as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        (
            mean,
            Spread {
                min: self.min,
                max: self.max,
                variance,
                std_dev: variance.sqrt(),
            },
        )
    }
}

/// Detailed stats accumulator: `{count, sum, sum_of_squares, min, max}` per
/// measure. Variance is the population variance.
#[derive(Clone, Debug, PartialEq)]
pub struct DetailedStatsAccumulator {
    count: u64,
    moments: Vec<Moments>,
}

impl DetailedStatsAccumulator {
    pub fn new(num_measures: usize) -> Self {
        DetailedStatsAccumulator {
            count: 0,
            moments: vec![Moments::new(); num_measures],
        }
    }

    pub fn add(&mut self, measures: &[f64]) {
        self.count += 1;
        for (m, x) in self.moments.iter_mut().zip(measures) {
            m.add(*x);
        }
    }

    pub fn merge(&mut self, other: &DetailedStatsAccumulator) -> Result<()> {
        check_width(self.moments.len(), other.moments.len())?;
        self.count += other.count;
        for (m, o) in self.moments.iter_mut().zip(&other.moments) {
            m.merge(o);
        }
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    fn finalize(&self, spec: &AggregationSpec) -> Summary {
        Summary {
            count: self.count,
            measures: spec
                .measures()
                .iter()
                .zip(&self.moments)
                .map(|(m, moments)| {
                    let (mean, spread) = moments.spread(self.count);
                    MeasureSummary {
                        name: m.name.clone(),
                        mean,
                        spread: Some(spread),
                    }
                })
                .collect(),
            distinct: Vec::new(),
        }
    }
}

/// Means plus the distinct values of some categorical fields.
#[derive(Clone, Debug, PartialEq)]
pub struct SetCollectionAccumulator {
    mean: MeanAccumulator,
    sets: Vec<BTreeSet<KeyPart>>,
}

impl SetCollectionAccumulator {
    pub fn new(num_measures: usize, num_sets: usize) -> Self {
        SetCollectionAccumulator {
            mean: MeanAccumulator::new(num_measures),
            sets: vec![BTreeSet::new(); num_sets],
        }
    }

    pub fn add(&mut self, measures: &[f64], labels: &[KeyPart]) {
        self.mean.add(measures);
        for (set, label) in self.sets.iter_mut().zip(labels) {
            if !set.contains(label) {
                set.insert(label.clone());
            }
        }
    }

    pub fn merge(&mut self, other: &SetCollectionAccumulator) -> Result<()> {
        check_width(self.sets.len(), other.sets.len())?;
        self.mean.merge(&other.mean)?;
        for (set, o) in self.sets.iter_mut().zip(&other.sets) {
            set.extend(o.iter().cloned());
        }
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.mean.count()
    }

    fn finalize(&self, spec: &AggregationSpec) -> Summary {
        let mut summary = self.mean.finalize(spec);
        summary.distinct = spec
            .collected_fields()
            .iter()
            .zip(&self.sets)
            .map(|(field, set)| DistinctValues {
                field: *field,
                values: set.iter().map(|v| v.to_string()).collect(),
            })
            .collect();
        summary
    }
}

/// Running state for one `(spec, key)` pair.
#[derive(Clone, Debug, PartialEq)]
pub enum Accumulator {
    Mean(MeanAccumulator),
    DetailedStats(DetailedStatsAccumulator),
    SetCollection(SetCollectionAccumulator),
}

impl Accumulator {
    pub fn new(kind: &AccumulatorKind, num_measures: usize) -> Self {
        match kind {
            AccumulatorKind::Mean => Accumulator::Mean(MeanAccumulator::new(num_measures)),
            AccumulatorKind::DetailedStats => {
                Accumulator::DetailedStats(DetailedStatsAccumulator::new(num_measures))
            }
            AccumulatorKind::SetCollection { fields } => Accumulator::SetCollection(
                SetCollectionAccumulator::new(num_measures, fields.len()),
            ),
        }
    }

    /// Fold one record's measures (and collected labels) into the state.
    pub fn add(&mut self, measures: &[f64], labels: &[KeyPart]) {
        match self {
            Accumulator::Mean(a) => a.add(measures),
            Accumulator::DetailedStats(a) => a.add(measures),
            Accumulator::SetCollection(a) => a.add(measures, labels),
        }
    }

    pub fn merge(&mut self, other: &Accumulator) -> Result<()> {
        match (self, other) {
            (Accumulator::Mean(a), Accumulator::Mean(b)) => a.merge(b),
            (Accumulator::DetailedStats(a), Accumulator::DetailedStats(b)) => a.merge(b),
            (Accumulator::SetCollection(a), Accumulator::SetCollection(b)) => a.merge(b),
            (a, b) => Err(GradeStatError::Merge(format!(
                "cannot merge {} accumulator into {}",
                b.kind_name(),
                a.kind_name()
            ))),
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            Accumulator::Mean(a) => a.count(),
            Accumulator::DetailedStats(a) => a.count(),
            Accumulator::SetCollection(a) => a.count(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Accumulator::Mean(_) => "mean",
            Accumulator::DetailedStats(_) => "detailed-stats",
            Accumulator::SetCollection(_) => "set-collection",
        }
    }

    /// Convert the running state into an immutable summary.
    pub fn finalize(&self, spec: &AggregationSpec) -> Summary {
        match self {
            Accumulator::Mean(a) => a.finalize(spec),
            Accumulator::DetailedStats(a) => a.finalize(spec),
            Accumulator::SetCollection(a) => a.finalize(spec),
        }
    }
}

fn check_width(ours: usize, theirs: usize) -> Result<()> {
    if ours != theirs {
        return Err(GradeStatError::Merge(format!(
            "accumulator widths differ ({} vs {})",
            ours, theirs
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradestat_types::record::Field;

    fn final_grade_spec(spec: AggregationSpec) -> AggregationSpec {
        spec.group_by_field(Field::Gender)
            .measure_fields(&[Field::GradeFinal])
    }

    #[test]
    fn test_mean() {
        let mut agg = MeanAccumulator::new(3);
        agg.add(&[10.0, 12.0, 14.0]);
        agg.add(&[8.0, 10.0, 9.0]);
        assert_eq!(agg.count(), 2);
        assert_eq!(agg.means(), vec![9.0, 11.0, 11.5]);
    }

    #[test]
    fn test_mean_merge_matches_single_pass() {
        let values = [3.0, 7.0, 11.0, 2.0, 19.0, 4.0];
        let mut whole = MeanAccumulator::new(1);
        for v in values {
            whole.add(&[v]);
        }

        let mut left = MeanAccumulator::new(1);
        let mut right = MeanAccumulator::new(1);
        for v in &values[..2] {
            left.add(&[*v]);
        }
        for v in &values[2..] {
            right.add(&[*v]);
        }
        let mut lr = left.clone();
        lr.merge(&right).unwrap();
        let mut rl = right.clone();
        rl.merge(&left).unwrap();

        assert_eq!(lr.count(), whole.count());
        assert!((lr.means()[0] - whole.means()[0]).abs() < 1e-12);
        assert!((rl.means()[0] - whole.means()[0]).abs() < 1e-12);
    }

    #[test]
    fn test_detailed_stats() {
        // 10, 12, 14: mean 12, population variance 8/3
        let spec = final_grade_spec(AggregationSpec::detailed("d"));
        let mut agg = Accumulator::new(spec.kind(), 1);
        for v in [10.0, 12.0, 14.0] {
            agg.add(&[v], &[]);
        }
        let summary = agg.finalize(&spec);
        assert_eq!(summary.count, 3);
        let m = &summary.measures[0];
        assert!((m.mean - 12.0).abs() < 1e-10);
        let spread = m.spread.unwrap();
        assert!((spread.variance - 8.0 / 3.0).abs() < 1e-10);
        assert!((spread.std_dev - 1.632_993_161_855_452).abs() < 1e-10);
        assert_eq!(spread.std_dev, spread.variance.sqrt());
        assert_eq!(spread.min, 10.0);
        assert_eq!(spread.max, 14.0);
    }

    #[test]
    fn test_variance_never_negative() {
        let spec = final_grade_spec(AggregationSpec::detailed("d"));
        let mut agg = Accumulator::new(spec.kind(), 1);
        for _ in 0..1000 {
            agg.add(&[0.1], &[]);
        }
        let spread = agg.finalize(&spec).measures[0].spread.unwrap();
        assert!(spread.variance >= 0.0);
        assert!(spread.std_dev >= 0.0);
    }

    #[test]
    fn test_detailed_merge() {
        let mut a = DetailedStatsAccumulator::new(1);
        let mut b = DetailedStatsAccumulator::new(1);
        a.add(&[10.0]);
        b.add(&[14.0]);
        b.add(&[12.0]);
        a.merge(&b).unwrap();

        let spec = final_grade_spec(AggregationSpec::detailed("d"));
        let spread = Accumulator::DetailedStats(a).finalize(&spec).measures[0]
            .spread
            .unwrap();
        assert_eq!(spread.min, 10.0);
        assert_eq!(spread.max, 14.0);
        assert!((spread.variance - 8.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_set_collection() {
        let spec = AggregationSpec::set_collection("f", &[Field::Address, Field::TravelTime])
            .group_by_field(Field::Failures)
            .measure_fields(&[Field::GradeFinal]);
        let mut agg = spec.new_accumulator();
        agg.add(&[10.0], &[KeyPart::Text("U".into()), KeyPart::Int(2)]);
        agg.add(&[14.0], &[KeyPart::Text("R".into()), KeyPart::Int(1)]);
        agg.add(&[12.0], &[KeyPart::Text("U".into()), KeyPart::Int(1)]);

        let summary = agg.finalize(&spec);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.mean("grade_final"), Some(12.0));
        assert_eq!(
            summary.distinct(Field::Address),
            Some(&["R".to_string(), "U".to_string()][..])
        );
        assert_eq!(
            summary.distinct(Field::TravelTime),
            Some(&["1".to_string(), "2".to_string()][..])
        );
    }

    #[test]
    fn test_merge_kind_mismatch() {
        let mut mean = Accumulator::Mean(MeanAccumulator::new(1));
        let detailed = Accumulator::DetailedStats(DetailedStatsAccumulator::new(1));
        assert!(matches!(mean.merge(&detailed), Err(GradeStatError::Merge(_))));
    }

    #[test]
    fn test_merge_width_mismatch() {
        let mut a = MeanAccumulator::new(1);
        let b = MeanAccumulator::new(3);
        assert!(a.merge(&b).is_err());
    }
}
