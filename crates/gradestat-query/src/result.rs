//! Finalized output of a run: per-spec summaries and the decode error report.

use gradestat_types::error::{DecodeError, DecodeErrorKind};
use gradestat_types::group_key::GroupKey;
use gradestat_types::record::Field;

/// Round to `places` decimal places. Applied only when emitting results.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Spread statistics of one measure (detailed-stats specs only).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub min: f64,
    pub max: f64,
    /// Population variance, clamped at zero.
    pub variance: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasureSummary {
    pub name: String,
    pub mean: f64,
    pub spread: Option<Spread>,
}

/// Distinct values of one field observed for a key, in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinctValues {
    pub field: Field,
    pub values: Vec<String>,
}

/// Immutable per-key result.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: u64,
    pub measures: Vec<MeasureSummary>,
    pub distinct: Vec<DistinctValues>,
}

impl Summary {
    pub fn measure(&self, name: &str) -> Option<&MeasureSummary> {
        self.measures.iter().find(|m| m.name == name)
    }

    pub fn mean(&self, name: &str) -> Option<f64> {
        self.measure(name).map(|m| m.mean)
    }

    /// Means in measure declaration order.
    pub fn means(&self) -> Vec<f64> {
        self.measures.iter().map(|m| m.mean).collect()
    }

    pub fn distinct(&self, field: Field) -> Option<&[String]> {
        self.distinct
            .iter()
            .find(|d| d.field == field)
            .map(|d| d.values.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub key: GroupKey,
    pub summary: Summary,
}

/// All groups of one spec, sorted by key.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecResult {
    pub name: String,
    pub groups: Vec<GroupSummary>,
}

impl SpecResult {
    pub fn get(&self, key: &GroupKey) -> Option<&Summary> {
        self.groups
            .binary_search_by(|g| g.key.cmp(key))
            .ok()
            .map(|i| &self.groups[i].summary)
    }

    /// Look up a group by its rendered key, e.g. `"F"` or `"(4, 3)"`.
    pub fn summary(&self, label: &str) -> Option<&Summary> {
        self.groups
            .iter()
            .find(|g| g.key.label() == label)
            .map(|g| &g.summary)
    }

    pub fn labels(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.key.label()).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Flattened `(spec, key, summary)` view of a [`ResultSet`].
#[derive(Debug, Clone, Copy)]
pub struct ResultRow<'a> {
    pub spec: &'a str,
    pub key: &'a GroupKey,
    pub summary: &'a Summary,
}

/// Results of every spec, in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    specs: Vec<SpecResult>,
}

impl ResultSet {
    pub fn new(specs: Vec<SpecResult>) -> Self {
        ResultSet { specs }
    }

    pub fn get(&self, spec: &str) -> Option<&SpecResult> {
        self.specs.iter().find(|s| s.name == spec)
    }

    pub fn specs(&self) -> &[SpecResult] {
        &self.specs
    }

    pub fn rows(&self) -> impl Iterator<Item = ResultRow<'_>> {
        self.specs.iter().flat_map(|s| {
            s.groups.iter().map(move |g| ResultRow {
                spec: &s.name,
                key: &g.key,
                summary: &g.summary,
            })
        })
    }

    /// Total number of `(spec, key)` groups.
    pub fn num_groups(&self) -> usize {
        self.specs.iter().map(SpecResult::len).sum()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Same specs, keys, counts and distinct values, with every statistic
    /// within `tolerance` (relative for magnitudes above 1).
    ///
    /// Runs that fold the same rows in a different order agree under this
    /// comparison but not necessarily under `==`.
    pub fn approx_eq(&self, other: &ResultSet, tolerance: f64) -> bool {
        self.specs.len() == other.specs.len()
            && self.specs.iter().zip(&other.specs).all(|(a, b)| {
                a.name == b.name
                    && a.groups.len() == b.groups.len()
                    && a.groups.iter().zip(&b.groups).all(|(ga, gb)| {
                        ga.key == gb.key && ga.summary.approx_eq(&gb.summary, tolerance)
                    })
            })
    }
}

impl Summary {
    fn approx_eq(&self, other: &Summary, tolerance: f64) -> bool {
        let close = |a: f64, b: f64| {
            a == b
                || (a.is_nan() && b.is_nan())
                || (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0)
        };
        self.count == other.count
            && self.distinct == other.distinct
            && self.measures.len() == other.measures.len()
            && self.measures.iter().zip(&other.measures).all(|(a, b)| {
                a.name == b.name
                    && close(a.mean, b.mean)
                    && match (&a.spread, &b.spread) {
                        (Some(x), Some(y)) => {
                            close(x.min, y.min)
                                && close(x.max, y.max)
                                && close(x.variance, y.variance)
                                && close(x.std_dev, y.std_dev)
                        }
                        (None, None) => true,
                        _ => false,
                    }
            })
    }
}

/// A skipped row kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: u64,
    pub raw: Vec<String>,
    pub error: DecodeError,
}

/// Counts of skipped rows by kind plus a capped sample of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    schema_errors: u64,
    type_errors: u64,
    samples: Vec<RowError>,
    sample_limit: usize,
}

impl ErrorReport {
    pub fn new(sample_limit: usize) -> Self {
        ErrorReport {
            schema_errors: 0,
            type_errors: 0,
            samples: Vec::new(),
            sample_limit,
        }
    }

    pub fn record(&mut self, line: u64, raw: &[String], error: DecodeError) {
        match error.kind() {
            DecodeErrorKind::Schema => self.schema_errors += 1,
            DecodeErrorKind::Type => self.type_errors += 1,
        }
        if self.samples.len() < self.sample_limit {
            self.samples.push(RowError {
                line,
                raw: raw.to_vec(),
                error,
            });
        }
    }

    pub fn count(&self, kind: DecodeErrorKind) -> u64 {
        match kind {
            DecodeErrorKind::Schema => self.schema_errors,
            DecodeErrorKind::Type => self.type_errors,
        }
    }

    pub fn total(&self) -> u64 {
        self.schema_errors + self.type_errors
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Retained samples, ordered by line.
    pub fn samples(&self) -> &[RowError] {
        &self.samples
    }

    pub fn merge(&mut self, other: ErrorReport) {
        self.schema_errors += other.schema_errors;
        self.type_errors += other.type_errors;
        self.samples.extend(other.samples);
        self.samples.sort_by_key(|s| s.line);
        self.samples.truncate(self.sample_limit);
    }
}

/// Everything a run returns.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub results: ResultSet,
    pub errors: ErrorReport,
    /// Data rows considered (header excluded).
    pub rows_seen: u64,
    /// Rows that decoded and were folded into every spec.
    pub records_decoded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradestat_types::group_key::KeyPart;

    fn summary(mean: f64) -> Summary {
        Summary {
            count: 1,
            measures: vec![MeasureSummary {
                name: "grade_final".into(),
                mean,
                spread: None,
            }],
            distinct: Vec::new(),
        }
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2.666_666, 2), 2.67);
        assert_eq!(round_to(11.5, 2), 11.5);
        assert_eq!(round_to(1.234_5, 0), 1.0);
    }

    #[test]
    fn test_spec_result_lookup() {
        let result = SpecResult {
            name: "gender".into(),
            groups: vec![
                GroupSummary {
                    key: GroupKey::single(KeyPart::Text("F".into())),
                    summary: summary(11.5),
                },
                GroupSummary {
                    key: GroupKey::single(KeyPart::Text("M".into())),
                    summary: summary(16.0),
                },
            ],
        };
        assert_eq!(result.summary("M").and_then(|s| s.mean("grade_final")), Some(16.0));
        let key = GroupKey::single(KeyPart::Text("F".into()));
        assert_eq!(result.get(&key).map(|s| s.means()), Some(vec![11.5]));
        assert!(result.summary("X").is_none());

        let set = ResultSet::new(vec![result]);
        assert_eq!(set.num_groups(), 2);
        let specs: Vec<&str> = set.rows().map(|r| r.spec).collect();
        assert_eq!(specs, vec!["gender", "gender"]);
    }

    #[test]
    fn test_approx_eq_tolerates_summation_order() {
        let set = |mean: f64, count: u64| {
            ResultSet::new(vec![SpecResult {
                name: "overall".into(),
                groups: vec![GroupSummary {
                    key: GroupKey::single(KeyPart::Int(4)),
                    summary: Summary {
                        count,
                        ..summary(mean)
                    },
                }],
            }])
        };
        let a = set(9.500000000000002, 3);
        let b = set(9.5, 3);
        assert_ne!(a, b);
        assert!(a.approx_eq(&b, 1e-9));
        assert!(!a.approx_eq(&set(9.51, 3), 1e-9));
        assert!(!a.approx_eq(&set(9.5, 4), 1e-9));
    }

    #[test]
    fn test_error_report_caps_samples_but_not_counts() {
        let mut report = ErrorReport::new(1);
        report.record(2, &["a".to_string()], DecodeError::Schema { expected: 33, found: 1 });
        report.record(
            3,
            &[],
            DecodeError::Type {
                field: "age",
                value: "x".into(),
                reason: "invalid digit found in string".into(),
            },
        );
        assert_eq!(report.total(), 2);
        assert_eq!(report.count(DecodeErrorKind::Schema), 1);
        assert_eq!(report.count(DecodeErrorKind::Type), 1);
        assert_eq!(report.samples().len(), 1);
        assert_eq!(report.samples()[0].line, 2);
    }

    #[test]
    fn test_error_report_merge_orders_samples() {
        let mut a = ErrorReport::new(5);
        a.record(9, &[], DecodeError::Schema { expected: 33, found: 0 });
        let mut b = ErrorReport::new(5);
        b.record(4, &[], DecodeError::Schema { expected: 33, found: 0 });
        a.merge(b);
        assert_eq!(a.total(), 2);
        let lines: Vec<u64> = a.samples().iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![4, 9]);
    }
}
