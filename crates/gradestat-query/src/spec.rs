//! Declarative aggregation specs.
//!
//! An [`AggregationSpec`] names one analysis: how to derive the grouping key
//! from a record, which numeric measures to fold, and which accumulator kind
//! folds them. Specs are plain values; one generic engine runs them all.

use gradestat_types::error::{GradeStatError, Result};
use gradestat_types::group_key::{GroupKey, KeyPart};
use gradestat_types::record::{Field, FieldValue, Record};

use crate::algorithms::aggregators::Accumulator;

/// Threshold bucketing of an integer field.
///
/// A value falls into the first bucket whose exclusive upper bound exceeds
/// it; values past every bound land in the overflow bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucketing {
    bounds: Vec<(i64, String)>,
    overflow: String,
}

impl Bucketing {
    pub fn new(bounds: &[(i64, &str)], overflow: &str) -> Self {
        Bucketing {
            bounds: bounds.iter().map(|(b, l)| (*b, l.to_string())).collect(),
            overflow: overflow.to_string(),
        }
    }

    /// `0-4`, `5-9`, `10+`.
    pub fn absences() -> Self {
        Self::new(&[(5, "0-4"), (10, "5-9")], "10+")
    }

    /// `Low` for consumption levels up to 2, `High` above.
    pub fn alcohol() -> Self {
        Self::new(&[(3, "Low")], "High")
    }

    pub fn bucket(&self, value: i64) -> KeyPart {
        for (rank, (bound, label)) in self.bounds.iter().enumerate() {
            if value < *bound {
                return KeyPart::bucket(rank, label.as_str());
            }
        }
        KeyPart::bucket(self.bounds.len(), self.overflow.as_str())
    }

    fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.bounds.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err("bucket bounds must be strictly increasing");
        }
        Ok(())
    }
}

/// One component of a grouping key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    /// The raw field value.
    Field(Field),
    /// A numeric field mapped through thresholds.
    Bucketed { field: Field, bucketing: Bucketing },
}

impl KeySpec {
    pub fn bucketed(field: Field, bucketing: Bucketing) -> Self {
        KeySpec::Bucketed { field, bucketing }
    }

    pub fn field(&self) -> Field {
        match self {
            KeySpec::Field(f) => *f,
            KeySpec::Bucketed { field, .. } => *field,
        }
    }

    pub fn extract(&self, record: &Record) -> KeyPart {
        match self {
            KeySpec::Field(f) => field_part(record, *f),
            KeySpec::Bucketed { field, bucketing } => match record.value(*field) {
                FieldValue::Int(i) => bucketing.bucket(i),
                FieldValue::Text(s) => KeyPart::Text(s.to_string()),
            },
        }
    }
}

fn field_part(record: &Record, field: Field) -> KeyPart {
    match record.value(field) {
        FieldValue::Int(i) => KeyPart::Int(i),
        FieldValue::Text(s) => KeyPart::Text(s.to_string()),
    }
}

/// How a numeric measure is computed from a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasureExpr {
    Field(Field),
    /// Arithmetic mean of several fields within one record.
    Average(Vec<Field>),
}

/// A named measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureSpec {
    pub name: String,
    pub expr: MeasureExpr,
}

impl MeasureSpec {
    /// Measure a single field, named after it.
    pub fn field(field: Field) -> Self {
        MeasureSpec {
            name: field.name().to_string(),
            expr: MeasureExpr::Field(field),
        }
    }

    pub fn average(name: &str, fields: &[Field]) -> Self {
        MeasureSpec {
            name: name.to_string(),
            expr: MeasureExpr::Average(fields.to_vec()),
        }
    }

    pub fn extract(&self, record: &Record) -> f64 {
        match &self.expr {
            MeasureExpr::Field(f) => numeric(record, *f),
            MeasureExpr::Average(fields) => {
                let total: f64 = fields.iter().map(|f| numeric(record, *f)).sum();
                total / fields.len() as f64
            }
        }
    }

    fn fields(&self) -> Vec<Field> {
        match &self.expr {
            MeasureExpr::Field(f) => vec![*f],
            MeasureExpr::Average(fields) => fields.clone(),
        }
    }
}

// Validation guarantees measure fields are numeric.
fn numeric(record: &Record, field: Field) -> f64 {
    record.int(field).unwrap_or_default() as f64
}

/// Which running statistics a spec keeps per key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorKind {
    /// `{count, sum}` per measure.
    Mean,
    /// `{count, sum, sum_of_squares, min, max}` per measure.
    DetailedStats,
    /// Means plus the distinct values of `fields` seen per key.
    SetCollection { fields: Vec<Field> },
}

/// One named analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSpec {
    name: String,
    description: String,
    keys: Vec<KeySpec>,
    measures: Vec<MeasureSpec>,
    kind: AccumulatorKind,
}

impl AggregationSpec {
    pub fn new(name: &str, kind: AccumulatorKind) -> Self {
        AggregationSpec {
            name: name.to_string(),
            description: String::new(),
            keys: Vec::new(),
            measures: Vec::new(),
            kind,
        }
    }

    pub fn mean(name: &str) -> Self {
        Self::new(name, AccumulatorKind::Mean)
    }

    pub fn detailed(name: &str) -> Self {
        Self::new(name, AccumulatorKind::DetailedStats)
    }

    pub fn set_collection(name: &str, fields: &[Field]) -> Self {
        Self::new(
            name,
            AccumulatorKind::SetCollection {
                fields: fields.to_vec(),
            },
        )
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn group_by(mut self, key: KeySpec) -> Self {
        self.keys.push(key);
        self
    }

    pub fn group_by_field(self, field: Field) -> Self {
        self.group_by(KeySpec::Field(field))
    }

    pub fn measure(mut self, measure: MeasureSpec) -> Self {
        self.measures.push(measure);
        self
    }

    pub fn measure_fields(mut self, fields: &[Field]) -> Self {
        self.measures
            .extend(fields.iter().map(|f| MeasureSpec::field(*f)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn keys(&self) -> &[KeySpec] {
        &self.keys
    }

    pub fn measures(&self) -> &[MeasureSpec] {
        &self.measures
    }

    pub fn kind(&self) -> &AccumulatorKind {
        &self.kind
    }

    /// Fields whose distinct values are collected, empty unless the kind is
    /// `SetCollection`.
    pub fn collected_fields(&self) -> &[Field] {
        match &self.kind {
            AccumulatorKind::SetCollection { fields } => fields,
            _ => &[],
        }
    }

    /// Check the spec is well-formed before any record is folded.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| -> Result<()> {
            Err(GradeStatError::Spec(format!("{}: {}", self.name, msg)))
        };

        if self.name.trim().is_empty() {
            return Err(GradeStatError::Spec("spec name must not be empty".to_string()));
        }
        if self.keys.is_empty() {
            return fail("at least one key is required".to_string());
        }
        if self.measures.is_empty() {
            return fail("at least one measure is required".to_string());
        }
        for key in &self.keys {
            if let KeySpec::Bucketed { field, bucketing } = key {
                if !field.is_numeric() {
                    return fail(format!("cannot bucket categorical field `{}`", field));
                }
                if let Err(msg) = bucketing.validate() {
                    return fail(format!("key `{}`: {}", field, msg));
                }
            }
        }
        for measure in &self.measures {
            let fields = measure.fields();
            if fields.is_empty() {
                return fail(format!("measure `{}` averages no fields", measure.name));
            }
            if let Some(f) = fields.iter().find(|f| !f.is_numeric()) {
                return fail(format!(
                    "measure `{}` uses categorical field `{}`",
                    measure.name, f
                ));
            }
        }
        if let AccumulatorKind::SetCollection { fields } = &self.kind {
            if fields.is_empty() {
                return fail("set collection needs at least one field".to_string());
            }
        }
        Ok(())
    }

    pub fn key(&self, record: &Record) -> GroupKey {
        GroupKey(self.keys.iter().map(|k| k.extract(record)).collect())
    }

    /// Write this spec's measures for `record` into `out` (cleared first).
    pub fn extract_measures(&self, record: &Record, out: &mut Vec<f64>) {
        out.clear();
        out.extend(self.measures.iter().map(|m| m.extract(record)));
    }

    /// Values of the collected fields for `record`.
    pub fn extract_labels(&self, record: &Record, out: &mut Vec<KeyPart>) {
        out.clear();
        out.extend(self.collected_fields().iter().map(|f| field_part(record, *f)));
    }

    /// A fresh accumulator of this spec's kind.
    pub fn new_accumulator(&self) -> Accumulator {
        Accumulator::new(&self.kind, self.measures.len())
    }
}
