//! JSON Lines output for result sets and error reports.

use std::path::Path;

use serde_json::Value as JsonValue;

use gradestat_types::error::{GradeStatError, Result};

use crate::result::{round_to, ErrorReport, ResultRow, ResultSet};

fn number(value: f64, places: u32) -> JsonValue {
    serde_json::Number::from_f64(round_to(value, places))
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// One `(spec, key)` group as a JSON object.
pub fn row_to_json(row: &ResultRow<'_>, places: u32) -> JsonValue {
    let mut measures = serde_json::Map::new();
    for m in &row.summary.measures {
        let mut stats = serde_json::Map::new();
        stats.insert("mean".into(), number(m.mean, places));
        if let Some(s) = &m.spread {
            stats.insert("min".into(), number(s.min, places));
            stats.insert("max".into(), number(s.max, places));
            stats.insert("std_dev".into(), number(s.std_dev, places));
        }
        measures.insert(m.name.clone(), JsonValue::Object(stats));
    }

    let mut map = serde_json::Map::new();
    map.insert("spec".into(), JsonValue::String(row.spec.to_string()));
    map.insert("key".into(), JsonValue::String(row.key.label()));
    map.insert("count".into(), JsonValue::Number(row.summary.count.into()));
    map.insert("measures".into(), JsonValue::Object(measures));

    if !row.summary.distinct.is_empty() {
        let mut distinct = serde_json::Map::new();
        for d in &row.summary.distinct {
            distinct.insert(
                d.field.name().to_string(),
                JsonValue::Array(d.values.iter().cloned().map(JsonValue::String).collect()),
            );
        }
        map.insert("distinct".into(), JsonValue::Object(distinct));
    }

    JsonValue::Object(map)
}

/// Write a result set as JSON Lines, one object per group.
pub fn write_json_string(results: &ResultSet, places: u32) -> Result<String> {
    let mut output = String::new();
    for row in results.rows() {
        let json = serde_json::to_string(&row_to_json(&row, places))
            .map_err(|e| GradeStatError::Format(format!("JSON serialization error: {}", e)))?;
        output.push_str(&json);
        output.push('\n');
    }
    Ok(output)
}

pub fn write_json_file(
    path: impl AsRef<Path>,
    results: &ResultSet,
    places: u32,
) -> Result<()> {
    let content = write_json_string(results, places)?;
    std::fs::write(path, content).map_err(GradeStatError::Io)
}

/// Counts and retained samples of an error report.
pub fn error_report_to_json(report: &ErrorReport) -> JsonValue {
    use gradestat_types::error::DecodeErrorKind;

    let samples: Vec<JsonValue> = report
        .samples()
        .iter()
        .map(|s| {
            serde_json::json!({
                "line": s.line,
                "raw": s.raw,
                "reason": s.error.to_string(),
            })
        })
        .collect();

    serde_json::json!({
        "total": report.total(),
        "schema_errors": report.count(DecodeErrorKind::Schema),
        "type_errors": report.count(DecodeErrorKind::Type),
        "samples": samples,
    })
}
