//! Rendering of run output.

use std::fmt::Write as _;
use std::path::Path;

use gradestat_query::algorithms::csv_writer::{write_csv_file, write_csv_string, CsvWriterOptions};
use gradestat_query::algorithms::json::{error_report_to_json, write_json_file, write_json_string};
use gradestat_query::result::{ErrorReport, ResultSet};
use gradestat_types::error::{DecodeErrorKind, GradeStatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    /// One JSON object per line.
    Json,
}

/// Render `results` with values rounded to `decimal_places`.
pub fn render(results: &ResultSet, format: OutputFormat, decimal_places: u32) -> Result<String> {
    match format {
        OutputFormat::Csv => {
            let options = CsvWriterOptions {
                decimal_places,
                ..Default::default()
            };
            Ok(write_csv_string(results, &options))
        }
        OutputFormat::Json => write_json_string(results, decimal_places),
    }
}

/// Write `results` to the file at `path`, replacing it.
pub fn write_output(
    path: impl AsRef<Path>,
    results: &ResultSet,
    format: OutputFormat,
    decimal_places: u32,
) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            let options = CsvWriterOptions {
                decimal_places,
                ..Default::default()
            };
            write_csv_file(path, results, &options)
        }
        OutputFormat::Json => write_json_file(path, results, decimal_places),
    }
}

/// Human-readable summary of skipped rows.
pub fn render_errors(report: &ErrorReport, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json_line(report);
    }

    let mut out = String::new();
    let fmt_err = |e: std::fmt::Error| GradeStatError::Format(e.to_string());
    writeln!(
        out,
        "skipped {} rows ({} schema, {} type)",
        report.total(),
        report.count(DecodeErrorKind::Schema),
        report.count(DecodeErrorKind::Type)
    )
    .map_err(fmt_err)?;
    for sample in report.samples() {
        writeln!(out, "  line {}: {}", sample.line, sample.error).map_err(fmt_err)?;
    }
    Ok(out)
}

fn json_line(report: &ErrorReport) -> Result<String> {
    let mut line = error_report_to_json(report).to_string();
    line.push('\n');
    Ok(line)
}
