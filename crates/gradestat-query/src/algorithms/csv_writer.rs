//! CSV writer for result sets.
//!
//! Emits one line per `(spec, key, measure)`. Values are rounded to the
//! configured decimal places here and nowhere earlier.

use std::path::Path;

use gradestat_types::error::{GradeStatError, Result};

use crate::result::{round_to, ResultSet, Summary};

/// Quote style for CSV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// Only quote fields that contain the delimiter, quote char, or newlines.
    Minimal,
    /// Quote all fields.
    All,
}

/// Options for CSV writing.
#[derive(Debug, Clone)]
pub struct CsvWriterOptions {
    pub delimiter: String,
    pub quote_char: char,
    pub line_terminator: String,
    pub header: bool,
    pub quoting: QuoteStyle,
    pub decimal_places: u32,
}

impl Default for CsvWriterOptions {
    fn default() -> Self {
        CsvWriterOptions {
            delimiter: ",".to_string(),
            quote_char: '"',
            line_terminator: "\n".to_string(),
            header: true,
            quoting: QuoteStyle::Minimal,
            decimal_places: 2,
        }
    }
}

pub const COLUMNS: [&str; 9] = [
    "spec", "key", "count", "measure", "mean", "min", "max", "std_dev", "distinct",
];

/// Write a result set to a CSV string.
pub fn write_csv_string(results: &ResultSet, options: &CsvWriterOptions) -> String {
    let mut output = String::new();

    if options.header {
        push_line(&mut output, COLUMNS.iter().map(|c| c.to_string()), options);
    }

    for row in results.rows() {
        let key = row.key.label();
        let distinct = format_distinct(row.summary);
        for measure in &row.summary.measures {
            let places = options.decimal_places;
            let (min, max, std_dev) = match &measure.spread {
                Some(s) => (
                    format_float(s.min, places),
                    format_float(s.max, places),
                    format_float(s.std_dev, places),
                ),
                None => (String::new(), String::new(), String::new()),
            };
            let fields = [
                row.spec.to_string(),
                key.clone(),
                row.summary.count.to_string(),
                measure.name.clone(),
                format_float(measure.mean, places),
                min,
                max,
                std_dev,
                distinct.clone(),
            ];
            push_line(&mut output, fields.into_iter(), options);
        }
    }

    output
}

/// Write a result set to a CSV file.
pub fn write_csv_file(
    path: impl AsRef<Path>,
    results: &ResultSet,
    options: &CsvWriterOptions,
) -> Result<()> {
    std::fs::write(path, write_csv_string(results, options)).map_err(GradeStatError::Io)
}

fn push_line(output: &mut String, fields: impl Iterator<Item = String>, options: &CsvWriterOptions) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            output.push_str(&options.delimiter);
        }
        output.push_str(&quote_field(&field, options));
    }
    output.push_str(&options.line_terminator);
}

fn format_float(value: f64, places: u32) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    format!("{}", round_to(value, places))
}

/// `address=R|U; travel_time=1|2`
fn format_distinct(summary: &Summary) -> String {
    summary
        .distinct
        .iter()
        .map(|d| format!("{}={}", d.field, d.values.join("|")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn quote_field(field: &str, options: &CsvWriterOptions) -> String {
    let q = options.quote_char;
    let needs_quote = match options.quoting {
        QuoteStyle::All => true,
        QuoteStyle::Minimal => {
            field.contains(options.delimiter.as_str())
                || field.contains(q)
                || field.contains('\n')
                || field.contains('\r')
        }
    };

    if needs_quote {
        let escaped = field.replace(q, &format!("{}{}", q, q));
        format!("{}{}{}", q, escaped, q)
    } else {
        field.to_string()
    }
}
