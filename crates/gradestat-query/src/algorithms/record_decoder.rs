//! Record decoder: tokenized fields -> typed [`Record`].
//!
//! The physical layout (delimiter and the column index of every logical
//! field) is carried by a [`RecordSchema`], so the comma and semicolon
//! variants of the dataset are configuration rather than separate code.

use std::collections::HashMap;

use gradestat_types::error::{DecodeError, GradeStatError, Result};
use gradestat_types::record::{Field, Record};

use super::csv_tokenizer::CsvConfig;

/// Minimum column count of both dataset layouts.
pub const STUDENT_COLUMNS: usize = 33;

/// Maps logical fields to column positions for one physical layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    delimiter: char,
    min_columns: usize,
    columns: [usize; Field::COUNT],
    header_signatures: Vec<String>,
}

impl RecordSchema {
    /// Build a schema from an explicit field -> column mapping.
    ///
    /// Every field must be mapped exactly once, and `min_columns` must cover
    /// the largest mapped index.
    pub fn new(delimiter: char, min_columns: usize, mapping: &[(Field, usize)]) -> Result<Self> {
        let mut columns: [Option<usize>; Field::COUNT] = [None; Field::COUNT];
        for &(field, col) in mapping {
            let slot = &mut columns[field as usize];
            if slot.is_some() {
                return Err(GradeStatError::Schema(format!(
                    "field `{}` mapped more than once",
                    field
                )));
            }
            if col >= min_columns {
                return Err(GradeStatError::Schema(format!(
                    "field `{}` at column {} is outside the {}-column minimum",
                    field, col, min_columns
                )));
            }
            *slot = Some(col);
        }

        let missing: Vec<&str> = Field::ALL
            .iter()
            .filter(|f| columns[**f as usize].is_none())
            .map(|f| f.name())
            .collect();
        if !missing.is_empty() {
            return Err(GradeStatError::Schema(format!(
                "unmapped fields: {}",
                missing.join(", ")
            )));
        }

        let mut resolved = [0usize; Field::COUNT];
        for (slot, col) in resolved.iter_mut().zip(columns.iter()) {
            *slot = col.unwrap_or_default();
        }

        Ok(RecordSchema {
            delimiter,
            min_columns,
            columns: resolved,
            header_signatures: vec!["school".to_string(), "sex".to_string()],
        })
    }

    /// Comma-delimited 33-column layout (the published dataset order).
    pub fn comma() -> Self {
        Self::preset(
            ',',
            &[
                (Field::School, 0),
                (Field::Gender, 1),
                (Field::Age, 2),
                (Field::Address, 3),
                (Field::MotherEducation, 6),
                (Field::FatherEducation, 7),
                (Field::TravelTime, 12),
                (Field::StudyTime, 13),
                (Field::Failures, 14),
                (Field::SchoolSupport, 15),
                (Field::Romantic, 22),
                (Field::WeekdayAlcohol, 26),
                (Field::WeekendAlcohol, 27),
                (Field::Absences, 29),
                (Field::GradePeriod1, 30),
                (Field::GradePeriod2, 31),
                (Field::GradeFinal, 32),
            ],
        )
    }

    /// Semicolon-delimited 33-column layout.
    ///
    /// Age sits at column 2; column 0 carries the categorical sex field.
    pub fn semicolon() -> Self {
        Self::preset(
            ';',
            &[
                (Field::Gender, 0),
                (Field::School, 1),
                (Field::Age, 2),
                (Field::TravelTime, 4),
                (Field::Address, 8),
                (Field::MotherEducation, 11),
                (Field::FatherEducation, 12),
                (Field::StudyTime, 14),
                (Field::SchoolSupport, 15),
                (Field::Failures, 16),
                (Field::WeekdayAlcohol, 19),
                (Field::WeekendAlcohol, 20),
                (Field::Romantic, 21),
                (Field::Absences, 22),
                (Field::GradePeriod1, 25),
                (Field::GradePeriod2, 26),
                (Field::GradeFinal, 27),
            ],
        )
    }

    fn preset(delimiter: char, mapping: &[(Field, usize)]) -> Self {
        let mut columns = [0usize; Field::COUNT];
        for &(field, col) in mapping {
            columns[field as usize] = col;
        }
        RecordSchema {
            delimiter,
            min_columns: STUDENT_COLUMNS,
            columns,
            header_signatures: vec!["school".to_string(), "sex".to_string()],
        }
    }

    /// Resolve column positions from a header row using the dataset's
    /// column names (`Medu`, `G3`, ...).
    pub fn from_header(header: &[String], delimiter: char) -> Result<Self> {
        let positions: HashMap<Field, usize> = header
            .iter()
            .enumerate()
            .filter_map(|(i, name)| Field::from_header_name(name).map(|f| (f, i)))
            .fold(HashMap::new(), |mut acc, (f, i)| {
                acc.entry(f).or_insert(i);
                acc
            });

        let missing: Vec<&str> = Field::ALL
            .iter()
            .filter(|f| !positions.contains_key(f))
            .map(|f| f.header_name())
            .collect();
        if !missing.is_empty() {
            return Err(GradeStatError::Schema(format!(
                "header is missing columns: {}",
                missing.join(", ")
            )));
        }

        let mapping: Vec<(Field, usize)> = positions.into_iter().collect();
        let schema = Self::new(delimiter, header.len(), &mapping)?;
        Ok(match header.first() {
            Some(first) => schema.with_header_signatures(&[first.trim()]),
            None => schema,
        })
    }

    /// Replace the first-field values that identify a header row.
    pub fn with_header_signatures(mut self, signatures: &[&str]) -> Self {
        self.header_signatures = signatures.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn min_columns(&self) -> usize {
        self.min_columns
    }

    pub fn column(&self, field: Field) -> usize {
        self.columns[field as usize]
    }

    /// Tokenizer settings matching this layout.
    pub fn csv_config(&self) -> CsvConfig {
        CsvConfig::with_delimiter(self.delimiter)
    }

    /// Whether `fields` looks like the header row of this layout.
    pub fn is_header(&self, fields: &[String]) -> bool {
        match fields.first() {
            Some(first) => {
                let first = first.trim();
                self.header_signatures
                    .iter()
                    .any(|sig| sig.eq_ignore_ascii_case(first))
            }
            None => false,
        }
    }
}

/// Decode one tokenized row.
///
/// Categorical fields are trimmed and passed through; numeric fields must
/// parse as integers.
pub fn decode(fields: &[String], schema: &RecordSchema) -> std::result::Result<Record, DecodeError> {
    if fields.len() < schema.min_columns {
        return Err(DecodeError::Schema {
            expected: schema.min_columns,
            found: fields.len(),
        });
    }

    let raw = |field: Field| -> std::result::Result<&str, DecodeError> {
        fields
            .get(schema.column(field))
            .map(String::as_str)
            .ok_or(DecodeError::Schema {
                expected: schema.column(field) + 1,
                found: fields.len(),
            })
    };
    let text = |field: Field| raw(field).map(|s| s.trim().to_string());
    let int = |field: Field| raw(field).and_then(|s| parse_int(field, s));

    Ok(Record {
        gender: text(Field::Gender)?,
        school: text(Field::School)?,
        age: int(Field::Age)?,
        address: text(Field::Address)?,
        mother_education: int(Field::MotherEducation)?,
        father_education: int(Field::FatherEducation)?,
        study_time: int(Field::StudyTime)?,
        failures: int(Field::Failures)?,
        school_support: text(Field::SchoolSupport)?,
        travel_time: int(Field::TravelTime)?,
        absences: int(Field::Absences)?,
        romantic: text(Field::Romantic)?,
        weekday_alcohol: int(Field::WeekdayAlcohol)?,
        weekend_alcohol: int(Field::WeekendAlcohol)?,
        grade_period1: int(Field::GradePeriod1)?,
        grade_period2: int(Field::GradePeriod2)?,
        grade_final: int(Field::GradeFinal)?,
    })
}

fn parse_int(field: Field, raw: &str) -> std::result::Result<i64, DecodeError> {
    raw.trim().parse::<i64>().map_err(|e| DecodeError::Type {
        field: field.name(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
