//! Decoded student record and the logical field catalog.
//!
//! A `Record` is produced whole by the decoder or not at all; there is no
//! partially populated state. Analyses address its attributes through
//! [`Field`] so that key and measure choices stay declarative.

use std::fmt;

/// One decoded student row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub gender: String,
    pub school: String,
    pub age: i64,
    /// `U` (urban) or `R` (rural).
    pub address: String,
    /// Ordinal 0-4.
    pub mother_education: i64,
    /// Ordinal 0-4.
    pub father_education: i64,
    /// Ordinal 1-4.
    pub study_time: i64,
    pub failures: i64,
    pub school_support: String,
    pub travel_time: i64,
    pub absences: i64,
    pub romantic: String,
    /// Ordinal 1-5.
    pub weekday_alcohol: i64,
    /// Ordinal 1-5.
    pub weekend_alcohol: i64,
    pub grade_period1: i64,
    pub grade_period2: i64,
    pub grade_final: i64,
}

/// Logical attributes of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Gender,
    School,
    Age,
    Address,
    MotherEducation,
    FatherEducation,
    StudyTime,
    Failures,
    SchoolSupport,
    TravelTime,
    Absences,
    Romantic,
    WeekdayAlcohol,
    WeekendAlcohol,
    GradePeriod1,
    GradePeriod2,
    GradeFinal,
}

/// A borrowed attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Int(i64),
    Text(&'a str),
}

impl Field {
    pub const COUNT: usize = 17;

    pub const ALL: [Field; Field::COUNT] = [
        Field::Gender,
        Field::School,
        Field::Age,
        Field::Address,
        Field::MotherEducation,
        Field::FatherEducation,
        Field::StudyTime,
        Field::Failures,
        Field::SchoolSupport,
        Field::TravelTime,
        Field::Absences,
        Field::Romantic,
        Field::WeekdayAlcohol,
        Field::WeekendAlcohol,
        Field::GradePeriod1,
        Field::GradePeriod2,
        Field::GradeFinal,
    ];

    /// Snake-case name used in diagnostics and output.
    pub fn name(self) -> &'static str {
        match self {
            Field::Gender => "gender",
            Field::School => "school",
            Field::Age => "age",
            Field::Address => "address",
            Field::MotherEducation => "mother_education",
            Field::FatherEducation => "father_education",
            Field::StudyTime => "study_time",
            Field::Failures => "failures",
            Field::SchoolSupport => "school_support",
            Field::TravelTime => "travel_time",
            Field::Absences => "absences",
            Field::Romantic => "romantic",
            Field::WeekdayAlcohol => "weekday_alcohol",
            Field::WeekendAlcohol => "weekend_alcohol",
            Field::GradePeriod1 => "grade_period1",
            Field::GradePeriod2 => "grade_period2",
            Field::GradeFinal => "grade_final",
        }
    }

    /// Column name used by the student performance dataset header.
    pub fn header_name(self) -> &'static str {
        match self {
            Field::Gender => "sex",
            Field::School => "school",
            Field::Age => "age",
            Field::Address => "address",
            Field::MotherEducation => "Medu",
            Field::FatherEducation => "Fedu",
            Field::StudyTime => "studytime",
            Field::Failures => "failures",
            Field::SchoolSupport => "schoolsup",
            Field::TravelTime => "traveltime",
            Field::Absences => "absences",
            Field::Romantic => "romantic",
            Field::WeekdayAlcohol => "Dalc",
            Field::WeekendAlcohol => "Walc",
            Field::GradePeriod1 => "G1",
            Field::GradePeriod2 => "G2",
            Field::GradeFinal => "G3",
        }
    }

    /// Resolve a dataset header column (case-insensitive).
    pub fn from_header_name(name: &str) -> Option<Field> {
        let name = name.trim();
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.header_name().eq_ignore_ascii_case(name))
    }

    /// Whether the decoder parses this field as an integer.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            Field::Gender | Field::School | Field::Address | Field::SchoolSupport | Field::Romantic
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Record {
    pub fn value(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::Gender => FieldValue::Text(&self.gender),
            Field::School => FieldValue::Text(&self.school),
            Field::Age => FieldValue::Int(self.age),
            Field::Address => FieldValue::Text(&self.address),
            Field::MotherEducation => FieldValue::Int(self.mother_education),
            Field::FatherEducation => FieldValue::Int(self.father_education),
            Field::StudyTime => FieldValue::Int(self.study_time),
            Field::Failures => FieldValue::Int(self.failures),
            Field::SchoolSupport => FieldValue::Text(&self.school_support),
            Field::TravelTime => FieldValue::Int(self.travel_time),
            Field::Absences => FieldValue::Int(self.absences),
            Field::Romantic => FieldValue::Text(&self.romantic),
            Field::WeekdayAlcohol => FieldValue::Int(self.weekday_alcohol),
            Field::WeekendAlcohol => FieldValue::Int(self.weekend_alcohol),
            Field::GradePeriod1 => FieldValue::Int(self.grade_period1),
            Field::GradePeriod2 => FieldValue::Int(self.grade_period2),
            Field::GradeFinal => FieldValue::Int(self.grade_final),
        }
    }

    /// Integer value of a numeric field, `None` for categorical fields.
    pub fn int(&self, field: Field) -> Option<i64> {
        match self.value(field) {
            FieldValue::Int(i) => Some(i),
            FieldValue::Text(_) => None,
        }
    }
}
