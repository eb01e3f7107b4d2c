//! The canonical battery of student-performance analyses.

use gradestat_types::error::{GradeStatError, Result};
use gradestat_types::record::Field;

use crate::spec::{AggregationSpec, Bucketing, KeySpec, MeasureSpec};

const GRADES: [Field; 3] = [Field::GradePeriod1, Field::GradePeriod2, Field::GradeFinal];

/// Every built-in analysis, in reporting order.
pub fn canonical_specs() -> Vec<AggregationSpec> {
    vec![
        AggregationSpec::mean("gender_grades")
            .describe("Average G1/G2/G3 by gender")
            .group_by_field(Field::Gender)
            .measure_fields(&GRADES),
        AggregationSpec::mean("parental_education")
            .describe("Average final grade by (Medu, Fedu)")
            .group_by_field(Field::MotherEducation)
            .group_by_field(Field::FatherEducation)
            .measure_fields(&[Field::GradeFinal]),
        AggregationSpec::detailed("parental_education_detailed")
            .describe("Final grade mean, min, max and std-dev by (Medu, Fedu)")
            .group_by_field(Field::MotherEducation)
            .group_by_field(Field::FatherEducation)
            .measure_fields(&[Field::GradeFinal]),
        AggregationSpec::mean("parental_education_overall")
            .describe("Average of (G1+G2+G3)/3 by (Medu, Fedu)")
            .group_by_field(Field::MotherEducation)
            .group_by_field(Field::FatherEducation)
            .measure(MeasureSpec::average("average_grade", &GRADES)),
        AggregationSpec::mean("absence_impact")
            .describe("Average G1/G2/G3 by absence bucket (0-4, 5-9, 10+)")
            .group_by(KeySpec::bucketed(Field::Absences, Bucketing::absences()))
            .measure_fields(&GRADES),
        AggregationSpec::mean("school_support")
            .describe("Average G1/G2/G3 by extra educational support")
            .group_by_field(Field::SchoolSupport)
            .measure_fields(&GRADES),
        AggregationSpec::mean("study_time")
            .describe("Average G1/G2/G3 by weekly study time level")
            .group_by_field(Field::StudyTime)
            .measure_fields(&GRADES),
        AggregationSpec::mean("failure_analysis")
            .describe("Average G1/G2/G3 by number of past failures")
            .group_by_field(Field::Failures)
            .measure_fields(&GRADES),
        AggregationSpec::set_collection(
            "failure_analysis_detailed",
            &[Field::Address, Field::TravelTime],
        )
        .describe("Average final grade with distinct addresses and travel times by failures")
        .group_by_field(Field::Failures)
        .measure_fields(&[Field::GradeFinal]),
        AggregationSpec::mean("alcohol_consumption")
            .describe("Average final grade by (weekday, weekend) alcohol level")
            .group_by(KeySpec::bucketed(Field::WeekdayAlcohol, Bucketing::alcohol()))
            .group_by(KeySpec::bucketed(Field::WeekendAlcohol, Bucketing::alcohol()))
            .measure_fields(&[Field::GradeFinal]),
        AggregationSpec::mean("school_comparison")
            .describe("Average G1/G2/G3 by school")
            .group_by_field(Field::School)
            .measure_fields(&GRADES),
        AggregationSpec::mean("romantic_impact")
            .describe("Average G1/G2/G3 by romantic relationship status")
            .group_by_field(Field::Romantic)
            .measure_fields(&GRADES),
        AggregationSpec::mean("age_performance")
            .describe("Average G1/G2/G3 by age")
            .group_by_field(Field::Age)
            .measure_fields(&GRADES),
    ]
}

pub fn spec_names() -> Vec<String> {
    canonical_specs()
        .iter()
        .map(|s| s.name().to_string())
        .collect()
}

pub fn spec_by_name(name: &str) -> Option<AggregationSpec> {
    canonical_specs().into_iter().find(|s| s.name() == name)
}

/// Pick catalog specs by name, preserving the requested order.
pub fn select_specs<S: AsRef<str>>(names: &[S]) -> Result<Vec<AggregationSpec>> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            spec_by_name(name).ok_or_else(|| {
                GradeStatError::Spec(format!(
                    "unknown analysis `{}` (known: {})",
                    name,
                    spec_names().join(", ")
                ))
            })
        })
        .collect()
}
