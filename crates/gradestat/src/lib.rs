//! Grouped grade statistics over student performance datasets.
//!
//! [`StudentAnalysis`] reads a delimited student file in one pass and runs
//! every configured aggregation spec over it. The building blocks live in
//! [`gradestat_query`] and are re-exported here.

pub mod analysis;
pub mod output;

pub use analysis::{Layout, StudentAnalysis};
pub use output::OutputFormat;

pub use gradestat_query::algorithms::analyses::{canonical_specs, select_specs, spec_by_name, spec_names};
pub use gradestat_query::algorithms::record_decoder::RecordSchema;
pub use gradestat_query::config::EngineConfig;
pub use gradestat_query::result::{ErrorReport, ResultSet, RunOutput, SpecResult, Summary};
pub use gradestat_query::spec::{AggregationSpec, Bucketing, KeySpec, MeasureSpec};
pub use gradestat_types::error::{DecodeError, GradeStatError, Result};
pub use gradestat_types::group_key::{GroupKey, KeyPart};
pub use gradestat_types::record::{Field, Record};
