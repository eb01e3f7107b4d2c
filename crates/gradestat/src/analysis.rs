//! File-level entry point.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use gradestat_query::algorithms::analyses::canonical_specs;
use gradestat_query::algorithms::csv_tokenizer::{CsvConfig, RowReader};
use gradestat_query::algorithms::record_decoder::RecordSchema;
use gradestat_query::config::EngineConfig;
use gradestat_query::execute::{row_stream, Engine};
use gradestat_query::result::RunOutput;
use gradestat_query::spec::AggregationSpec;
use gradestat_types::error::{GradeStatError, Result};

/// Column layout of an input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Comma-delimited, school in the first column.
    Comma,
    /// Semicolon-delimited, sex in the first column.
    Semicolon,
    /// Positions resolved from the file's own header row.
    Header { delimiter: char },
    /// Caller-supplied column mapping.
    Custom(RecordSchema),
}

impl Layout {
    pub fn delimiter(&self) -> char {
        match self {
            Layout::Comma => ',',
            Layout::Semicolon => ';',
            Layout::Header { delimiter } => *delimiter,
            Layout::Custom(schema) => schema.delimiter(),
        }
    }

    fn fixed_schema(&self) -> Option<RecordSchema> {
        match self {
            Layout::Comma => Some(RecordSchema::comma()),
            Layout::Semicolon => Some(RecordSchema::semicolon()),
            Layout::Header { .. } => None,
            Layout::Custom(schema) => Some(schema.clone()),
        }
    }
}

/// Runs a set of aggregation specs over student files.
pub struct StudentAnalysis {
    layout: Layout,
    specs: Vec<AggregationSpec>,
    config: EngineConfig,
    parallel: bool,
}

impl StudentAnalysis {
    /// All built-in specs with default configuration.
    pub fn new(layout: Layout) -> Self {
        StudentAnalysis {
            layout,
            specs: canonical_specs(),
            config: EngineConfig::default(),
            parallel: false,
        }
    }

    pub fn with_specs(mut self, specs: Vec<AggregationSpec>) -> Self {
        self.specs = specs;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Shard the input across rayon workers instead of a single pass.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn specs(&self) -> &[AggregationSpec] {
        &self.specs
    }

    /// Analyze the file at `path`.
    pub fn analyze_file(&self, path: impl AsRef<Path>) -> Result<RunOutput> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            GradeStatError::Stream(format!("cannot open {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), layout = ?self.layout, "analyzing file");
        self.analyze_reader(BufReader::new(file))
    }

    /// Analyze delimited text already in memory.
    pub fn analyze_str(&self, content: &str) -> Result<RunOutput> {
        self.analyze_reader(content.as_bytes())
    }

    /// Analyze rows read from `reader`.
    pub fn analyze_reader<R: BufRead>(&self, reader: R) -> Result<RunOutput> {
        let mut rows = RowReader::new(reader, CsvConfig::with_delimiter(self.layout.delimiter()));

        let (schema, first) = match self.layout.fixed_schema() {
            Some(schema) => (schema, None),
            None => match rows.next().transpose()? {
                Some(header) => (
                    RecordSchema::from_header(&header.fields, self.layout.delimiter())?,
                    Some(header),
                ),
                None => {
                    return Err(GradeStatError::Schema(
                        "input is empty, no header row to read".to_string(),
                    ))
                }
            },
        };

        let engine = self.engine(schema)?;
        let rows = first.map(Ok).into_iter().chain(rows);
        if self.parallel {
            engine.run_parallel_iter(rows)
        } else {
            engine.run_iter(rows)
        }
    }

    /// Single pass over `reader` on the async engine loop. Only fixed
    /// layouts are supported here.
    pub async fn analyze_async<R>(&self, reader: R) -> Result<RunOutput>
    where
        R: BufRead + Send + 'static,
    {
        let schema = self.layout.fixed_schema().ok_or_else(|| {
            GradeStatError::Schema("header layouts need a synchronous reader".to_string())
        })?;
        let config = schema.csv_config();
        let engine = self.engine(schema)?;
        engine.run(row_stream(RowReader::new(reader, config))).await
    }

    fn engine(&self, schema: RecordSchema) -> Result<Engine> {
        Engine::new(schema, self.specs.clone(), self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "school,sex,age,address,famsize,Pstatus,Medu,Fedu,Mjob,Fjob,reason,guardian,traveltime,studytime,failures,schoolsup,famsup,paid,activities,nursery,higher,internet,romantic,famrel,freetime,goout,Dalc,Walc,health,absences,G1,G2,G3";

    fn row(sex: &str, absences: i64, g3: i64) -> String {
        format!(
            "GP,{},17,U,GT3,T,4,3,teacher,other,course,mother,1,2,0,no,yes,no,no,yes,yes,yes,no,4,3,3,1,1,5,{},10,11,{}",
            sex, absences, g3
        )
    }

    #[test]
    fn test_analyze_str_comma() {
        let content = format!("{}\n{}\n{}\n{}\n", HEADER, row("F", 2, 12), row("F", 3, 11), row("M", 4, 9));
        let output = StudentAnalysis::new(Layout::Comma).analyze_str(&content).unwrap();
        assert_eq!(output.rows_seen, 3);
        let gender = output.results.get("gender_grades").unwrap();
        assert_eq!(gender.summary("F").unwrap().count, 2);
        assert_eq!(gender.summary("F").unwrap().mean("grade_final"), Some(11.5));
    }

    #[test]
    fn test_header_layout_resolves_columns() {
        let content = format!("{}\n{}\n", HEADER, row("M", 12, 8));
        let output = StudentAnalysis::new(Layout::Header { delimiter: ',' })
            .analyze_str(&content)
            .unwrap();
        assert_eq!(output.records_decoded, 1);
        let absence = output.results.get("absence_impact").unwrap();
        assert_eq!(absence.summary("10+").unwrap().count, 1);
    }

    #[test]
    fn test_header_layout_empty_input() {
        let err = StudentAnalysis::new(Layout::Header { delimiter: ',' })
            .analyze_str("")
            .unwrap_err();
        assert!(matches!(err, GradeStatError::Schema(_)));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut content = format!("{}\n", HEADER);
        for i in 0..40 {
            content.push_str(&row(if i % 3 == 0 { "M" } else { "F" }, i % 13, 5 + i % 11));
            content.push('\n');
        }
        let analysis = StudentAnalysis::new(Layout::Comma);
        let sequential = analysis.analyze_str(&content).unwrap();
        let parallel = StudentAnalysis::new(Layout::Comma)
            .with_config(EngineConfig::default().with_partitions(4))
            .parallel(true)
            .analyze_str(&content)
            .unwrap();
        assert!(sequential.results.approx_eq(&parallel.results, 1e-9));
    }

    #[tokio::test]
    async fn test_analyze_async() {
        let content = format!("{}\n{}\n", HEADER, row("F", 0, 14));
        let output = StudentAnalysis::new(Layout::Comma)
            .analyze_async(std::io::Cursor::new(content.into_bytes()))
            .await
            .unwrap();
        assert_eq!(output.records_decoded, 1);
    }
}
