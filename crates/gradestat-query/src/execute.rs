//! Aggregation engine.
//!
//! Consumes a stream of tokenized rows in a single pass: each row is decoded
//! once and the resulting record is folded into every spec's accumulator
//! table. Rows that fail to decode are counted in the error report and
//! touch no accumulator; a failure of the row source itself aborts the run.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use gradestat_types::error::{DecodeErrorKind, GradeStatError, Result};
use gradestat_types::record::Record;

use crate::algorithms::analyses::canonical_specs;
use crate::algorithms::csv_tokenizer::RawRow;
use crate::algorithms::groupby::AccumulatorTable;
use crate::algorithms::record_decoder::{decode, RecordSchema};
use crate::config::EngineConfig;
use crate::result::{ErrorReport, ResultSet, RunOutput};
use crate::spec::AggregationSpec;

/// A stream of tokenized rows.
pub type RowStream = Pin<Box<dyn Stream<Item = Result<RawRow>> + Send>>;

/// Wrap any row iterator as a [`RowStream`].
pub fn row_stream<I>(rows: I) -> RowStream
where
    I: IntoIterator<Item = Result<RawRow>>,
    I::IntoIter: Send + 'static,
{
    Box::pin(stream::iter(rows))
}

/// Per-shard aggregation state: one accumulator table per spec plus the
/// shard's error report.
///
/// External runners can fold shards independently and combine them with
/// [`merge`](Self::merge); the result equals a single pass over all rows.
pub struct PartialAggregation {
    schema: Arc<RecordSchema>,
    tables: Vec<AccumulatorTable>,
    errors: ErrorReport,
    rows_seen: u64,
    records_decoded: u64,
}

impl PartialAggregation {
    fn new(schema: Arc<RecordSchema>, specs: &[Arc<AggregationSpec>], sample_limit: usize) -> Self {
        PartialAggregation {
            schema,
            tables: specs.iter().cloned().map(AccumulatorTable::new).collect(),
            errors: ErrorReport::new(sample_limit),
            rows_seen: 0,
            records_decoded: 0,
        }
    }

    /// Decode one row and fold it into every table, or record why it was
    /// skipped.
    pub fn fold_row(&mut self, row: &RawRow) {
        self.rows_seen += 1;
        match decode(&row.fields, &self.schema) {
            Ok(record) => self.fold_record(&record),
            Err(e) => {
                debug!(line = row.line, error = %e, "skipping row");
                self.errors.record(row.line, &row.fields, e);
            }
        }
    }

    /// Fold an already decoded record into every table.
    pub fn fold_record(&mut self, record: &Record) {
        self.records_decoded += 1;
        for table in &mut self.tables {
            table.fold(record);
        }
    }

    pub fn rows_seen(&self) -> u64 {
        self.rows_seen
    }

    pub fn errors(&self) -> &ErrorReport {
        &self.errors
    }

    /// Combine with a partial built by the same engine over other rows.
    pub fn merge(&mut self, other: PartialAggregation) -> Result<()> {
        if self.tables.len() != other.tables.len() {
            return Err(GradeStatError::Merge(format!(
                "partials cover {} and {} specs",
                self.tables.len(),
                other.tables.len()
            )));
        }
        for (table, theirs) in self.tables.iter_mut().zip(other.tables) {
            table.merge(theirs)?;
        }
        self.errors.merge(other.errors);
        self.rows_seen += other.rows_seen;
        self.records_decoded += other.records_decoded;
        Ok(())
    }

    /// Finalize every table into the result set.
    pub fn finish(self) -> RunOutput {
        let results = ResultSet::new(
            self.tables
                .into_iter()
                .map(AccumulatorTable::finalize)
                .collect(),
        );

        info!(
            rows = self.rows_seen,
            decoded = self.records_decoded,
            specs = results.len(),
            groups = results.num_groups(),
            "aggregation complete"
        );
        if !self.errors.is_empty() {
            warn!(
                skipped = self.errors.total(),
                schema_errors = self.errors.count(DecodeErrorKind::Schema),
                type_errors = self.errors.count(DecodeErrorKind::Type),
                "rows skipped during decoding"
            );
        }

        RunOutput {
            results,
            errors: self.errors,
            rows_seen: self.rows_seen,
            records_decoded: self.records_decoded,
        }
    }
}

/// What to do with the next row of a stream.
enum Step {
    Fold,
    SkipHeader,
    Stop,
}

/// Runs a fixed set of specs over row streams.
pub struct Engine {
    schema: Arc<RecordSchema>,
    specs: Vec<Arc<AggregationSpec>>,
    config: EngineConfig,
}

impl Engine {
    /// Validate `specs` and build an engine. Spec names must be unique.
    pub fn new(
        schema: RecordSchema,
        specs: Vec<AggregationSpec>,
        config: EngineConfig,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for spec in &specs {
            spec.validate()?;
            if !seen.insert(spec.name().to_string()) {
                return Err(GradeStatError::Spec(format!(
                    "duplicate spec name `{}`",
                    spec.name()
                )));
            }
        }

        Ok(Engine {
            schema: Arc::new(schema),
            specs: specs.into_iter().map(Arc::new).collect(),
            config,
        })
    }

    /// An engine running the full built-in catalog.
    pub fn with_canonical_specs(schema: RecordSchema, config: EngineConfig) -> Result<Self> {
        Self::new(schema, canonical_specs(), config)
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn specs(&self) -> impl Iterator<Item = &AggregationSpec> {
        self.specs.iter().map(|s| s.as_ref())
    }

    /// Empty per-shard state for this engine's specs.
    pub fn partial(&self) -> PartialAggregation {
        PartialAggregation::new(
            self.schema.clone(),
            &self.specs,
            self.config.error_sample_limit,
        )
    }

    fn step(&self, partial: &PartialAggregation, is_first: bool, row: &RawRow) -> Step {
        if is_first && self.schema.is_header(&row.fields) {
            return Step::SkipHeader;
        }
        match self.config.row_limit {
            Some(limit) if partial.rows_seen() >= limit as u64 => Step::Stop,
            _ => Step::Fold,
        }
    }

    /// Single pass over an async row stream.
    pub async fn run(&self, mut rows: RowStream) -> Result<RunOutput> {
        info!(specs = self.specs.len(), "starting aggregation");
        let mut partial = self.partial();
        let mut is_first = true;

        while let Some(row) = rows.next().await {
            let row = row?;
            match self.step(&partial, std::mem::take(&mut is_first), &row) {
                Step::Fold => partial.fold_row(&row),
                Step::SkipHeader => debug!(line = row.line, "skipping header row"),
                Step::Stop => break,
            }
        }

        Ok(partial.finish())
    }

    /// [`run`](Self::run) on a fresh tokio runtime.
    pub fn run_sync(&self, rows: RowStream) -> Result<RunOutput> {
        let rt = tokio::runtime::Runtime::new().map_err(GradeStatError::Io)?;
        rt.block_on(self.run(rows))
    }

    /// Single pass over a blocking row iterator.
    pub fn run_iter<I>(&self, rows: I) -> Result<RunOutput>
    where
        I: IntoIterator<Item = Result<RawRow>>,
    {
        info!(specs = self.specs.len(), "starting aggregation");
        let mut partial = self.partial();
        let mut is_first = true;

        for row in rows {
            let row = row?;
            match self.step(&partial, std::mem::take(&mut is_first), &row) {
                Step::Fold => partial.fold_row(&row),
                Step::SkipHeader => debug!(line = row.line, "skipping header row"),
                Step::Stop => break,
            }
        }

        Ok(partial.finish())
    }

    /// [`run_parallel_iter`](Self::run_parallel_iter) over rows already in
    /// memory.
    pub fn run_parallel(&self, rows: Vec<RawRow>) -> Result<RunOutput> {
        self.run_parallel_iter(rows.into_iter().map(Ok))
    }

    /// Read `rows` in chunks of `chunk_rows`, shard each chunk across rayon
    /// workers and merge the chunk's partial into the running total. At most
    /// one chunk is buffered at a time.
    pub fn run_parallel_iter<I>(&self, rows: I) -> Result<RunOutput>
    where
        I: IntoIterator<Item = Result<RawRow>>,
    {
        let chunk_rows = self.config.chunk_rows.max(1);
        info!(
            specs = self.specs.len(),
            partitions = self.config.effective_partitions(),
            chunk_rows,
            "starting parallel aggregation"
        );

        let mut total = self.partial();
        let mut chunk = Vec::with_capacity(chunk_rows);
        let mut is_first = true;
        let mut taken = 0usize;

        for row in rows {
            let row = row?;
            if std::mem::take(&mut is_first) && self.schema.is_header(&row.fields) {
                debug!(line = row.line, "skipping header row");
                continue;
            }
            if self.config.row_limit.is_some_and(|limit| taken >= limit) {
                break;
            }
            taken += 1;
            chunk.push(row);
            if chunk.len() == chunk_rows {
                total.merge(self.fold_chunk(&chunk)?)?;
                chunk.clear();
            }
        }
        if !chunk.is_empty() {
            total.merge(self.fold_chunk(&chunk)?)?;
        }

        Ok(total.finish())
    }

    /// Fold one chunk as `partitions` shards in parallel.
    fn fold_chunk(&self, rows: &[RawRow]) -> Result<PartialAggregation> {
        let shard_size = rows
            .len()
            .div_ceil(self.config.effective_partitions())
            .max(1);

        rows.par_chunks(shard_size)
            .map(|shard| -> Result<PartialAggregation> {
                let mut partial = self.partial();
                for row in shard {
                    partial.fold_row(row);
                }
                Ok(partial)
            })
            .try_reduce(
                || self.partial(),
                |mut a, b| {
                    a.merge(b)?;
                    Ok(a)
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::record_decoder::tests::comma_row;
    use gradestat_types::record::Field;

    fn row(line: u64, fields: Vec<String>) -> RawRow {
        RawRow::new(line, fields)
    }

    fn gender_engine() -> Engine {
        let spec = AggregationSpec::mean("gender_grades")
            .group_by_field(Field::Gender)
            .measure_fields(&[Field::GradePeriod1, Field::GradePeriod2, Field::GradeFinal]);
        Engine::new(RecordSchema::comma(), vec![spec], EngineConfig::default()).unwrap()
    }

    fn scenario_a() -> Vec<RawRow> {
        vec![
            row(1, comma_row("F", 0, [10, 12, 14])),
            row(2, comma_row("F", 0, [8, 10, 9])),
            row(3, comma_row("M", 0, [15, 15, 16])),
        ]
    }

    #[tokio::test]
    async fn test_gender_means() {
        let out = gender_engine()
            .run(row_stream(scenario_a().into_iter().map(Ok)))
            .await
            .unwrap();
        let gender = out.results.get("gender_grades").unwrap();
        assert_eq!(gender.summary("F").unwrap().means(), vec![9.0, 11.0, 11.5]);
        assert_eq!(gender.summary("M").unwrap().means(), vec![15.0, 15.0, 16.0]);
        assert_eq!(out.rows_seen, 3);
        assert_eq!(out.records_decoded, 3);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_absence_buckets_end_to_end() {
        let spec = AggregationSpec::mean("absence_impact")
            .group_by(crate::spec::KeySpec::bucketed(
                Field::Absences,
                crate::spec::Bucketing::absences(),
            ))
            .measure_fields(&[Field::GradeFinal]);
        let engine = Engine::new(RecordSchema::comma(), vec![spec], EngineConfig::default()).unwrap();
        let rows = [2, 6, 11]
            .iter()
            .enumerate()
            .map(|(i, a)| Ok(row(i as u64 + 1, comma_row("F", *a, [10, 10, 10]))));
        let out = engine.run_iter(rows).unwrap();
        let result = out.results.get("absence_impact").unwrap();
        assert_eq!(result.labels(), vec!["0-4", "5-9", "10+"]);
        for label in ["0-4", "5-9", "10+"] {
            assert_eq!(result.summary(label).unwrap().mean("grade_final"), Some(10.0));
        }
    }

    #[test]
    fn test_malformed_row_does_not_abort() {
        let mut rows = scenario_a();
        rows.insert(1, RawRow::from_strs(9, &["F", "GP"]));
        let out = gender_engine().run_iter(rows.into_iter().map(Ok)).unwrap();

        assert_eq!(out.errors.total(), 1);
        assert_eq!(out.errors.count(DecodeErrorKind::Schema), 1);
        assert_eq!(out.errors.samples()[0].line, 9);
        assert_eq!(out.errors.samples()[0].raw, vec!["F", "GP"]);
        assert_eq!(out.rows_seen, 4);
        assert_eq!(out.records_decoded, 3);
        let gender = out.results.get("gender_grades").unwrap();
        assert_eq!(gender.summary("F").unwrap().count, 2);
    }

    #[test]
    fn test_type_error_row_contributes_nothing() {
        let mut bad = comma_row("X", 0, [1, 1, 1]);
        bad[31] = "eleven".into();
        let rows = vec![row(1, bad), row(2, comma_row("F", 0, [10, 10, 10]))];
        let out = gender_engine().run_iter(rows.into_iter().map(Ok)).unwrap();
        assert_eq!(out.errors.count(DecodeErrorKind::Type), 1);
        let gender = out.results.get("gender_grades").unwrap();
        assert!(gender.summary("X").is_none());
        assert_eq!(gender.len(), 1);
    }

    #[test]
    fn test_all_rows_fail() {
        let rows = (1..=5).map(|i| Ok(RawRow::from_strs(i, &["garbage"])));
        let out = gender_engine().run_iter(rows).unwrap();
        assert_eq!(out.errors.total(), 5);
        assert_eq!(out.records_decoded, 0);
        assert!(out.results.get("gender_grades").unwrap().is_empty());
    }

    #[test]
    fn test_header_only_skipped_at_start() {
        let header = RawRow::from_strs(1, &["school", "sex"]);
        let mut rows = vec![header.clone()];
        rows.extend(scenario_a());
        rows.push(header);
        let out = gender_engine().run_iter(rows.into_iter().map(Ok)).unwrap();
        // The trailing copy is a data row and fails to decode.
        assert_eq!(out.rows_seen, 4);
        assert_eq!(out.errors.count(DecodeErrorKind::Schema), 1);
    }

    #[test]
    fn test_stream_error_is_fatal() {
        let rows = vec![
            Ok(row(1, comma_row("F", 0, [1, 2, 3]))),
            Err(GradeStatError::Stream("disk gone".into())),
        ];
        let result = gender_engine().run_sync(row_stream(rows));
        assert!(matches!(result, Err(GradeStatError::Stream(_))));
    }

    #[test]
    fn test_row_limit() {
        let config = EngineConfig::default().with_row_limit(2);
        let spec = AggregationSpec::mean("g")
            .group_by_field(Field::Gender)
            .measure_fields(&[Field::GradeFinal]);
        let engine = Engine::new(RecordSchema::comma(), vec![spec], config).unwrap();
        let out = engine.run_iter(scenario_a().into_iter().map(Ok)).unwrap();
        assert_eq!(out.rows_seen, 2);
        assert!(out.results.get("g").unwrap().summary("M").is_none());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut rows = Vec::new();
        for i in 0..200u64 {
            let gender = if i % 3 == 0 { "M" } else { "F" };
            let g = (i % 21) as i64;
            rows.push(row(i + 1, comma_row(gender, (i % 13) as i64, [g, 20 - g, (g * 7) % 21])));
        }
        rows.push(RawRow::from_strs(500, &["broken"]));

        let config = EngineConfig::default().with_partitions(7);
        let engine =
            Engine::with_canonical_specs(RecordSchema::comma(), config).unwrap();
        let sequential = engine.run_iter(rows.clone().into_iter().map(Ok)).unwrap();
        let parallel = engine.run_parallel(rows).unwrap();

        assert_eq!(parallel.rows_seen, sequential.rows_seen);
        assert_eq!(parallel.errors.total(), 1);
        for (p, s) in parallel.results.rows().zip(sequential.results.rows()) {
            assert_eq!(p.spec, s.spec);
            assert_eq!(p.key, s.key);
            assert_eq!(p.summary.count, s.summary.count);
            for (pm, sm) in p.summary.measures.iter().zip(&s.summary.measures) {
                assert!((pm.mean - sm.mean).abs() < 1e-9);
            }
            assert_eq!(p.summary.distinct, s.summary.distinct);
        }
        assert_eq!(parallel.results.num_groups(), sequential.results.num_groups());
    }

    fn mixed_rows(n: u64) -> Vec<RawRow> {
        (0..n)
            .map(|i| {
                let gender = if i % 2 == 0 { "F" } else { "M" };
                let g = (i * 7 % 20) as i64;
                row(i + 2, comma_row(gender, (i % 15) as i64, [g, (g + 5) % 20, (g + 11) % 20]))
            })
            .collect()
    }

    #[test]
    fn test_parallel_iter_folds_in_bounded_chunks() {
        let header = RawRow::from_strs(1, &["school", "sex"]);
        let mut rows = vec![header];
        rows.extend(mixed_rows(103));
        rows.insert(50, RawRow::from_strs(999, &["broken"]));

        let engine = Engine::with_canonical_specs(
            RecordSchema::comma(),
            EngineConfig::default().with_partitions(3).with_chunk_rows(16),
        )
        .unwrap();
        let sequential = engine.run_iter(rows.clone().into_iter().map(Ok)).unwrap();
        let chunked = engine.run_parallel_iter(rows.into_iter().map(Ok)).unwrap();

        assert_eq!(chunked.rows_seen, 104);
        assert_eq!(chunked.records_decoded, 103);
        assert_eq!(chunked.errors.samples()[0].line, 999);
        assert!(chunked.results.approx_eq(&sequential.results, 1e-9));
    }

    #[test]
    fn test_parallel_iter_row_limit_spans_chunks() {
        let engine = Engine::new(
            RecordSchema::comma(),
            vec![AggregationSpec::mean("g")
                .group_by_field(Field::Gender)
                .measure_fields(&[Field::GradeFinal])],
            EngineConfig::default().with_row_limit(21).with_chunk_rows(8),
        )
        .unwrap();
        let out = engine
            .run_parallel_iter(mixed_rows(40).into_iter().map(Ok))
            .unwrap();
        assert_eq!(out.rows_seen, 21);
        let g = out.results.get("g").unwrap();
        assert_eq!(g.summary("F").unwrap().count, 11);
        assert_eq!(g.summary("M").unwrap().count, 10);
    }

    #[test]
    fn test_parallel_iter_stream_error_is_fatal() {
        let mut rows: Vec<Result<RawRow>> = mixed_rows(10).into_iter().map(Ok).collect();
        rows.push(Err(GradeStatError::Stream("truncated read".into())));
        let engine = Engine::with_canonical_specs(
            RecordSchema::comma(),
            EngineConfig::default().with_chunk_rows(4),
        )
        .unwrap();
        assert!(matches!(
            engine.run_parallel_iter(rows),
            Err(GradeStatError::Stream(_))
        ));
    }

    #[test]
    fn test_run_sync_matches_run_iter() {
        let engine = gender_engine();
        let via_runtime = engine
            .run_sync(row_stream(scenario_a().into_iter().map(Ok)))
            .unwrap();
        let blocking = engine.run_iter(scenario_a().into_iter().map(Ok)).unwrap();
        assert_eq!(via_runtime.results, blocking.results);
    }

    #[test]
    fn test_duplicate_spec_names_rejected() {
        let spec = AggregationSpec::mean("g")
            .group_by_field(Field::Gender)
            .measure_fields(&[Field::GradeFinal]);
        let result = Engine::new(
            RecordSchema::comma(),
            vec![spec.clone(), spec],
            EngineConfig::default(),
        );
        assert!(matches!(result, Err(GradeStatError::Spec(_))));
    }

    #[test]
    fn test_partial_merge_rejects_other_engine() {
        let mut a = gender_engine().partial();
        let b = Engine::with_canonical_specs(RecordSchema::comma(), EngineConfig::default())
            .unwrap()
            .partial();
        assert!(matches!(a.merge(b), Err(GradeStatError::Merge(_))));
    }
}
