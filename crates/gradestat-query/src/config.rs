//! Per-engine configuration.
//!
//! Defaults come from the process-wide knobs in `gradestat-config`, which
//! honour `GRADESTAT_*` environment variables.

/// Configuration for one [`Engine`](crate::execute::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum skipped rows retained as samples in the error report.
    pub error_sample_limit: usize,

    /// Stop after this many data rows (header excluded). `None` reads the
    /// whole stream.
    pub row_limit: Option<usize>,

    /// Decimal places used when emitting summaries.
    pub decimal_places: u32,

    /// Shards for the parallel runner. `0` means one per rayon thread.
    pub partitions: usize,

    /// Rows the parallel runner buffers before folding them on rayon.
    pub chunk_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            error_sample_limit: gradestat_config::get_error_sample_limit(),
            row_limit: None,
            decimal_places: 2,
            partitions: gradestat_config::get_partitions(),
            chunk_rows: gradestat_config::get_chunk_rows(),
        }
    }
}

impl EngineConfig {
    pub fn with_row_limit(mut self, limit: usize) -> Self {
        self.row_limit = Some(limit);
        self
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_chunk_rows(mut self, rows: usize) -> Self {
        self.chunk_rows = rows.max(1);
        self
    }

    /// Shard count actually used by the parallel runner (never zero).
    pub fn effective_partitions(&self) -> usize {
        match self.partitions {
            0 => rayon::current_num_threads().max(1),
            n => n,
        }
    }
}
