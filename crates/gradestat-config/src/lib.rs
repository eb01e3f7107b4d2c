//! Global configuration for the gradestat runtime.
//!
//! Values are initialized from environment variables on first access and
//! can be overridden at runtime via setter functions.
//!
//! - `GRADESTAT_ERROR_SAMPLE_LIMIT`: Maximum number of skipped rows kept as
//!   samples in a run's error report. Counts are always exact; only the
//!   retained samples are capped. Default: 20.
//!
//! - `GRADESTAT_PARTITIONS`: Number of shards used by the parallel runner.
//!   `0` means one shard per rayon worker thread. Default: 0.
//!
//! - `GRADESTAT_CHUNK_ROWS`: Rows buffered by the parallel runner before a
//!   chunk is sharded and folded. Bounds its memory use. Default: 65536.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const DEFAULT_ERROR_SAMPLE_LIMIT: usize = 20;
const DEFAULT_PARTITIONS: usize = 0;
const DEFAULT_CHUNK_ROWS: usize = 65_536;

// ---------------------------------------------------------------------------
// Atomic globals
// ---------------------------------------------------------------------------

static ERROR_SAMPLE_LIMIT: AtomicUsize = AtomicUsize::new(DEFAULT_ERROR_SAMPLE_LIMIT);
static PARTITIONS: AtomicUsize = AtomicUsize::new(DEFAULT_PARTITIONS);
static CHUNK_ROWS: AtomicUsize = AtomicUsize::new(DEFAULT_CHUNK_ROWS);

static INIT: Once = Once::new();

/// Ensure environment variable overrides are applied (idempotent).
fn ensure_init() {
    INIT.call_once(|| {
        if let Ok(val) = std::env::var("GRADESTAT_ERROR_SAMPLE_LIMIT") {
            if let Ok(n) = parse_count(&val) {
                ERROR_SAMPLE_LIMIT.store(n, Ordering::Relaxed);
            }
        }
        if let Ok(val) = std::env::var("GRADESTAT_PARTITIONS") {
            if let Ok(n) = parse_count(&val) {
                PARTITIONS.store(n, Ordering::Relaxed);
            }
        }
        if let Ok(val) = std::env::var("GRADESTAT_CHUNK_ROWS") {
            if let Ok(n) = parse_count(&val) {
                CHUNK_ROWS.store(n.max(1), Ordering::Relaxed);
            }
        }
    });
}

/// Parse a non-negative count. Accepts `_` digit separators (`10_000`).
fn parse_count(s: &str) -> Result<usize, ()> {
    let cleaned: String = s.trim().chars().filter(|&c| c != '_').collect();
    cleaned.parse::<usize>().map_err(|_| ())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Get the maximum number of skipped-row samples kept per run.
pub fn get_error_sample_limit() -> usize {
    ensure_init();
    ERROR_SAMPLE_LIMIT.load(Ordering::Relaxed)
}

/// Set the maximum number of skipped-row samples kept per run.
pub fn set_error_sample_limit(limit: usize) {
    ensure_init();
    ERROR_SAMPLE_LIMIT.store(limit, Ordering::Relaxed);
}

/// Get the shard count for the parallel runner (`0` = worker thread count).
pub fn get_partitions() -> usize {
    ensure_init();
    PARTITIONS.load(Ordering::Relaxed)
}

/// Set the shard count for the parallel runner.
pub fn set_partitions(partitions: usize) {
    ensure_init();
    PARTITIONS.store(partitions, Ordering::Relaxed);
}

/// Get the number of rows buffered per parallel chunk.
pub fn get_chunk_rows() -> usize {
    ensure_init();
    CHUNK_ROWS.load(Ordering::Relaxed)
}

/// Set the number of rows buffered per parallel chunk (at least 1).
pub fn set_chunk_rows(rows: usize) {
    ensure_init();
    CHUNK_ROWS.store(rows.max(1), Ordering::Relaxed);
}
