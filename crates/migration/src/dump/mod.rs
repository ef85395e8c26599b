//! Dump phase: source series to CSV files.
//!
//! Series are discovered per table, written to a label manifest, and then
//! dumped one station at a time with at most `max_conn` concurrent queries.

pub mod arch;
pub mod qcdb;

use std::fs::{self, File};
use std::io::BufWriter;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use obs_common::codec::write_series;
use obs_common::{CsvRecord, TimeWindow};

use crate::error::Result;

pub use arch::dump_arch_table;
pub use qcdb::dump_qcdb_table;

/// Options shared by every dumped table.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Root of the dump tree.
    pub path: PathBuf,
    pub window: TimeWindow,
    /// Re-dump series whose file already exists.
    pub overwrite: bool,
    /// Maximum concurrent source queries.
    pub max_conn: usize,
    /// Re-query the label list instead of reusing an existing manifest.
    pub update_labels: bool,
    pub show_progress: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./dumps"),
            window: TimeWindow::unbounded(),
            overwrite: false,
            max_conn: 4,
            update_labels: false,
            show_progress: false,
        }
    }
}

/// Per-table dump totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpSummary {
    pub written: usize,
    pub rows: usize,
    pub existing: usize,
    pub empty: usize,
    pub failed: usize,
    pub panicked: usize,
}

impl AddAssign for DumpSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.written += rhs.written;
        self.rows += rhs.rows;
        self.existing += rhs.existing;
        self.empty += rhs.empty;
        self.failed += rhs.failed;
        self.panicked += rhs.panicked;
    }
}

impl DumpSummary {
    pub(crate) fn from_outcome(outcome: SeriesOutcome) -> Self {
        let mut summary = Self::default();
        match outcome {
            SeriesOutcome::Written(rows) => {
                summary.written = 1;
                summary.rows = rows;
            }
            SeriesOutcome::Exists => summary.existing = 1,
            SeriesOutcome::Empty => summary.empty = 1,
            SeriesOutcome::Failed => summary.failed = 1,
        }
        summary
    }

    /// Fold one station batch into the totals.
    pub(crate) fn absorb(&mut self, results: Vec<Option<DumpSummary>>) {
        for result in results {
            match result {
                Some(summary) => *self += summary,
                None => self.panicked += 1,
            }
        }
    }
}

/// What happened to one series file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeriesOutcome {
    Written(usize),
    Exists,
    Empty,
    Failed,
}

/// Whether the series at `path` must be queried at all.
pub(crate) fn needs_dump(path: &Path, overwrite: bool) -> bool {
    overwrite || !path.exists()
}

/// Write one series file, logging against `series`.
///
/// Nothing is written for an empty result. A failed write removes the
/// partial file.
pub(crate) fn write_dump_file<T: CsvRecord>(
    path: &Path,
    records: &[T],
    series: &str,
) -> SeriesOutcome {
    if records.is_empty() {
        warn!(series, "EMPTY_QUERY");
        return SeriesOutcome::Empty;
    }

    match write_records(path, records) {
        Ok(()) => SeriesOutcome::Written(records.len()),
        Err(e) => {
            error!(series, path = %path.display(), error = %e, "Failed to write dump file");
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove partial dump file");
                }
            }
            SeriesOutcome::Failed
        }
    }
}

fn write_records<T: CsvRecord>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = BufWriter::new(File::create(path)?);
    let file = write_series(file, records)?;
    file.into_inner()
        .map_err(|e| e.into_error())?
        .sync_all()?;
    Ok(())
}
