//! Import phase: CSV files to the destination.
//!
//! A dump tree is walked one station directory at a time. Every series file
//! becomes one task, bounded by `max_workers`, that reads and filters the
//! file, resolves the destination timeseries, converts the rows and
//! bulk-inserts them. Each task ends in exactly one [`FileOutcome`].

pub mod arch;
pub mod qcdb;

use std::fmt;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use obs_common::label::DUMP_EXTENSION;
use obs_common::{
    CsvRecord, QcdbDataRecord, QcdbTextRecord, RawObservation, SeriesReader, SeriesTimespan,
    TimeWindow,
};
use storage::Destination;

use crate::convert::ConvertedBatch;
use crate::error::{MigrationError, Result};

pub use arch::import_arch_table;
pub use qcdb::import_qcdb_table;

/// Options shared by every imported table.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Root of the dump tree.
    pub path: PathBuf,
    pub window: TimeWindow,
    /// Field delimiter of the dump files.
    pub sep: u8,
    /// Dump files carry a column header after the count line.
    pub has_header: bool,
    /// Maximum concurrent file tasks.
    pub max_workers: usize,
    pub show_progress: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./dumps"),
            window: TimeWindow::unbounded(),
            sep: b',',
            has_header: false,
            max_workers: 8,
            show_progress: false,
        }
    }
}

/// Why a series was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Element code that is never migrated.
    InvalidElement,
    MissingMetadata,
    Restricted,
    NoRows,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::InvalidElement => "invalid element",
            SkipReason::MissingMetadata => "missing metadata",
            SkipReason::Restricted => "restricted",
            SkipReason::NoRows => "no rows",
        };
        f.write_str(reason)
    }
}

/// Terminal state of one series file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Inserted(u64),
    Skipped(SkipReason),
    Failed(String),
}

/// Per-table import totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Observation rows inserted; flag rows are not counted.
    pub inserted: u64,
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub panicked: usize,
}

impl ImportSummary {
    pub(crate) fn absorb(&mut self, results: Vec<Option<FileOutcome>>) {
        for result in results {
            match result {
                Some(FileOutcome::Inserted(_)) => self.imported += 1,
                Some(FileOutcome::Skipped(_)) => self.skipped += 1,
                Some(FileOutcome::Failed(_)) => self.failed += 1,
                None => self.panicked += 1,
            }
        }
    }
}

impl AddAssign for ImportSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.imported += rhs.imported;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
        self.panicked += rhs.panicked;
    }
}

/// Observation time of a dump record.
pub(crate) trait Timed {
    fn obstime(&self) -> DateTime<Utc>;
}

impl Timed for RawObservation {
    fn obstime(&self) -> DateTime<Utc> {
        self.obstime
    }
}

impl Timed for QcdbDataRecord {
    fn obstime(&self) -> DateTime<Utc> {
        self.obstime
    }
}

impl Timed for QcdbTextRecord {
    fn obstime(&self) -> DateTime<Utc> {
        self.obstime
    }
}

/// Which rows of an ordered series file are imported.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RowBounds {
    pub span: SeriesTimespan,
    pub window: TimeWindow,
    /// First year that is never imported.
    pub until_year: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowCheck {
    Keep,
    Skip,
    /// This and every later row is out of bounds.
    Stop,
}

impl RowBounds {
    pub fn check(&self, t: &DateTime<Utc>) -> RowCheck {
        if self.span.past_end(t)
            || self.window.to.is_some_and(|to| *t >= to)
            || self.until_year.is_some_and(|until| t.year() >= until)
        {
            return RowCheck::Stop;
        }
        if self.span.before_start(t) || self.window.from.is_some_and(|from| *t < from) {
            return RowCheck::Skip;
        }
        RowCheck::Keep
    }
}

/// Upper bound on rows reserved from a file's count line, which is only a hint.
const MAX_RESERVED_ROWS: usize = 1 << 16;

/// Read the in-bounds records of a series file.
pub(crate) fn read_series<T: CsvRecord + Timed>(
    path: &Path,
    sep: u8,
    has_header: bool,
    bounds: &RowBounds,
) -> Result<Vec<T>> {
    let mut reader = SeriesReader::open(path, sep, has_header)?;
    let expected = reader.expected_count();
    let mut rows = Vec::with_capacity(expected.min(MAX_RESERVED_ROWS));

    for record in reader.records::<T>() {
        let record = record?;
        match bounds.check(&record.obstime()) {
            RowCheck::Keep => rows.push(record),
            RowCheck::Skip => continue,
            RowCheck::Stop => break,
        }
    }

    debug!(path = %path.display(), expected, kept = rows.len(), "Read series file");
    Ok(rows)
}

/// Parse a series file off the async runtime.
pub(crate) async fn read_series_blocking<T>(
    path: PathBuf,
    sep: u8,
    has_header: bool,
    bounds: RowBounds,
) -> Result<Vec<T>>
where
    T: CsvRecord + Timed + Send + 'static,
{
    tokio::task::spawn_blocking(move || read_series(&path, sep, has_header, &bounds))
        .await
        .map_err(|e| MigrationError::Task(crate::notify::join_error_message(e)))?
}

/// Insert a converted batch atomically; returns the observation rows inserted.
pub(crate) async fn insert_batch(dest: &dyn Destination, batch: &ConvertedBatch) -> Result<u64> {
    Ok(dest
        .insert_observations(&batch.values, &batch.texts, &batch.flags)
        .await?)
}

/// Add a file's inserted rows to the phase counter.
pub(crate) fn count_inserted(counter: &AtomicU64, rows: u64) {
    counter.fetch_add(rows, Ordering::Relaxed);
}

/// Station directories directly under `family_dir`, ordered by station.
pub(crate) fn station_dirs(family_dir: &Path) -> Result<Vec<(i32, PathBuf)>> {
    let mut stations = Vec::new();
    for entry in WalkDir::new(family_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| MigrationError::Io(e.into()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        match entry.file_name().to_str().and_then(|s| s.parse::<i32>().ok()) {
            Some(station) => stations.push((station, entry.into_path())),
            None => warn!(path = %entry.path().display(), "Ignoring non-station directory"),
        }
    }
    stations.sort_by_key(|(station, _)| *station);
    Ok(stations)
}

/// Dump files under a station directory, down to `max_depth`, ordered by path.
pub(crate) fn series_files(station_dir: &Path, max_depth: usize) -> Vec<PathBuf> {
    WalkDir::new(station_dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Could not read dump directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == DUMP_EXTENSION))
        .collect()
}

/// Shared state of the file tasks of one table.
#[derive(Clone)]
pub(crate) struct ImportContext {
    pub dest: Arc<dyn Destination>,
    pub inserted: Arc<AtomicU64>,
    pub sep: u8,
    pub has_header: bool,
    pub window: TimeWindow,
}

impl ImportContext {
    pub fn new(dest: Arc<dyn Destination>, opts: &ImportOptions) -> Self {
        Self {
            dest,
            inserted: Arc::new(AtomicU64::new(0)),
            sep: opts.sep,
            has_header: opts.has_header,
            window: opts.window,
        }
    }

    pub fn total_inserted(&self) -> u64 {
        self.inserted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    fn at(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_row_bounds() {
        let bounds = RowBounds {
            span: SeriesTimespan {
                from: Some(at(2000)),
                to: Some(at(2010)),
            },
            window: TimeWindow::unbounded(),
            until_year: Some(2006),
        };
        assert_eq!(bounds.check(&at(1999)), RowCheck::Skip);
        assert_eq!(bounds.check(&at(2000)), RowCheck::Keep);
        assert_eq!(bounds.check(&at(2005)), RowCheck::Keep);
        assert_eq!(bounds.check(&at(2006)), RowCheck::Stop);

        let open = RowBounds::default();
        assert_eq!(open.check(&at(1800)), RowCheck::Keep);
    }

    #[test]
    fn test_span_end_is_excluded() {
        let bounds = RowBounds {
            span: SeriesTimespan {
                from: None,
                to: Some(at(2010)),
            },
            ..RowBounds::default()
        };
        assert_eq!(bounds.check(&at(2010)), RowCheck::Stop);
    }

    #[test]
    fn test_window_bounds() {
        let bounds = RowBounds {
            window: TimeWindow::new(Some(at(2001)), Some(at(2002))),
            ..RowBounds::default()
        };
        assert_eq!(bounds.check(&at(2000)), RowCheck::Skip);
        assert_eq!(bounds.check(&at(2001)), RowCheck::Keep);
        assert_eq!(bounds.check(&at(2002)), RowCheck::Stop);
    }

    #[test]
    fn test_read_series_stops_at_bound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tam.csv");
        fs::write(
            &path,
            "3\n2005-12-31_23:00:00,1,\n2006-01-01_00:00:00,2,\n2005-01-01_00:00:00,3,\n",
        )
        .unwrap();

        let bounds = RowBounds {
            until_year: Some(2006),
            ..RowBounds::default()
        };
        let rows: Vec<RawObservation> = read_series(&path, b',', false, &bounds).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "1");
    }

    #[test]
    fn test_read_series_ignores_oversized_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ta.csv");
        fs::write(&path, "1000000000000\n2000-01-01_00:00:00,1.5,\n").unwrap();

        let rows: Vec<RawObservation> =
            read_series(&path, b',', false, &RowBounds::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "1.5");
    }

    #[test]
    fn test_walk_station_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("18700/2001")).unwrap();
        fs::create_dir_all(dir.path().join("180")).unwrap();
        fs::create_dir_all(dir.path().join("scratch")).unwrap();
        fs::write(dir.path().join("labels.csv"), "station,element\n").unwrap();
        fs::write(dir.path().join("18700/tam.csv"), "0\n").unwrap();
        fs::write(dir.path().join("18700/2001/ta.csv"), "0\n").unwrap();
        fs::write(dir.path().join("18700/notes.txt"), "").unwrap();

        let stations = station_dirs(dir.path()).unwrap();
        let ids: Vec<i32> = stations.iter().map(|(s, _)| *s).collect();
        assert_eq!(ids, vec![180, 18700]);

        let files = series_files(&stations[1].1, 2);
        assert_eq!(files.len(), 2);
        assert_eq!(series_files(&stations[1].1, 1).len(), 1);
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = ImportSummary::default();
        summary.absorb(vec![
            Some(FileOutcome::Inserted(10)),
            Some(FileOutcome::Skipped(SkipReason::Restricted)),
            Some(FileOutcome::Failed("bad row".to_string())),
            None,
        ]);
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.panicked, 1);
    }
}
