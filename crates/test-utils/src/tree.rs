//! Temporary dump trees.
//!
//! A [`DumpTree`] owns a temporary directory laid out like a real dump:
//!
//! ```text
//! {root}/arch/{TABLE}/{station}[/{year}]/{element}.csv
//! {root}/{qcdb|qcdb_hist}/{data|text}/{station}/{label}.csv
//! ```
//!
//! The directory is removed when the tree is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use obs_common::codec::write_series;
use obs_common::{CsvRecord, Label};

pub struct DumpTree {
    dir: TempDir,
}

impl DumpTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temporary dump tree"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write an archive series file and return its path.
    pub fn write_arch<T: CsvRecord>(
        &self,
        table: &str,
        station: i32,
        year: Option<i32>,
        element: &str,
        rows: &[T],
    ) -> PathBuf {
        let mut dir = self.root().join("arch").join(table).join(station.to_string());
        if let Some(year) = year {
            dir = dir.join(year.to_string());
        }
        self.write_records(dir.join(format!("{element}.csv")), rows)
    }

    /// Write a QC store series file under `db_dir` (`qcdb` or `qcdb_hist`).
    pub fn write_qcdb<T: CsvRecord>(
        &self,
        db_dir: &str,
        family: &str,
        label: &Label,
        rows: &[T],
    ) -> PathBuf {
        let path = self
            .root()
            .join(db_dir)
            .join(family)
            .join(label.station_id.to_string())
            .join(label.to_filename());
        self.write_records(path, rows)
    }

    /// Write arbitrary content at `relative`, creating parent directories.
    pub fn write_raw(&self, relative: impl AsRef<Path>, contents: &str) -> PathBuf {
        let path = self.root().join(relative);
        create_parent(&path);
        fs::write(&path, contents).expect("failed to write dump file");
        path
    }

    fn write_records<T: CsvRecord>(&self, path: PathBuf, rows: &[T]) -> PathBuf {
        create_parent(&path);
        let bytes = write_series(Vec::new(), rows).expect("failed to encode dump file");
        fs::write(&path, bytes).expect("failed to write dump file");
        path
    }
}

impl Default for DumpTree {
    fn default() -> Self {
        Self::new()
    }
}

fn create_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create dump directory");
    }
}

/// Read a dump file's lines, count line included.
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("failed to read dump file")
        .lines()
        .map(str::to_string)
        .collect()
}
