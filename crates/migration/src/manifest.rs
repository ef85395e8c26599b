//! Dump tree layout and label manifests.
//!
//! ```text
//! {root}/arch/{TABLE}/{TABLE}_labels.csv
//! {root}/arch/{TABLE}/{station}/{element}.csv
//! {root}/arch/{TABLE}/{station}/{year}/{element}.csv      (year-partitioned)
//! {root}/{qcdb|qcdb_hist}/{data|text}/{family}_labels.csv
//! {root}/{qcdb|qcdb_hist}/{data|text}/{station}/{label}.csv
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use obs_common::label::DUMP_EXTENSION;
use obs_common::Label;

use crate::error::Result;
use crate::tables::{ArchTable, QcdbDb, QcdbTable, ARCH_DIR};

/// One (station, element) pair an archive dump attempts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchManifestRow {
    pub station: i32,
    pub element: String,
}

pub fn arch_table_dir(root: &Path, table: &ArchTable) -> PathBuf {
    root.join(ARCH_DIR).join(table.name)
}

pub fn arch_manifest_path(root: &Path, table: &ArchTable) -> PathBuf {
    arch_table_dir(root, table).join(format!("{}_labels.csv", table.name))
}

/// File of one archive series, optionally inside a year directory.
pub fn arch_series_path(
    root: &Path,
    table: &ArchTable,
    station: i32,
    year: Option<i32>,
    element: &str,
) -> PathBuf {
    let mut path = arch_table_dir(root, table).join(station.to_string());
    if let Some(year) = year {
        path.push(year.to_string());
    }
    path.join(format!("{}.{}", element, DUMP_EXTENSION))
}

pub fn qcdb_family_dir(root: &Path, db: QcdbDb, table: QcdbTable) -> PathBuf {
    root.join(db.dir_name()).join(table.name())
}

pub fn qcdb_manifest_path(root: &Path, db: QcdbDb, table: QcdbTable) -> PathBuf {
    qcdb_family_dir(root, db, table).join(table.manifest_name())
}

pub fn qcdb_series_path(root: &Path, db: QcdbDb, table: QcdbTable, label: &Label) -> PathBuf {
    qcdb_family_dir(root, db, table)
        .join(label.station_id.to_string())
        .join(label.to_filename())
}

/// Write `rows` as a headed CSV, creating parent directories.
pub fn write_manifest<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_manifest<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(rows)
}
