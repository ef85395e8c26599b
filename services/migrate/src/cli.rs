//! Command-line interface.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use migration::{QcdbDb, QcdbTable};
use obs_common::time::{parse_date, parse_obstime};
use obs_common::{AllowList, LabelFilter, TimeWindow};

#[derive(Parser, Debug)]
#[command(name = "migrate")]
#[command(about = "Migrate archived weather observations into the observation database")]
pub struct Cli {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dump source series to a CSV tree
    #[command(subcommand)]
    Dump(DumpCommand),

    /// Import a CSV tree into the destination
    #[command(subcommand)]
    Import(ImportCommand),

    /// List the known archive tables and QC store families
    List,

    /// Diagnostics over QC store label manifests
    #[command(subcommand)]
    Check(CheckCommand),
}

#[derive(Subcommand, Debug)]
pub enum DumpCommand {
    /// Dump archive tables
    Arch(ArchDumpArgs),
    /// Dump QC store families
    Qcdb(QcdbDumpArgs),
}

#[derive(Subcommand, Debug)]
pub enum ImportCommand {
    /// Import archive tables
    Arch(ArchImportArgs),
    /// Import QC store families
    Qcdb(QcdbImportArgs),
}

#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Print (station, type, param) triples present in both data and text
    Overlap(CheckArgs),
    /// Print params stored in the wrong family for their scalar flag
    NonScalars(CheckArgs),
}

/// Options every dump and import accepts.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Root of the dump tree
    #[arg(long, default_value = "./dumps")]
    pub path: PathBuf,

    /// Only observations at or after this time (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_time)]
    pub from: Option<DateTime<Utc>>,

    /// Only observations before this time (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_time)]
    pub to: Option<DateTime<Utc>>,

    /// Crash report recipients, comma separated
    #[arg(long, value_delimiter = ',')]
    pub email: Vec<String>,

    /// Hide the progress bar
    #[arg(long)]
    pub quiet: bool,
}

impl CommonArgs {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.from, self.to)
    }
}

/// Archive series selection.
#[derive(Args, Debug, Clone)]
pub struct ArchSelection {
    /// Archive tables, comma separated (default: all)
    #[arg(long = "table", value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Station numbers, comma separated
    #[arg(long = "station", value_delimiter = ',')]
    pub stations: Vec<i32>,

    /// Element codes, comma separated
    #[arg(long = "element", value_delimiter = ',')]
    pub elements: Vec<String>,
}

impl ArchSelection {
    pub fn station_list(&self) -> AllowList<i32> {
        AllowList::new(self.stations.clone())
    }

    pub fn element_list(&self) -> AllowList<String> {
        AllowList::new(self.elements.clone())
    }
}

/// QC store label selection.
#[derive(Args, Debug, Clone)]
pub struct QcdbSelection {
    /// QC store instances: live, hist (default: both)
    #[arg(long = "db", value_delimiter = ',')]
    pub dbs: Vec<QcdbDb>,

    /// Families: data, text (default: both)
    #[arg(long = "table", value_delimiter = ',')]
    pub tables: Vec<QcdbTable>,

    #[arg(long = "station", value_delimiter = ',')]
    pub stations: Vec<i32>,

    #[arg(long = "typeid", value_delimiter = ',')]
    pub types: Vec<i32>,

    #[arg(long = "paramid", value_delimiter = ',')]
    pub params: Vec<i32>,

    #[arg(long = "sensor", value_delimiter = ',')]
    pub sensors: Vec<i32>,

    #[arg(long = "level", value_delimiter = ',')]
    pub levels: Vec<i32>,
}

impl QcdbSelection {
    pub fn dbs(&self) -> Vec<QcdbDb> {
        or_all(&self.dbs, &QcdbDb::ALL)
    }

    pub fn tables(&self) -> Vec<QcdbTable> {
        or_all(&self.tables, &QcdbTable::ALL)
    }

    pub fn filter(&self) -> LabelFilter {
        LabelFilter {
            stations: AllowList::new(self.stations.clone()),
            types: AllowList::new(self.types.clone()),
            params: AllowList::new(self.params.clone()),
            sensors: AllowList::new(self.sensors.clone()),
            levels: AllowList::new(self.levels.clone()),
        }
    }
}

fn or_all<T: Copy + PartialEq>(requested: &[T], all: &[T]) -> Vec<T> {
    if requested.is_empty() {
        return all.to_vec();
    }
    let mut selected = Vec::new();
    for value in requested {
        if !selected.contains(value) {
            selected.push(*value);
        }
    }
    selected
}

/// Dump-only options.
#[derive(Args, Debug, Clone)]
pub struct DumpArgs {
    /// Re-dump series whose file already exists
    #[arg(long)]
    pub overwrite: bool,

    /// Maximum concurrent source queries
    #[arg(long, default_value_t = 4)]
    pub max_conn: usize,
}

/// Import-only options.
#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Dump files carry a column header line
    #[arg(long)]
    pub header: bool,

    /// Field separator of the dump files (a single ASCII character)
    #[arg(long, default_value = ",")]
    pub sep: String,

    /// Maximum concurrent file imports
    #[arg(long, default_value_t = 8)]
    pub max_workers: usize,

    /// COPY straight into the destination; duplicate rows abort the file
    #[arg(long)]
    pub strict_copy: bool,
}

#[derive(Args, Debug)]
pub struct ArchDumpArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(flatten)]
    pub selection: ArchSelection,
    #[command(flatten)]
    pub dump: DumpArgs,
}

#[derive(Args, Debug)]
pub struct QcdbDumpArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(flatten)]
    pub selection: QcdbSelection,
    #[command(flatten)]
    pub dump: DumpArgs,

    /// Re-query the label list instead of reusing the manifest
    #[arg(long)]
    pub update_labels: bool,
}

#[derive(Args, Debug)]
pub struct ArchImportArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(flatten)]
    pub selection: ArchSelection,
    #[command(flatten)]
    pub import: ImportArgs,

    /// Product offsets CSV (default: PRODUCT_OFFSETS_PATH)
    #[arg(long)]
    pub offsets: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct QcdbImportArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(flatten)]
    pub selection: QcdbSelection,
    #[command(flatten)]
    pub import: ImportArgs,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Root of the dump tree
    #[arg(long, default_value = "./dumps")]
    pub path: PathBuf,

    /// QC store instance: live or hist
    #[arg(long, default_value = "hist")]
    pub db: QcdbDb,
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    parse_date(s)
        .or_else(|_| parse_obstime(s))
        .map_err(|e| e.to_string())
}

/// Validate `--sep` as one ASCII character.
pub fn parse_sep(sep: &str) -> Result<u8, String> {
    match sep.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(format!(
            "--sep must be a single ASCII character, got '{}'",
            sep
        )),
    }
}
