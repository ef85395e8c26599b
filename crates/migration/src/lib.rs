//! Observation migration library.
//!
//! Moves weather-observation time series from the legacy archive (ARCH) and
//! the QC store (QCDB) into the normalized destination in two phases.
//!
//! # Architecture
//!
//! ```text
//! source DB -> dump -> CSV tree -> import -> destination
//! ```
//!
//! - [`dump`]: discovers the series of a source table and writes one CSV per
//!   series, bounded by a connection semaphore
//! - [`import`]: walks a dump tree, resolves destination timeseries ids,
//!   converts observations and bulk-inserts them, bounded by a worker semaphore
//! - [`cache`]: read-only catalog snapshot consulted by the import
//! - [`convert`]: per-table conversion of source values and flags
//! - [`tables`]: the closed registry of archive tables and QC store families
//! - [`worker`]: semaphore-bounded, per-station fan-out with panic capture

pub mod cache;
pub mod check;
pub mod convert;
pub mod dump;
pub mod error;
pub mod import;
pub mod manifest;
pub mod notify;
pub mod offsets;
pub mod progress;
pub mod tables;
pub mod worker;

// Re-exports
pub use cache::MetadataCache;
pub use dump::{DumpOptions, DumpSummary};
pub use error::{MigrationError, Result};
pub use import::{ImportOptions, ImportSummary};
pub use notify::{CrashNotifier, LogNotifier};
pub use offsets::ProductOffsets;
pub use tables::{ArchTable, ConvertRule, DumpStrategy, QcdbDb, QcdbTable};
