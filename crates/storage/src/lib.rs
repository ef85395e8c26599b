//! Database access for the observation migration.
//!
//! Provides PostgreSQL gateways for every connection slot:
//! - Source catalog: element map and access permits (one short-lived snapshot)
//! - Archive (ARCH): wide data/flag tables and per-table element metadata
//! - QC store (QCDB): narrow numeric and text observation tables
//! - Destination: label resolution and COPY-based bulk inserts
//!
//! The sources and the destination are reached through the [`ArchSource`],
//! [`QcdbSource`] and [`Destination`] traits so the engines can run against
//! in-memory implementations.

pub mod arch;
pub mod catalog;
pub mod copy;
pub mod dest;
pub mod error;
pub mod pool;
pub mod qcdb;

pub use arch::{ArchSource, PgArchSource, SeriesQuery, StationSource, TimespanRow};
pub use catalog::{Catalog, CatalogSnapshot};
pub use dest::{label_candidates, ConflictPolicy, DestStore, Destination};
pub use error::{StorageError, StorageResult};
pub use pool::connect_pool;
pub use qcdb::{PgQcdbSource, QcdbSource, QcdbTimespanRow};
