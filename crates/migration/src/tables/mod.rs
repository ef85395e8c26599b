//! Source table registries.

pub mod arch;
pub mod qcdb;

pub use arch::{ArchTable, ConvertRule, DumpStrategy, ARCH_TABLES};
pub use qcdb::{QcdbDb, QcdbTable};

/// Directory holding all archive dumps under the dump root.
pub const ARCH_DIR: &str = "arch";
