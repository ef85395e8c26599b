//! Migration configuration.

use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use migration::QcdbDb;

/// A database the migration connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Catalog,
    Arch,
    Qcdb(QcdbDb),
    Dest,
}

impl Slot {
    /// Environment variable holding the slot's connection string.
    pub fn env_var(&self) -> &'static str {
        match self {
            Slot::Catalog => "CATALOG_DATABASE_URL",
            Slot::Arch => "ARCH_DATABASE_URL",
            Slot::Qcdb(QcdbDb::Live) => "QCDB_DATABASE_URL",
            Slot::Qcdb(QcdbDb::Historical) => "QCDB_HIST_DATABASE_URL",
            Slot::Dest => "DEST_DATABASE_URL",
        }
    }

    /// Short name used for pools and in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Slot::Catalog => "catalog",
            Slot::Arch => "arch",
            Slot::Qcdb(QcdbDb::Live) => "qcdb",
            Slot::Qcdb(QcdbDb::Historical) => "qcdb_hist",
            Slot::Dest => "dest",
        }
    }
}

/// Connection strings and paths, read once at startup.
///
/// Every slot is optional here; commands call [`MigrateConfig::require`] for
/// the slots they actually use.
#[derive(Debug, Clone, Default)]
pub struct MigrateConfig {
    pub catalog_url: Option<String>,
    pub arch_url: Option<String>,
    pub qcdb_url: Option<String>,
    pub qcdb_hist_url: Option<String>,
    pub dest_url: Option<String>,

    /// Product offsets CSV
    pub offsets_path: PathBuf,

    /// Connect timeout for the catalog
    pub catalog_timeout: Duration,
}

impl MigrateConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let catalog_timeout_secs = match env::var("CATALOG_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                anyhow!(
                    "CATALOG_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    raw
                )
            })?,
            Err(_) => 5,
        };

        Ok(Self {
            catalog_url: non_empty_var(Slot::Catalog.env_var()),
            arch_url: non_empty_var(Slot::Arch.env_var()),
            qcdb_url: non_empty_var(Slot::Qcdb(QcdbDb::Live).env_var()),
            qcdb_hist_url: non_empty_var(Slot::Qcdb(QcdbDb::Historical).env_var()),
            dest_url: non_empty_var(Slot::Dest.env_var()),
            offsets_path: env::var("PRODUCT_OFFSETS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("product_offsets.csv")),
            catalog_timeout: Duration::from_secs(catalog_timeout_secs),
        })
    }

    /// Connection string of `slot`, or a configuration error naming its variable.
    pub fn require(&self, slot: Slot) -> Result<&str> {
        let url = match slot {
            Slot::Catalog => &self.catalog_url,
            Slot::Arch => &self.arch_url,
            Slot::Qcdb(QcdbDb::Live) => &self.qcdb_url,
            Slot::Qcdb(QcdbDb::Historical) => &self.qcdb_hist_url,
            Slot::Dest => &self.dest_url,
        };
        url.as_deref().ok_or_else(|| {
            anyhow!(
                "{} is not set; the {} database is required for this command",
                slot.env_var(),
                slot.name()
            )
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
