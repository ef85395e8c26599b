//! QC store instances and table families.

use std::fmt;
use std::str::FromStr;

/// Which QC store instance is being migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QcdbDb {
    Live,
    Historical,
}

impl QcdbDb {
    pub const ALL: [QcdbDb; 2] = [QcdbDb::Live, QcdbDb::Historical];

    /// Directory of this instance under the dump root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            QcdbDb::Live => "qcdb",
            QcdbDb::Historical => "qcdb_hist",
        }
    }
}

impl fmt::Display for QcdbDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for QcdbDb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" | "qcdb" => Ok(QcdbDb::Live),
            "hist" | "historical" | "qcdb_hist" => Ok(QcdbDb::Historical),
            other => Err(format!("unknown QC store '{}', expected 'live' or 'hist'", other)),
        }
    }
}

/// The two observation families of the QC store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QcdbTable {
    /// Numeric observations with QC flags (`data`).
    Data,
    /// Text observations without flags (`text_data`).
    Text,
}

impl QcdbTable {
    pub const ALL: [QcdbTable; 2] = [QcdbTable::Data, QcdbTable::Text];

    pub fn name(&self) -> &'static str {
        match self {
            QcdbTable::Data => "data",
            QcdbTable::Text => "text",
        }
    }

    /// Manifest filename at the family root.
    pub fn manifest_name(&self) -> String {
        format!("{}_labels.csv", self.name())
    }
}

impl fmt::Display for QcdbTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QcdbTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "data" => Ok(QcdbTable::Data),
            "text" | "text_data" => Ok(QcdbTable::Text),
            other => Err(format!("unknown QC store table '{}', expected 'data' or 'text'", other)),
        }
    }
}
