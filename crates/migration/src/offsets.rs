//! Product-time offsets.
//!
//! Derived product tables stamp their observations at the start of the
//! aggregation period, while the destination stamps them at its end. The
//! shipped `product_offsets.csv` lists, per `(table, element)`, the ISO-8601
//! periods that move one convention onto the other.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use obs_common::{ElementKey, Period};

use crate::error::{MigrationError, Result};

#[derive(Debug, Deserialize)]
struct OffsetRow {
    table_name: String,
    elem_code: String,
    fromtime_offset: String,
    timespan: String,
}

/// Offset per `(table, element)`; absent keys mean zero.
#[derive(Debug, Clone, Default)]
pub struct ProductOffsets {
    offsets: HashMap<ElementKey, Period>,
}

impl ProductOffsets {
    /// Load offsets from `path`. A missing file yields an empty map.
    pub fn load(path: &Path) -> Result<Self> {
        match File::open(path) {
            Ok(file) => {
                let offsets = Self::from_reader(file)?;
                info!(path = %path.display(), offsets = offsets.len(), "Loaded product offsets");
                Ok(offsets)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Product offsets file not found, using zero offsets");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut offsets = HashMap::new();

        for (line, row) in csv_reader.deserialize::<OffsetRow>().enumerate() {
            let row = row.map_err(|e| MigrationError::InvalidOffsets(e.to_string()))?;
            let offset = parse_period(&row.fromtime_offset, line)?
                + parse_period(&row.timespan, line)?;
            offsets.insert(ElementKey::new(&row.table_name, &row.elem_code), offset);
        }

        Ok(Self { offsets })
    }

    pub fn get(&self, key: &ElementKey) -> Period {
        self.offsets.get(key).copied().unwrap_or(Period::ZERO)
    }

    pub fn insert(&mut self, key: ElementKey, offset: Period) {
        self.offsets.insert(key, offset);
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// An empty column is a zero period.
fn parse_period(raw: &str, line: usize) -> Result<Period> {
    if raw.is_empty() {
        return Ok(Period::ZERO);
    }
    raw.parse().map_err(|e| {
        MigrationError::InvalidOffsets(format!("record {}: {}", line + 1, e))
    })
}
