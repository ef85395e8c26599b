//! Conversion of source observations into destination rows.
//!
//! Every source observation becomes exactly one [`Converted`] value: either a
//! numeric row (with a flag row when the source carries quality information)
//! or a text row, never both.

pub mod arch;
pub mod qcdb;

use chrono::{DateTime, Utc};

use obs_common::{DestFlagRow, DestTextRow, DestValueRow};

pub use arch::{convert as convert_arch, ArchContext};
pub use qcdb::{convert_data as convert_qcdb_data, convert_text as convert_qcdb_text};

#[derive(Debug, Clone, PartialEq)]
pub enum Converted {
    Numeric {
        value: DestValueRow,
        flag: Option<DestFlagRow>,
    },
    Text(DestTextRow),
}

impl Converted {
    pub fn obstime(&self) -> DateTime<Utc> {
        match self {
            Converted::Numeric { value, .. } => value.obstime,
            Converted::Text(text) => text.obstime,
        }
    }

    /// Move every emitted row to `obstime`.
    pub fn set_obstime(&mut self, obstime: DateTime<Utc>) {
        match self {
            Converted::Numeric { value, flag } => {
                value.obstime = obstime;
                if let Some(flag) = flag {
                    flag.obstime = obstime;
                }
            }
            Converted::Text(text) => text.obstime = obstime,
        }
    }
}

/// Rows of one file, grouped by destination relation.
#[derive(Debug, Clone, Default)]
pub struct ConvertedBatch {
    pub values: Vec<DestValueRow>,
    pub texts: Vec<DestTextRow>,
    pub flags: Vec<DestFlagRow>,
}

impl ConvertedBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            texts: Vec::new(),
            flags: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, converted: Converted) {
        match converted {
            Converted::Numeric { value, flag } => {
                self.values.push(value);
                if let Some(flag) = flag {
                    self.flags.push(flag);
                }
            }
            Converted::Text(text) => self.texts.push(text),
        }
    }

    /// Observation rows; flag rows are not counted.
    pub fn len(&self) -> usize {
        self.values.len() + self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Extend<Converted> for ConvertedBatch {
    fn extend<I: IntoIterator<Item = Converted>>(&mut self, iter: I) {
        for converted in iter {
            self.push(converted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_batch_groups_rows() {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut batch = ConvertedBatch::default();
        batch.push(Converted::Numeric {
            value: DestValueRow {
                timeseries: 1,
                obstime: t,
                value: Some(1.0),
            },
            flag: None,
        });
        batch.push(Converted::Text(DestTextRow {
            timeseries: 1,
            obstime: t,
            text: Some("x".to_string()),
        }));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.values.len(), 1);
        assert_eq!(batch.texts.len(), 1);
        assert!(batch.flags.is_empty());
    }
}
