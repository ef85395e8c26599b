//! Source and destination row shapes.

use chrono::{DateTime, Utc};

use crate::codec::CsvRecord;
use crate::error::{ObsError, ObsResult};
use crate::time::{format_arch_time, format_rfc3339, parse_obstime};

/// One archive observation as dumped: `obstime, value, flag`.
///
/// Both text fields are kept verbatim; an empty value means missing and the
/// flag is either empty or a 5-digit code.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub obstime: DateTime<Utc>,
    pub value: String,
    pub flag: String,
}

impl RawObservation {
    pub fn new(obstime: DateTime<Utc>, value: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            obstime,
            value: value.into(),
            flag: flag.into(),
        }
    }
}

impl CsvRecord for RawObservation {
    const MIN_FIELDS: usize = 3;

    fn to_fields(&self) -> Vec<String> {
        vec![
            format_arch_time(&self.obstime),
            self.value.clone(),
            self.flag.clone(),
        ]
    }

    fn from_fields(fields: &csv::StringRecord) -> ObsResult<Self> {
        check_len(fields, Self::MIN_FIELDS)?;
        Ok(Self {
            obstime: parse_obstime(&fields[0])?,
            value: fields[1].to_string(),
            flag: fields[2].to_string(),
        })
    }
}

/// One row of the QC store's numeric table.
#[derive(Debug, Clone, PartialEq)]
pub struct QcdbDataRecord {
    pub obstime: DateTime<Utc>,
    pub original: f64,
    pub tbtime: DateTime<Utc>,
    pub corrected: f64,
    pub controlinfo: String,
    pub useinfo: String,
    /// Empty when the source column was NULL.
    pub cfailed: String,
}

impl CsvRecord for QcdbDataRecord {
    const MIN_FIELDS: usize = 7;

    fn to_fields(&self) -> Vec<String> {
        vec![
            format_rfc3339(&self.obstime),
            self.original.to_string(),
            format_rfc3339(&self.tbtime),
            self.corrected.to_string(),
            self.controlinfo.clone(),
            self.useinfo.clone(),
            self.cfailed.clone(),
        ]
    }

    fn from_fields(fields: &csv::StringRecord) -> ObsResult<Self> {
        check_len(fields, Self::MIN_FIELDS)?;
        Ok(Self {
            obstime: parse_obstime(&fields[0])?,
            original: parse_number("original", &fields[1])?,
            tbtime: parse_obstime(&fields[2])?,
            corrected: parse_number("corrected", &fields[3])?,
            controlinfo: fields[4].to_string(),
            useinfo: fields[5].to_string(),
            cfailed: fields[6].to_string(),
        })
    }
}

/// One row of the QC store's text table.
#[derive(Debug, Clone, PartialEq)]
pub struct QcdbTextRecord {
    pub obstime: DateTime<Utc>,
    pub original: String,
    pub tbtime: DateTime<Utc>,
}

impl CsvRecord for QcdbTextRecord {
    const MIN_FIELDS: usize = 3;

    fn to_fields(&self) -> Vec<String> {
        vec![
            format_rfc3339(&self.obstime),
            self.original.clone(),
            format_rfc3339(&self.tbtime),
        ]
    }

    fn from_fields(fields: &csv::StringRecord) -> ObsResult<Self> {
        check_len(fields, Self::MIN_FIELDS)?;
        Ok(Self {
            obstime: parse_obstime(&fields[0])?,
            original: fields[1].to_string(),
            tbtime: parse_obstime(&fields[2])?,
        })
    }
}

/// Row of the destination numeric value table.
#[derive(Debug, Clone, PartialEq)]
pub struct DestValueRow {
    pub timeseries: i32,
    pub obstime: DateTime<Utc>,
    pub value: Option<f32>,
}

/// Row of the destination text value table.
#[derive(Debug, Clone, PartialEq)]
pub struct DestTextRow {
    pub timeseries: i32,
    pub obstime: DateTime<Utc>,
    pub text: Option<String>,
}

/// Row of the destination flag table.
#[derive(Debug, Clone, PartialEq)]
pub struct DestFlagRow {
    pub timeseries: i32,
    pub obstime: DateTime<Utc>,
    pub original: Option<f32>,
    pub corrected: Option<f32>,
    pub controlinfo: String,
    pub useinfo: String,
    pub cfailed: Option<String>,
}

fn check_len(fields: &csv::StringRecord, expected: usize) -> ObsResult<()> {
    if fields.len() < expected {
        return Err(ObsError::MissingFields {
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

fn parse_number(column: &'static str, raw: &str) -> ObsResult<f64> {
    raw.parse().map_err(|_| ObsError::InvalidNumber {
        column,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(fields: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(fields.to_vec())
    }

    #[test]
    fn test_raw_observation_fields() {
        let obs = RawObservation::from_fields(&record(&["2020-01-01_06:00:00", "12.3", "12345"]))
            .unwrap();
        assert_eq!(obs.obstime, Utc.with_ymd_and_hms(2020, 1, 1, 6, 0, 0).unwrap());
        assert_eq!(obs.value, "12.3");
        assert_eq!(obs.flag, "12345");
        assert_eq!(obs.to_fields()[0], "2020-01-01_06:00:00");
    }

    #[test]
    fn test_raw_observation_too_short() {
        let err = RawObservation::from_fields(&record(&["2020-01-01_06:00:00", "12.3"])).unwrap_err();
        assert!(matches!(err, ObsError::MissingFields { expected: 3, found: 2 }));
    }

    #[test]
    fn test_qcdb_data_record_fields() {
        let rec = QcdbDataRecord::from_fields(&record(&[
            "2020-01-01T06:00:00Z",
            "-34767",
            "2020-01-01T06:05:00Z",
            "1.5",
            "0000000000000000",
            "7000000000000000",
            "",
        ]))
        .unwrap();
        assert_eq!(rec.original, -34767.0);
        assert_eq!(rec.corrected, 1.5);
        assert!(rec.cfailed.is_empty());
    }

    #[test]
    fn test_qcdb_data_record_bad_number() {
        let err = QcdbDataRecord::from_fields(&record(&[
            "2020-01-01T06:00:00Z",
            "abc",
            "2020-01-01T06:05:00Z",
            "1.5",
            "0000000000000000",
            "0000000000000000",
            "",
        ]))
        .unwrap_err();
        assert!(matches!(err, ObsError::InvalidNumber { column: "original", .. }));
    }

    #[test]
    fn test_qcdb_text_record_fields() {
        let rec = QcdbTextRecord::from_fields(&record(&[
            "2020-01-01T06:00:00Z",
            "METAR ENGM 010550Z",
            "2020-01-01T06:01:00Z",
        ]))
        .unwrap();
        assert_eq!(rec.original, "METAR ENGM 010550Z");
    }
}
