//! Test data generators for creating synthetic observation series.
//!
//! These generators create predictable, verifiable series that can be used
//! across the test suite.

use chrono::{DateTime, Duration, Utc};

use obs_common::flags::{DEFAULT_USEINFO, VALUE_PASSED_QC};
use obs_common::{QcdbDataRecord, QcdbTextRecord, RawObservation};

/// Creates an hourly archive series with predictable values.
///
/// Row `i` is stamped `start + i hours` and carries the value `i` with an
/// empty flag, so a converted value can be traced back to its row.
///
/// # Example
///
/// ```
/// use test_utils::{hourly_observations, utc};
///
/// let rows = hourly_observations(utc(2020, 1, 1, 0), 3);
/// assert_eq!(rows.len(), 3);
/// assert_eq!(rows[2].value, "2");
/// ```
pub fn hourly_observations(start: DateTime<Utc>, count: usize) -> Vec<RawObservation> {
    (0..count)
        .map(|i| RawObservation::new(start + Duration::hours(i as i64), i.to_string(), ""))
        .collect()
}

/// Creates a series with one observation per year, stamped at `hour` on January 1st.
pub fn yearly_observations(first_year: i32, last_year: i32, hour: u32) -> Vec<RawObservation> {
    (first_year..=last_year)
        .map(|year| {
            RawObservation::new(crate::utc(year, 1, 1, hour), format!("{year}.5"), "10000")
        })
        .collect()
}

/// Creates a QC store numeric series that passed QC.
///
/// The original and corrected values of row `i` are `i / 10`.
pub fn qcdb_data_records(start: DateTime<Utc>, count: usize) -> Vec<QcdbDataRecord> {
    (0..count)
        .map(|i| {
            let obstime = start + Duration::hours(i as i64);
            let value = i as f64 / 10.0;
            QcdbDataRecord {
                obstime,
                original: value,
                tbtime: obstime + Duration::minutes(5),
                corrected: value,
                controlinfo: VALUE_PASSED_QC.to_string(),
                useinfo: DEFAULT_USEINFO.to_string(),
                cfailed: String::new(),
            }
        })
        .collect()
}

/// Creates a QC store text series with one line per hour.
pub fn qcdb_text_records(start: DateTime<Utc>, texts: &[&str]) -> Vec<QcdbTextRecord> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let obstime = start + Duration::hours(i as i64);
            QcdbTextRecord {
                obstime,
                original: text.to_string(),
                tbtime: obstime,
            }
        })
        .collect()
}
