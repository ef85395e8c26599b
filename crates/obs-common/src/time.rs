//! Timestamp formats used in dump files and on the command line.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{ObsError, ObsResult};

/// Timestamp format of archive dump files.
pub const ARCH_TIME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

/// Parse an observation time in any format a dump may contain.
///
/// Tries RFC 3339 first, then the archive format, then a few naive
/// layouts which are assumed to be UTC.
pub fn parse_obstime(s: &str) -> ObsResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in [ARCH_TIME_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(ObsError::InvalidTime(s.to_string()))
}

/// Parse a `YYYY-MM-DD` date (midnight UTC), as accepted by `--from`/`--to`.
pub fn parse_date(s: &str) -> ObsResult<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ObsError::InvalidTime(s.to_string()))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ObsError::InvalidTime(s.to_string()))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

pub fn format_arch_time(t: &DateTime<Utc>) -> String {
    t.format(ARCH_TIME_FORMAT).to_string()
}

pub fn format_rfc3339(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Half-open `[from, to)` window; a missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| *t >= from) && self.to.map_or(true, |to| *t < to)
    }

    /// Window bounds as naive UTC, for binding against `timestamp` columns.
    pub fn naive_bounds(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        (
            self.from.map(|t| t.naive_utc()),
            self.to.map(|t| t.naive_utc()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_arch_format() {
        assert_eq!(parse_obstime("2020-01-01_06:00:00").unwrap(), utc(2020, 1, 1, 6));
    }

    #[test]
    fn test_parse_rfc3339() {
        assert_eq!(parse_obstime("2020-01-01T06:00:00Z").unwrap(), utc(2020, 1, 1, 6));
        assert_eq!(
            parse_obstime("2020-01-01T07:00:00+01:00").unwrap(),
            utc(2020, 1, 1, 6)
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_obstime("yesterday").is_err());
        assert!(parse_obstime("").is_err());
    }

    #[test]
    fn test_format_roundtrip() {
        let t = utc(2019, 3, 15, 6);
        assert_eq!(format_arch_time(&t), "2019-03-15_06:00:00");
        assert_eq!(format_rfc3339(&t), "2019-03-15T06:00:00Z");
        assert_eq!(parse_obstime(&format_rfc3339(&t)).unwrap(), t);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2006-01-01").unwrap(), utc(2006, 1, 1, 0));
        assert!(parse_date("2006-13-01").is_err());
    }

    #[test]
    fn test_window_is_half_open() {
        let window = TimeWindow::new(Some(utc(2020, 1, 1, 0)), Some(utc(2020, 1, 2, 0)));
        assert!(window.contains(&utc(2020, 1, 1, 0)));
        assert!(window.contains(&utc(2020, 1, 1, 23)));
        assert!(!window.contains(&utc(2020, 1, 2, 0)));
        assert!(!window.contains(&utc(2019, 12, 31, 23)));
        assert!(TimeWindow::unbounded().contains(&utc(1900, 1, 1, 0)));
    }
}
