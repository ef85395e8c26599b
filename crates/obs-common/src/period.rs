//! Calendar-aware ISO-8601 periods (`P1M`, `-PT6H`, `P1DT12H`).
//!
//! Product offsets are expressed as periods rather than fixed durations
//! because a month is not a fixed number of seconds.

use chrono::{DateTime, Duration, Months, Utc};
use std::ops::Add;
use std::str::FromStr;

use crate::error::{ObsError, ObsResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Period {
    pub months: i32,
    pub days: i32,
    pub seconds: i64,
}

impl Period {
    pub const ZERO: Period = Period {
        months: 0,
        days: 0,
        seconds: 0,
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn hours(hours: i64) -> Self {
        Self {
            seconds: hours * 3600,
            ..Self::ZERO
        }
    }

    /// Shift `t` by this period: months first, then days, then seconds.
    ///
    /// Returns `None` when the result is out of range.
    pub fn apply(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let shifted = if self.months >= 0 {
            t.checked_add_months(Months::new(self.months.unsigned_abs()))?
        } else {
            t.checked_sub_months(Months::new(self.months.unsigned_abs()))?
        };
        shifted
            .checked_add_signed(Duration::days(i64::from(self.days)))?
            .checked_add_signed(Duration::seconds(self.seconds))
    }
}

impl Add for Period {
    type Output = Period;

    fn add(self, rhs: Period) -> Period {
        Period {
            months: self.months + rhs.months,
            days: self.days + rhs.days,
            seconds: self.seconds + rhs.seconds,
        }
    }
}

impl FromStr for Period {
    type Err = ObsError;

    fn from_str(s: &str) -> ObsResult<Self> {
        let invalid = || ObsError::InvalidPeriod(s.to_string());

        let trimmed = s.trim();
        let (sign, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let body = rest.strip_prefix('P').ok_or_else(invalid)?;
        if body.is_empty() {
            return Err(invalid());
        }

        let mut period = Period::ZERO;
        let mut in_time = false;
        let mut digits = String::new();
        let mut seen_component = false;

        for c in body.chars() {
            match c {
                'T' if !in_time && digits.is_empty() => in_time = true,
                '0'..='9' => digits.push(c),
                unit => {
                    let n: i64 = digits.parse().map_err(|_| invalid())?;
                    digits.clear();
                    seen_component = true;
                    match (in_time, unit) {
                        (false, 'Y') => period.months += to_i32(n * 12).ok_or_else(invalid)?,
                        (false, 'M') => period.months += to_i32(n).ok_or_else(invalid)?,
                        (false, 'W') => period.days += to_i32(n * 7).ok_or_else(invalid)?,
                        (false, 'D') => period.days += to_i32(n).ok_or_else(invalid)?,
                        (true, 'H') => period.seconds += n * 3600,
                        (true, 'M') => period.seconds += n * 60,
                        (true, 'S') => period.seconds += n,
                        _ => return Err(invalid()),
                    }
                }
            }
        }

        if !digits.is_empty() || !seen_component {
            return Err(invalid());
        }

        Ok(Period {
            months: period.months * sign,
            days: period.days * sign,
            seconds: period.seconds * i64::from(sign),
        })
    }
}

fn to_i32(n: i64) -> Option<i32> {
    i32::try_from(n).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_components() {
        assert_eq!(
            "P1Y2M3DT4H5M6S".parse::<Period>().unwrap(),
            Period {
                months: 14,
                days: 3,
                seconds: 4 * 3600 + 5 * 60 + 6
            }
        );
        assert_eq!("P1D".parse::<Period>().unwrap().days, 1);
        assert_eq!("P2W".parse::<Period>().unwrap().days, 14);
        assert_eq!("PT30M".parse::<Period>().unwrap().seconds, 1800);
    }

    #[test]
    fn test_parse_negative() {
        assert_eq!("-PT6H".parse::<Period>().unwrap(), Period::hours(-6));
        assert_eq!("-P1M".parse::<Period>().unwrap().months, -1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "P", "PT", "1D", "P1H", "PT1D", "P1.5D", "P1"] {
            assert!(bad.parse::<Period>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_add_periods() {
        let offset = "-PT6H".parse::<Period>().unwrap() + "P1D".parse::<Period>().unwrap();
        assert_eq!(
            offset,
            Period {
                months: 0,
                days: 1,
                seconds: -6 * 3600
            }
        );
    }

    #[test]
    fn test_apply_month_is_calendar_aware() {
        let t = Utc.with_ymd_and_hms(2001, 1, 31, 6, 0, 0).unwrap();
        let shifted = "P1M".parse::<Period>().unwrap().apply(t).unwrap();
        assert_eq!(shifted, Utc.with_ymd_and_hms(2001, 2, 28, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_apply_mixed() {
        let t = Utc.with_ymd_and_hms(2019, 3, 15, 6, 0, 0).unwrap();
        let offset = "-PT6H".parse::<Period>().unwrap() + "P1D".parse::<Period>().unwrap();
        assert_eq!(
            offset.apply(t).unwrap(),
            Utc.with_ymd_and_hms(2019, 3, 16, 0, 0, 0).unwrap()
        );
        assert_eq!(Period::ZERO.apply(t).unwrap(), t);
    }
}
