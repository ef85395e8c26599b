//! Rows of the metadata catalog, as the migration engine sees them.

use chrono::{DateTime, Utc};

/// `(source table, element code)` pair; both stored uppercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey {
    pub table: String,
    pub element: String,
}

impl ElementKey {
    pub fn new(table: &str, element: &str) -> Self {
        Self {
            table: table.to_ascii_uppercase(),
            element: element.to_ascii_uppercase(),
        }
    }
}

/// Destination identity of an archive element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementInfo {
    pub type_id: i32,
    pub param_id: i32,
    pub sensor: Option<i32>,
    pub level: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub is_scalar: bool,
}

/// Window in which a series may hold valid data. Missing bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeriesTimespan {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl SeriesTimespan {
    pub fn before_start(&self, t: &DateTime<Utc>) -> bool {
        self.from.is_some_and(|from| *t < from)
    }

    /// `to` itself is outside the span.
    pub fn past_end(&self, t: &DateTime<Utc>) -> bool {
        self.to.is_some_and(|to| *t >= to)
    }
}

/// Per-(station, type, param) permit override; zero type or param means "any".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamPermit {
    pub station_id: i32,
    pub type_id: i32,
    pub param_id: i32,
    pub permit_id: i32,
}

impl ParamPermit {
    pub fn matches(&self, type_id: i32, param_id: i32) -> bool {
        (self.type_id == 0 || self.type_id == type_id)
            && (self.param_id == 0 || self.param_id == param_id)
    }
}

/// Station baseline permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationPermit {
    pub station_id: i32,
    pub permit_id: i32,
}

/// Permit value meaning "open".
pub const PERMIT_OPEN: i32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_element_key_uppercases() {
        assert_eq!(ElementKey::new("t_adata", "tam"), ElementKey::new("T_ADATA", "TAM"));
    }

    #[test]
    fn test_param_permit_wildcards() {
        let any_type = ParamPermit {
            station_id: 1,
            type_id: 0,
            param_id: 211,
            permit_id: 1,
        };
        assert!(any_type.matches(501, 211));
        assert!(!any_type.matches(501, 212));

        let any = ParamPermit {
            type_id: 0,
            param_id: 0,
            ..any_type
        };
        assert!(any.matches(7, 8));
    }

    #[test]
    fn test_timespan_bounds() {
        let from = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
        let span = SeriesTimespan {
            from: Some(from),
            to: Some(to),
        };
        assert!(!span.before_start(&from));
        assert!(span.past_end(&to));
        assert!(!span.past_end(&from));
        assert!(!SeriesTimespan::default().past_end(&to));
    }
}
