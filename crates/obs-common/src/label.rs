//! Series identity and the label filename codec.
//!
//! A dump file's name is the only place a series identity is recorded next to
//! its observations, so the codec here is the single translation between the
//! two: `{station}_{type}_{param}_{sensor}_{level}.csv`, with absent sensor
//! and level rendered as empty fields.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ObsError, ObsResult};

/// File extension of every observation dump.
pub const DUMP_EXTENSION: &str = "csv";

/// Identity of one series within a source table family.
///
/// Equality is component-wise, so an absent sensor only equals another absent
/// sensor, never `Some(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Label {
    pub station_id: i32,
    pub type_id: i32,
    pub param_id: i32,
    pub sensor: Option<i32>,
    pub level: Option<i32>,
}

impl Label {
    pub fn new(
        station_id: i32,
        type_id: i32,
        param_id: i32,
        sensor: Option<i32>,
        level: Option<i32>,
    ) -> Self {
        Self {
            station_id,
            type_id,
            param_id,
            sensor,
            level,
        }
    }

    /// Label of a text series, which carries neither sensor nor level.
    pub fn text(station_id: i32, type_id: i32, param_id: i32) -> Self {
        Self::new(station_id, type_id, param_id, None, None)
    }

    /// Render the canonical dump filename for this label.
    pub fn to_filename(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}.{}",
            self.station_id,
            self.type_id,
            self.param_id,
            render_optional(self.sensor),
            render_optional(self.level),
            DUMP_EXTENSION
        )
    }

    /// Decode a label from a dump filename.
    ///
    /// The `.csv` extension is optional. Anything other than exactly five
    /// underscore-separated fields is rejected, and station, type and param
    /// must be present.
    pub fn from_filename(name: &str) -> ObsResult<Self> {
        let stem = name
            .strip_suffix(&format!(".{}", DUMP_EXTENSION))
            .unwrap_or(name);

        let fields: Vec<&str> = stem.split('_').collect();
        if fields.len() != 5 {
            return Err(ObsError::InvalidFilename {
                name: name.to_string(),
                reason: format!("expected 5 '_'-separated fields, found {}", fields.len()),
            });
        }

        Ok(Self {
            station_id: parse_required("station", fields[0])?,
            type_id: parse_required("type", fields[1])?,
            param_id: parse_required("param", fields[2])?,
            sensor: parse_optional("sensor", fields[3])?,
            level: parse_optional("level", fields[4])?,
        })
    }

    /// Sensor and level as they are stored in the destination.
    ///
    /// The sources default both to zero where the destination allows NULL, so a
    /// pair of zeros is written as a pair of NULLs. Any other combination is
    /// carried as-is.
    pub fn dest_sensor_level(&self) -> (Option<i32>, Option<i32>) {
        match (self.sensor, self.level) {
            (Some(0), Some(0)) => (None, None),
            other => other,
        }
    }

    /// Same label with sensor and level replaced by their destination form.
    pub fn normalized(&self) -> Self {
        let (sensor, level) = self.dest_sensor_level();
        Self {
            sensor,
            level,
            ..*self
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.station_id,
            self.type_id,
            self.param_id,
            render_optional(self.sensor),
            render_optional(self.level)
        )
    }
}

fn render_optional(value: Option<i32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_required(field: &'static str, raw: &str) -> ObsResult<i32> {
    raw.parse().map_err(|_| ObsError::InvalidLabelField {
        field,
        value: raw.to_string(),
    })
}

fn parse_optional(field: &'static str, raw: &str) -> ObsResult<Option<i32>> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_required(field, raw).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_full_label() {
        let label = Label::new(18700, 501, 211, Some(0), Some(0));
        assert_eq!(label.to_filename(), "18700_501_211_0_0.csv");
    }

    #[test]
    fn test_filename_text_label() {
        let label = Label::text(18700, 501, 1000);
        assert_eq!(label.to_filename(), "18700_501_1000__.csv");
    }

    #[test]
    fn test_parse_roundtrip_absent_fields() {
        let label = Label::new(100, 2, 3, None, Some(10));
        let parsed = Label::from_filename(&label.to_filename()).unwrap();
        assert_eq!(parsed, label);
    }

    #[test]
    fn test_parse_without_extension() {
        let parsed = Label::from_filename("100_2_3_1_5").unwrap();
        assert_eq!(parsed, Label::new(100, 2, 3, Some(1), Some(5)));
    }

    #[test]
    fn test_parse_rejects_too_few_fields() {
        let err = Label::from_filename("100_2_3_1.csv").unwrap_err();
        assert!(matches!(err, ObsError::InvalidFilename { .. }));
    }

    #[test]
    fn test_parse_rejects_too_many_fields() {
        assert!(Label::from_filename("100_2_3_1_5_6.csv").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_integer() {
        let err = Label::from_filename("100_x_3_1_5.csv").unwrap_err();
        assert!(matches!(
            err,
            ObsError::InvalidLabelField { field: "type", .. }
        ));
    }

    #[test]
    fn test_parse_rejects_missing_station() {
        assert!(Label::from_filename("_2_3_1_5.csv").is_err());
    }

    #[test]
    fn test_absent_never_equals_zero() {
        let absent = Label::new(1, 2, 3, None, None);
        let zero = Label::new(1, 2, 3, Some(0), Some(0));
        assert_ne!(absent, zero);
    }

    #[test]
    fn test_dest_sensor_level_defaults_become_null() {
        let label = Label::new(1, 2, 3, Some(0), Some(0));
        assert_eq!(label.dest_sensor_level(), (None, None));
        assert_eq!(label.normalized(), Label::new(1, 2, 3, None, None));
    }

    #[test]
    fn test_dest_sensor_level_keeps_non_default() {
        let label = Label::new(1, 2, 3, Some(0), Some(2));
        assert_eq!(label.dest_sensor_level(), (Some(0), Some(2)));
    }

    #[test]
    fn test_display() {
        let label = Label::new(1, 2, 3, None, Some(4));
        assert_eq!(label.to_string(), "1/2/3//4");
    }
}
