//! QC store conversion.
//!
//! QC store rows already carry destination-style flags, so conversion is
//! close to the identity. Two cloud-type param families are stored in the
//! wrong table and switch representation on the way in.

use chrono::{DateTime, Utc};

use obs_common::flags::{
    is_metar_cloud_type, is_special_cloud_type, normalize_flag_string, sentinel_to_null,
    DEFAULT_USEINFO, VALUE_PASSED_QC,
};
use obs_common::{DestFlagRow, DestTextRow, DestValueRow, QcdbDataRecord, QcdbTextRecord};

use super::Converted;
use crate::error::{MigrationError, Result};

/// Convert a row of the numeric table.
pub fn convert_data(timeseries: i32, param_id: i32, rec: &QcdbDataRecord) -> Result<Converted> {
    if is_special_cloud_type(param_id) {
        return Ok(Converted::Text(DestTextRow {
            timeseries,
            obstime: rec.obstime,
            text: Some(rec.original.to_string()),
        }));
    }

    let original = sentinel_to_null(rec.original).map(|v| v as f32);
    let corrected = sentinel_to_null(rec.corrected).map(|v| v as f32);
    let controlinfo = flag_field(rec.obstime, "controlinfo", &rec.controlinfo, VALUE_PASSED_QC)?;
    let useinfo = flag_field(rec.obstime, "useinfo", &rec.useinfo, DEFAULT_USEINFO)?;
    let cfailed = Some(rec.cfailed.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Ok(Converted::Numeric {
        value: DestValueRow {
            timeseries,
            obstime: rec.obstime,
            value: original,
        },
        flag: Some(DestFlagRow {
            timeseries,
            obstime: rec.obstime,
            original,
            corrected,
            controlinfo,
            useinfo,
            cfailed,
        }),
    })
}

/// Convert a row of the text table.
pub fn convert_text(timeseries: i32, param_id: i32, rec: &QcdbTextRecord) -> Result<Converted> {
    if is_metar_cloud_type(param_id) {
        let value = rec
            .original
            .trim()
            .parse::<f32>()
            .map_err(|_| MigrationError::Conversion {
                obstime: rec.obstime,
                message: format!("cloud type '{}' is not a number", rec.original),
            })?;
        return Ok(Converted::Numeric {
            value: DestValueRow {
                timeseries,
                obstime: rec.obstime,
                value: Some(value),
            },
            flag: None,
        });
    }

    Ok(Converted::Text(DestTextRow {
        timeseries,
        obstime: rec.obstime,
        text: Some(rec.original.clone()),
    }))
}

/// Validate a flag column; an empty column takes the store's default.
fn flag_field(
    obstime: DateTime<Utc>,
    column: &str,
    raw: &str,
    default: &str,
) -> Result<String> {
    if raw.trim().is_empty() {
        return Ok(default.to_string());
    }
    normalize_flag_string(raw).ok_or_else(|| MigrationError::Conversion {
        obstime,
        message: format!("{} '{}' is not a 16 digit flag string", column, raw),
    })
}
