//! Archive conversion rules.
//!
//! The archive keeps a single 5-digit flag per observation. The rules below
//! recover a destination `controlinfo` from table-specific flag codes and a
//! `useinfo` from the flag itself (see [`useinfo_from_raw_flag`]).

use chrono::Timelike;

use obs_common::flags::{
    useinfo_from_raw_flag, COMPLETED_HQC, DIURNAL_INTERPOLATED_USEINFO,
    INTERPOLATION_ADDED_MANUALLY, INVALID_USEINFO, VALUE_CORRECTED_AUTOMATICALLY,
    VALUE_MANUALLY_ASSIGNED, VALUE_MANUALLY_INTERPOLATED, VALUE_MISSING, VALUE_PASSED_QC,
    VALUE_REMOVED_BY_QC,
};
use obs_common::{DestFlagRow, DestTextRow, DestValueRow, Period, RawObservation};

use super::Converted;
use crate::error::{MigrationError, Result};
use crate::tables::ConvertRule;

/// Element of the V-table stored in hours and stamped six hours early.
const OT_24: &str = "OT_24";

/// Per-series inputs of a conversion.
#[derive(Debug, Clone, Copy)]
pub struct ArchContext<'a> {
    pub timeseries: i32,
    /// Uppercased element code.
    pub element: &'a str,
    pub is_scalar: bool,
    /// Product offset; zero outside product tables.
    pub offset: Period,
}

/// Convert one archive observation with `rule`.
///
/// Non-scalar elements always become a text row carrying the raw value.
pub fn convert(rule: ConvertRule, ctx: &ArchContext<'_>, obs: &RawObservation) -> Result<Converted> {
    let converted = if !ctx.is_scalar {
        text_row(ctx, obs)
    } else {
        match rule {
            ConvertRule::Default | ConvertRule::Product => {
                coded(ctx, obs, |value, _| default_controlinfo(value))
            }
            ConvertRule::Edata => coded(ctx, obs, edata_controlinfo),
            ConvertRule::Pdata => coded(ctx, obs, pdata_controlinfo),
            ConvertRule::Ndata => coded(ctx, obs, ndata_controlinfo),
            ConvertRule::Vdata => return vdata(ctx, obs),
            ConvertRule::DiurnalInterpolated => return diurnal_interpolated(ctx, obs),
        }
    };

    match rule {
        ConvertRule::Product => shift(converted, ctx.offset),
        _ => Ok(converted),
    }
}

/// Parse a raw value as single precision; empty or malformed values are missing.
pub fn parse_value(raw: &str) -> Option<f32> {
    raw.trim().parse::<f32>().ok()
}

fn text_row(ctx: &ArchContext<'_>, obs: &RawObservation) -> Converted {
    Converted::Text(DestTextRow {
        timeseries: ctx.timeseries,
        obstime: obs.obstime,
        text: Some(obs.value.clone()),
    })
}

/// Numeric row whose controlinfo comes from `controlinfo(value, raw_flag)`.
fn coded(
    ctx: &ArchContext<'_>,
    obs: &RawObservation,
    controlinfo: fn(Option<f32>, &str) -> &'static str,
) -> Converted {
    let value = parse_value(&obs.value);
    flagged(
        ctx.timeseries,
        obs,
        value,
        controlinfo(value, &obs.flag),
        useinfo_from_raw_flag(&obs.flag),
    )
}

fn flagged(
    timeseries: i32,
    obs: &RawObservation,
    value: Option<f32>,
    controlinfo: &str,
    useinfo: String,
) -> Converted {
    Converted::Numeric {
        value: DestValueRow {
            timeseries,
            obstime: obs.obstime,
            value,
        },
        flag: Some(DestFlagRow {
            timeseries,
            obstime: obs.obstime,
            original: value,
            corrected: value,
            controlinfo: controlinfo.to_string(),
            useinfo,
            cfailed: None,
        }),
    }
}

fn shift(mut converted: Converted, offset: Period) -> Result<Converted> {
    if offset.is_zero() {
        return Ok(converted);
    }
    let obstime = converted.obstime();
    let shifted = offset
        .apply(obstime)
        .ok_or_else(|| MigrationError::Conversion {
            obstime,
            message: format!("product offset {:?} is out of range", offset),
        })?;
    converted.set_obstime(shifted);
    Ok(converted)
}

fn default_controlinfo(value: Option<f32>) -> &'static str {
    match value {
        Some(_) => VALUE_PASSED_QC,
        None => VALUE_MISSING,
    }
}

fn edata_controlinfo(value: Option<f32>, flag: &str) -> &'static str {
    match (value, flag) {
        (None, "70381" | "70389" | "90989") => VALUE_REMOVED_BY_QC,
        (None, _) => VALUE_MISSING,
        (Some(_), _) => VALUE_PASSED_QC,
    }
}

fn pdata_controlinfo(value: Option<f32>, flag: &str) -> &'static str {
    match (value, flag) {
        (None, "20389" | "30389" | "40389" | "50383" | "70381" | "71381") => VALUE_REMOVED_BY_QC,
        (None, _) => VALUE_MISSING,
        (Some(_), "10319" | "10329" | "30319" | "40319" | "48929" | "48999") => {
            VALUE_MANUALLY_INTERPOLATED
        }
        (Some(_), "20389" | "30389" | "40389" | "50383" | "70381" | "71381" | "99319") => {
            VALUE_CORRECTED_AUTOMATICALLY
        }
        (Some(_), "40929") => INTERPOLATION_ADDED_MANUALLY,
        (Some(_), _) => VALUE_PASSED_QC,
    }
}

fn ndata_controlinfo(value: Option<f32>, flag: &str) -> &'static str {
    match (value, flag) {
        (None, "70389") => VALUE_REMOVED_BY_QC,
        (None, _) => VALUE_MISSING,
        (Some(_), "43325" | "48325") => VALUE_MANUALLY_ASSIGNED,
        (Some(_), "30319" | "38929" | "40315" | "40319") => VALUE_MANUALLY_INTERPOLATED,
        (Some(_), "49225" | "49915") => INTERPOLATION_ADDED_MANUALLY,
        (Some(_), "70389" | "73309" | "78937" | "93399" | "98999") => {
            VALUE_CORRECTED_AUTOMATICALLY
        }
        (Some(_), _) => VALUE_PASSED_QC,
    }
}

/// V-table: useinfo follows the synoptic hour of the source timestamp.
///
/// `OT_24` is stored in hours at 06 UTC; the destination expects minutes at
/// the end of the day, so parsed values move 18 hours forward and scale by 60.
fn vdata(ctx: &ArchContext<'_>, obs: &RawObservation) -> Result<Converted> {
    let useinfo = match obs.obstime.hour() {
        0 | 6 | 12 | 18 => COMPLETED_HQC,
        _ => INVALID_USEINFO,
    };

    let Some(value) = parse_value(&obs.value) else {
        return Ok(flagged(
            ctx.timeseries,
            obs,
            None,
            VALUE_MISSING,
            useinfo.to_string(),
        ));
    };

    if ctx.element != OT_24 {
        return Ok(flagged(
            ctx.timeseries,
            obs,
            Some(value),
            VALUE_PASSED_QC,
            useinfo.to_string(),
        ));
    }

    let mut converted = flagged(
        ctx.timeseries,
        obs,
        Some(value * 60.0),
        VALUE_PASSED_QC,
        useinfo.to_string(),
    );
    let obstime = Period::hours(18)
        .apply(obs.obstime)
        .ok_or_else(|| MigrationError::Conversion {
            obstime: obs.obstime,
            message: "OT_24 shift is out of range".to_string(),
        })?;
    converted.set_obstime(obstime);
    Ok(converted)
}

fn diurnal_interpolated(ctx: &ArchContext<'_>, obs: &RawObservation) -> Result<Converted> {
    let value = parse_value(&obs.value).ok_or_else(|| MigrationError::Conversion {
        obstime: obs.obstime,
        message: format!("interpolated value '{}' is not a number", obs.value),
    })?;

    Ok(flagged(
        ctx.timeseries,
        obs,
        Some(value),
        VALUE_MANUALLY_INTERPOLATED,
        DIURNAL_INTERPOLATED_USEINFO.to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use obs_common::flags::is_flag_string;

    fn ctx(element: &str) -> ArchContext<'_> {
        ArchContext {
            timeseries: 42,
            element,
            is_scalar: true,
            offset: Period::ZERO,
        }
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, h, 0, 0).unwrap()
    }

    fn numeric(converted: Converted) -> (DestValueRow, DestFlagRow) {
        match converted {
            Converted::Numeric {
                value,
                flag: Some(flag),
            } => (value, flag),
            other => panic!("expected a flagged numeric row, got {:?}", other),
        }
    }

    #[test]
    fn test_default_numeric() {
        let obs = RawObservation::new(at(6), "12.3", "12345");
        let (value, flag) = numeric(convert(ConvertRule::Default, &ctx("TAM"), &obs).unwrap());

        assert_eq!(value.value, Some(12.3f32));
        assert_eq!(value.timeseries, 42);
        assert_eq!(flag.controlinfo, "0000000000000000");
        assert_eq!(flag.useinfo, "1234500900000000");
        assert_eq!(flag.original, Some(12.3f32));
        assert_eq!(flag.corrected, Some(12.3f32));
        assert_eq!(flag.cfailed, None);
    }

    #[test]
    fn test_default_invalid_flag() {
        let obs = RawObservation::new(at(6), "12.3", "abcde");
        let (value, flag) = numeric(convert(ConvertRule::Default, &ctx("TAM"), &obs).unwrap());

        assert_eq!(value.value, Some(12.3f32));
        assert_eq!(flag.controlinfo, "0000000000000000");
        assert_eq!(flag.useinfo, "9999900900000000");
    }

    #[test]
    fn test_default_missing_value() {
        let obs = RawObservation::new(at(6), "", "");
        let (value, flag) = numeric(convert(ConvertRule::Default, &ctx("TAM"), &obs).unwrap());

        assert_eq!(value.value, None);
        assert_eq!(flag.controlinfo, "0000003000000000");
        assert_eq!(flag.useinfo, "9999900900000000");
    }

    #[test]
    fn test_edata_removed_by_qc() {
        let obs = RawObservation::new(at(6), "", "70389");
        let (value, flag) = numeric(convert(ConvertRule::Edata, &ctx("TA"), &obs).unwrap());

        assert_eq!(value.value, None);
        assert_eq!(flag.controlinfo, "0000002000000000");
        assert_eq!(flag.useinfo, "7038900900000000");
    }

    #[test]
    fn test_edata_unknown_flag_is_missing() {
        let obs = RawObservation::new(at(6), "", "70000");
        let (_, flag) = numeric(convert(ConvertRule::Edata, &ctx("TA"), &obs).unwrap());
        assert_eq!(flag.controlinfo, VALUE_MISSING);
    }

    #[test]
    fn test_pdata_codes() {
        let cases = [
            ("1.0", "10319", VALUE_MANUALLY_INTERPOLATED),
            ("1.0", "99319", VALUE_CORRECTED_AUTOMATICALLY),
            ("1.0", "70381", VALUE_CORRECTED_AUTOMATICALLY),
            ("1.0", "40929", INTERPOLATION_ADDED_MANUALLY),
            ("1.0", "90909", VALUE_PASSED_QC),
            ("", "70381", VALUE_REMOVED_BY_QC),
            ("", "10319", VALUE_MISSING),
        ];
        for (raw, code, expected) in cases {
            let obs = RawObservation::new(at(6), raw, code);
            let (_, flag) = numeric(convert(ConvertRule::Pdata, &ctx("PR"), &obs).unwrap());
            assert_eq!(flag.controlinfo, expected, "value {raw:?} flag {code}");
        }
    }

    #[test]
    fn test_ndata_codes() {
        let cases = [
            ("3", "43325", VALUE_MANUALLY_ASSIGNED),
            ("3", "38929", VALUE_MANUALLY_INTERPOLATED),
            ("3", "49915", INTERPOLATION_ADDED_MANUALLY),
            ("3", "78937", VALUE_CORRECTED_AUTOMATICALLY),
            ("3", "70000", VALUE_PASSED_QC),
            ("", "70389", VALUE_REMOVED_BY_QC),
            ("", "43325", VALUE_MISSING),
        ];
        for (raw, code, expected) in cases {
            let obs = RawObservation::new(at(6), raw, code);
            let (_, flag) = numeric(convert(ConvertRule::Ndata, &ctx("NN"), &obs).unwrap());
            assert_eq!(flag.controlinfo, expected, "value {raw:?} flag {code}");
        }
    }

    #[test]
    fn test_vdata_ot_24() {
        let t = Utc.with_ymd_and_hms(2019, 3, 15, 6, 0, 0).unwrap();
        let obs = RawObservation::new(t, "2", "12345");
        let (value, flag) = numeric(convert(ConvertRule::Vdata, &ctx("OT_24"), &obs).unwrap());

        assert_eq!(
            value.obstime,
            Utc.with_ymd_and_hms(2019, 3, 16, 0, 0, 0).unwrap()
        );
        assert_eq!(flag.obstime, value.obstime);
        assert_eq!(value.value, Some(120.0f32));
        assert_eq!(flag.useinfo, "4000000900000000");
        assert_eq!(flag.controlinfo, "0000000000000000");
    }

    #[test]
    fn test_vdata_useinfo_follows_hour() {
        let off_hour = RawObservation::new(at(7), "1", "12345");
        let (_, flag) = numeric(convert(ConvertRule::Vdata, &ctx("VV"), &off_hour).unwrap());
        assert_eq!(flag.useinfo, INVALID_USEINFO);

        let missing = RawObservation::new(at(18), "", "12345");
        let (value, flag) = numeric(convert(ConvertRule::Vdata, &ctx("OT_24"), &missing).unwrap());
        assert_eq!(value.value, None);
        assert_eq!(value.obstime, at(18));
        assert_eq!(flag.useinfo, COMPLETED_HQC);
        assert_eq!(flag.controlinfo, VALUE_MISSING);
    }

    #[test]
    fn test_diurnal_interpolated() {
        let obs = RawObservation::new(at(0), "5.5", "");
        let (value, flag) =
            numeric(convert(ConvertRule::DiurnalInterpolated, &ctx("TAM"), &obs).unwrap());
        assert_eq!(value.value, Some(5.5));
        assert_eq!(flag.useinfo, "4892500900000000");
        assert_eq!(flag.controlinfo, VALUE_MANUALLY_INTERPOLATED);

        let bad = RawObservation::new(at(0), "", "");
        assert!(matches!(
            convert(ConvertRule::DiurnalInterpolated, &ctx("TAM"), &bad),
            Err(MigrationError::Conversion { .. })
        ));
    }

    #[test]
    fn test_product_offset_moves_all_rows() {
        let mut product = ctx("TAM");
        product.offset = "P1D".parse().unwrap();
        let obs = RawObservation::new(at(0), "1", "");
        let (value, flag) = numeric(convert(ConvertRule::Product, &product, &obs).unwrap());

        let expected = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(value.obstime, expected);
        assert_eq!(flag.obstime, expected);
    }

    #[test]
    fn test_non_scalar_is_text_only() {
        let mut text = ctx("WW");
        text.is_scalar = false;
        let obs = RawObservation::new(at(6), "RA SN", "12345");

        for rule in [ConvertRule::Default, ConvertRule::Edata, ConvertRule::Vdata] {
            match convert(rule, &text, &obs).unwrap() {
                Converted::Text(row) => assert_eq!(row.text.as_deref(), Some("RA SN")),
                other => panic!("expected text, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_useinfo_is_always_a_flag_string() {
        for raw_flag in ["", "asdas", "12.34", "12309", "-1234", "123456"] {
            for rule in [ConvertRule::Default, ConvertRule::Pdata, ConvertRule::Vdata] {
                let obs = RawObservation::new(at(3), "1", raw_flag);
                let (_, flag) = numeric(convert(rule, &ctx("X"), &obs).unwrap());
                assert!(is_flag_string(&flag.useinfo), "{rule} {raw_flag:?}");
                assert!(is_flag_string(&flag.controlinfo));
            }
        }
    }
}
