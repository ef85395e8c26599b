//! Quality-control flag vocabulary of the destination flag table.
//!
//! `controlinfo` and `useinfo` are 16-character strings over `[0-9A-F]`. The
//! archive only carries a 5-digit fragment of the useinfo, which is widened
//! here with a fixed tail.

/// Value passed quality control.
pub const VALUE_PASSED_QC: &str = "0000000000000000";
pub const VALUE_CORRECTED_AUTOMATICALLY: &str = "0000001000000000";
pub const VALUE_MANUALLY_INTERPOLATED: &str = "0000001000000005";
pub const VALUE_MANUALLY_ASSIGNED: &str = "0000001000000006";
pub const VALUE_REMOVED_BY_QC: &str = "0000002000000000";
pub const VALUE_MISSING: &str = "0000003000000000";
pub const VALUE_PASSED_HQC: &str = "0000000000000001";
pub const INTERPOLATION_ADDED_MANUALLY: &str = "0000000000000005";

/// Tail appended to a 5-digit archive flag ("default delay").
pub const DELAY_DEFAULT_SUFFIX: &str = "00900000000";

/// Useinfo used when the archive flag is not a valid 5-digit code.
pub const INVALID_USEINFO: &str = "9999900900000000";
pub const COMPLETED_HQC: &str = "4000000900000000";
pub const DIURNAL_INTERPOLATED_USEINFO: &str = "4892500900000000";

/// Default useinfo of a QC store row with an empty useinfo column.
pub const DEFAULT_USEINFO: &str = "0000000000000000";

/// Cloud-type params stored as text in the QC store but numeric in the destination.
pub const METAR_CLOUD_TYPES: [i32; 4] = [2751, 2752, 2753, 2754];

/// Cloud-type params stored as numbers in the QC store but text in the destination.
pub const SPECIAL_CLOUD_TYPES: [i32; 4] = [305, 306, 307, 308];

/// Values the QC store uses in place of NULL.
pub const NULL_SENTINELS: [f64; 2] = [-34767.0, -34766.0];

/// Length of a controlinfo or useinfo string.
pub const FLAG_LEN: usize = 16;

/// Length of a raw archive flag.
pub const RAW_FLAG_LEN: usize = 5;

/// Whether a raw archive flag is a 5-digit decimal code.
pub fn is_valid_raw_flag(raw: &str) -> bool {
    raw.len() == RAW_FLAG_LEN && raw.bytes().all(|b| b.is_ascii_digit())
}

/// Recover a 16-character useinfo from a raw archive flag.
pub fn useinfo_from_raw_flag(raw: &str) -> String {
    if is_valid_raw_flag(raw) {
        format!("{}{}", raw, DELAY_DEFAULT_SUFFIX)
    } else {
        INVALID_USEINFO.to_string()
    }
}

/// Whether `flag` is a well-formed controlinfo/useinfo string.
pub fn is_flag_string(flag: &str) -> bool {
    flag.len() == FLAG_LEN
        && flag
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

/// Normalize a QC store flag string, uppercasing hex digits.
pub fn normalize_flag_string(flag: &str) -> Option<String> {
    let upper = flag.trim().to_ascii_uppercase();
    is_flag_string(&upper).then_some(upper)
}

pub fn is_metar_cloud_type(param_id: i32) -> bool {
    METAR_CLOUD_TYPES.contains(&param_id)
}

pub fn is_special_cloud_type(param_id: i32) -> bool {
    SPECIAL_CLOUD_TYPES.contains(&param_id)
}

/// Map the QC store's null sentinels to `None`.
pub fn sentinel_to_null(value: f64) -> Option<f64> {
    if NULL_SENTINELS.contains(&value) {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_flag_strings() {
        for flag in [
            VALUE_PASSED_QC,
            VALUE_CORRECTED_AUTOMATICALLY,
            VALUE_MANUALLY_INTERPOLATED,
            VALUE_MANUALLY_ASSIGNED,
            VALUE_REMOVED_BY_QC,
            VALUE_MISSING,
            VALUE_PASSED_HQC,
            INTERPOLATION_ADDED_MANUALLY,
            INVALID_USEINFO,
            COMPLETED_HQC,
            DIURNAL_INTERPOLATED_USEINFO,
        ] {
            assert!(is_flag_string(flag), "{flag} is not a flag string");
        }
    }

    #[test]
    fn test_raw_flag_validity() {
        assert!(!is_valid_raw_flag(""));
        assert!(!is_valid_raw_flag("asdas"));
        assert!(!is_valid_raw_flag("12.34"));
        assert!(!is_valid_raw_flag("-1234"));
        assert!(!is_valid_raw_flag("123456"));
        assert!(is_valid_raw_flag("12309"));
    }

    #[test]
    fn test_useinfo_recovery() {
        assert_eq!(useinfo_from_raw_flag("12309"), "1230900900000000");
        assert_eq!(useinfo_from_raw_flag("12.34"), INVALID_USEINFO);
        assert_eq!(useinfo_from_raw_flag(""), INVALID_USEINFO);
    }

    #[test]
    fn test_normalize_flag_string() {
        assert_eq!(
            normalize_flag_string("00000a0000000000").as_deref(),
            Some("00000A0000000000")
        );
        assert_eq!(normalize_flag_string("000"), None);
        assert_eq!(normalize_flag_string("000000000000000G"), None);
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(sentinel_to_null(-34767.0), None);
        assert_eq!(sentinel_to_null(-34766.0), None);
        assert_eq!(sentinel_to_null(-3.5), Some(-3.5));
    }

    #[test]
    fn test_cloud_type_sets() {
        assert!(is_metar_cloud_type(2753));
        assert!(!is_metar_cloud_type(305));
        assert!(is_special_cloud_type(305));
        assert!(!is_special_cloud_type(2751));
    }
}
