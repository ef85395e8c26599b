//! Common test fixtures for migration tests.
//!
//! This module provides pre-defined catalog data that represents common
//! scenarios in the archive and the QC store.

use chrono::{DateTime, TimeZone, Utc};

use obs_common::{ElementInfo, ElementKey, ParamPermit, StationPermit};
use storage::CatalogSnapshot;

/// Common station ids.
pub mod stations {
    /// Oslo - Blindern
    pub const BLINDERN: i32 = 18700;

    /// Bergen - Florida
    pub const FLORIDA: i32 = 50540;

    /// A station whose data is not open.
    pub const RESTRICTED: i32 = 99999;
}

/// Common type and param ids.
pub mod params {
    /// Archive hourly observations (T_ADATA)
    pub const TYPE_HOURLY: i32 = 312;

    /// Archive manual observations (T_VDATA)
    pub const TYPE_MANUAL: i32 = 302;

    /// QC store synop
    pub const TYPE_SYNOP: i32 = 501;

    /// Air temperature
    pub const TA: i32 = 211;

    /// Hourly precipitation
    pub const RR_1: i32 = 106;

    /// Sunshine duration over 24 hours
    pub const OT_24: i32 = 121;

    /// A free-text weather description
    pub const WEATHER_TEXT: i32 = 1000;

    /// First METAR cloud-type param
    pub const METAR_CLOUD: i32 = 2751;

    /// First special cloud-type param
    pub const SPECIAL_CLOUD: i32 = 305;
}

/// Permit ids used by the catalog.
pub mod permits {
    pub const OPEN: i32 = 1;
    pub const CLOSED: i32 = 2;
}

/// Shorthand for a whole-hour UTC timestamp.
pub fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid fixture time {year}-{month}-{day} {hour}h"))
}

/// Scalar element info with sensor and level zero.
pub fn scalar_element(type_id: i32, param_id: i32) -> ElementInfo {
    ElementInfo {
        type_id,
        param_id,
        sensor: Some(0),
        level: Some(0),
        valid_from: None,
        is_scalar: true,
    }
}

/// Non-scalar element info.
pub fn text_element(type_id: i32, param_id: i32) -> ElementInfo {
    ElementInfo {
        is_scalar: false,
        ..scalar_element(type_id, param_id)
    }
}

/// Catalog snapshot with the given elements and every listed station open.
pub fn open_snapshot(elements: Vec<(ElementKey, ElementInfo)>, stations: &[i32]) -> CatalogSnapshot {
    CatalogSnapshot {
        elements,
        param_permits: Vec::new(),
        station_permits: stations
            .iter()
            .map(|&station_id| StationPermit {
                station_id,
                permit_id: permits::OPEN,
            })
            .collect(),
    }
}

/// Permit override closing one (station, type, param).
pub fn closed_param(station_id: i32, type_id: i32, param_id: i32) -> ParamPermit {
    ParamPermit {
        station_id,
        type_id,
        param_id,
        permit_id: permits::CLOSED,
    }
}

/// The archive elements used across the import tests.
pub fn arch_elements() -> Vec<(ElementKey, ElementInfo)> {
    vec![
        (
            ElementKey::new("T_ADATA", "TA"),
            scalar_element(params::TYPE_HOURLY, params::TA),
        ),
        (
            ElementKey::new("T_ADATA", "RR_1"),
            scalar_element(params::TYPE_HOURLY, params::RR_1),
        ),
        (
            ElementKey::new("T_VDATA", "OT_24"),
            scalar_element(params::TYPE_MANUAL, params::OT_24),
        ),
        (
            ElementKey::new("T_ADATA", "WW_TEXT"),
            text_element(params::TYPE_HOURLY, params::WEATHER_TEXT),
        ),
    ]
}
