//! Common types and utilities shared across the observation migration crates.
//!
//! This crate holds everything both migration phases agree on:
//!
//! - [`Label`]: the five-tuple identifying a series, and its filename codec
//! - Observation row shapes for the dump files and the destination tables
//! - The CSV codec used for dump files ([`codec`])
//! - The 16-character quality-control flag vocabulary ([`flags`])
//! - Timestamp formats, ISO-8601 periods and allow-list filters

pub mod catalog;
pub mod codec;
pub mod error;
pub mod filter;
pub mod flags;
pub mod label;
pub mod observation;
pub mod period;
pub mod time;

pub use catalog::{ElementInfo, ElementKey, ParamPermit, SeriesTimespan, StationPermit};
pub use codec::{CsvRecord, SeriesReader, SeriesWriter};
pub use error::{ObsError, ObsResult};
pub use filter::{AllowList, LabelFilter};
pub use label::Label;
pub use observation::{
    DestFlagRow, DestTextRow, DestValueRow, QcdbDataRecord, QcdbTextRecord, RawObservation,
};
pub use period::Period;
pub use time::TimeWindow;
