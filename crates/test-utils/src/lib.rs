//! Shared test utilities for the observation migration workspace.
//!
//! This crate provides common testing infrastructure including:
//! - In-memory sources and destination ([`fakes`])
//! - Temporary dump trees ([`tree`])
//! - Observation generators
//! - Common catalog fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, DumpTree, MemoryDestination};
//! ```

pub mod fakes;
pub mod fixtures;
pub mod generators;
pub mod tree;

// Re-export commonly used items at the crate root
pub use fakes::*;
pub use fixtures::*;
pub use generators::*;
pub use tree::*;

/// Assert that a converted observation value is within `tolerance` of `expected`.
///
/// Destination values are `f32`, so a dumped `"0.2"` rarely compares equal to
/// the literal `0.2`.
///
/// ```ignore
/// assert_approx_eq!(values[2].value.unwrap_or_default(), 0.2, 1e-6);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let (actual, expected) = ($actual as f64, $expected as f64);
        let tolerance = $tolerance as f64;
        assert!(
            (actual - expected).abs() <= tolerance,
            "assertion failed: value {} is not within {} of {}",
            actual,
            tolerance,
            expected
        );
    }};
}

/// Assert that an optional float is present and approximately `expected`.
#[macro_export]
macro_rules! assert_some_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        match $left {
            Some(value) => $crate::assert_approx_eq!(value, $right, $epsilon),
            None => panic!("assertion failed: expected Some(≈{:?}), got None", $right),
        }
    }};
}
