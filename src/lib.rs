#![forbid(unsafe_code)]

//! Dual-path greenhouse-gas estimation for user-reported activities.
//!
//! Each activity is priced twice: once from flat regional emission-factor
//! tables (the direct estimate) and once by rescaling that baseline with
//! regional, seasonal and activity corrections (the algorithmic estimate).
//! The two are compared per activity and over the batch totals.

pub mod algorithm;
pub mod compare;
pub mod config;
pub mod direct;
pub mod error;
pub mod guards;
pub mod pipeline;
pub mod registry;
pub mod source;
pub mod types;
pub mod units;

pub use config::EngineConfig;
pub use error::{BoundaryError, ConfigError, EstimateError, SourceError};
pub use pipeline::CarbonEngine;
pub use source::{EmissionFactorSource, FactorEntry, OfflineSource, StaticFactorSource};
pub use types::{
    ActivityDescriptor, ActivityRequest, ActivityResult, BatchInput, BatchReport,
    ComparisonResult, QuantityType,
};

/// Round half away from zero to `places` decimals.
pub fn round_dp(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
