//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw and normalized metric rows (`RawMetricRow`, `MetricRow`)
//! - the merged timeline (`Timeline`, `TimelineRow`, `Origin`)
//! - forecast outputs and run configuration (`PodForecast`, `ForecastConfig`)

pub mod types;

pub use types::*;
