//! Core library for the `codemetal-airwatch` backend service.
//!
//! The pipeline is Fetch -> Normalize -> Evaluate/Forecast, each stage its own
//! module with a narrow contract so the pieces are testable in isolation
//! (EMBP: the binary only talks to module gateways):
//! - [`fetcher`] – snapshot retrieval from the remote store + TTL cache
//! - [`normalizer`] – raw keyed collection -> ordered, typed, timestamped series
//! - [`alerts`] – latest record -> categorical health/safety levels
//! - [`forecast`] – PM2.5 series -> predictions, bounds, and a trend verdict
//! - [`routes`] – HTTP surface assembling the above into dashboard payloads

pub mod alerts;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod forecast;
pub mod models;
pub mod normalizer;
pub mod routes;

pub use config::Config;

// Re-exported so route modules and integration tests do not need to know the
// internal module layout, only the crate root.
pub use alerts::{evaluate, AlertState};
pub use models::{RawSnapshot, SensorRecord};
