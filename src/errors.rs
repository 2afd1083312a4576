//! Error taxonomy for the dashboard pipeline.
//!
//! Only a fetch failure aborts a refresh pass. Everything else is contained
//! where it happens: a malformed record field falls back to its default inside
//! the normalizer, and forecasting failures degrade to an on-screen message so
//! the rest of the dashboard still renders.

use thiserror::Error;

// ---

/// Failure talking to the remote store. Fatal to the current refresh pass
/// only; the caller retries on the next cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    // ---
    /// Store unreachable, TLS failure, timeout, or response body unreadable.
    #[error("remote store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Store answered with a non-success status (bad auth token, bad path).
    #[error("remote store rejected request: HTTP {0}")]
    Status(reqwest::StatusCode),

    /// Response decoded but was not the expected keyed collection.
    #[error("unexpected snapshot payload: {0}")]
    Payload(String),
}

/// Why a forecast was not produced. Never aborts a refresh pass.
#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    // ---
    /// Below the minimum sample gate; the model was never invoked.
    #[error("insufficient history for forecasting: have {have} records, need {need}")]
    InsufficientData { have: usize, need: usize },

    /// The model ran on valid-shaped input and failed (numerical degeneracy).
    #[error("forecast computation failed: {0}")]
    Compute(String),
}
