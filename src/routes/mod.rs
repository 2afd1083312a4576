use std::sync::Arc;

use axum::Router;
use tokio::sync::Mutex;

use crate::fetcher::CachedFetcher;
use crate::Config;

pub mod dashboard;
mod health;

// ---

/// Shared state for all routes: the snapshot cache (behind a mutex so at most
/// one refresh pass runs at a time) plus the immutable configuration.
pub type AppState = (Arc<Mutex<CachedFetcher>>, Config);

pub fn router(cache: Arc<Mutex<CachedFetcher>>, config: Config) -> Router {
    // ---
    Router::new()
        .merge(dashboard::router())
        .merge(health::router())
        .with_state((cache, config))
}
