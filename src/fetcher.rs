//! Snapshot fetching from the remote keyed store, with a short-lived cache.
//!
//! The store is a Firebase-style realtime database: one GET against a fixed
//! logical path returns the entire keyed collection as JSON (or `null` when
//! nothing has been pushed yet). This module is a pure I/O boundary; no
//! reshaping beyond decoding happens here.
//!
//! Repeated dashboard refreshes inside the cache validity window reuse the
//! last snapshot instead of issuing redundant store calls. The cache is an
//! explicit object with an injectable clock, not an ambient time-to-live
//! decoration, so its expiry behavior is testable.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::FetchError;
use crate::models::RawSnapshot;

// ---

/// Fixed logical path the device pushes readings under.
pub const STORE_PATH: &str = "air_quality";

/// Anything that can produce a raw snapshot. The production implementation is
/// [`SnapshotFetcher`]; tests substitute a stub.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<RawSnapshot, FetchError>;
}

/// Reads the full current keyed collection from the remote store over HTTP.
///
/// Constructed once at startup with an explicit client and passed down; there
/// is no ambient global connection state.
pub struct SnapshotFetcher {
    client: reqwest::Client,
    store_url: String,
    auth_token: Option<String>,
}

impl SnapshotFetcher {
    pub fn new(client: reqwest::Client, store_url: String, auth_token: Option<String>) -> Self {
        // ---
        Self {
            client,
            store_url,
            auth_token,
        }
    }

    fn request_url(&self) -> String {
        // ---
        format!("{}/{}.json", self.store_url.trim_end_matches('/'), STORE_PATH)
    }
}

#[async_trait]
impl SnapshotSource for SnapshotFetcher {
    async fn fetch(&self) -> Result<RawSnapshot, FetchError> {
        // ---
        let mut request = self.client.get(self.request_url());
        if let Some(token) = &self.auth_token {
            request = request.query(&[("auth", token.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body: Value = response.json().await?;
        decode_snapshot(body)
    }
}

/// Decode the store's JSON body into a raw snapshot.
///
/// `null` means the path holds no data yet. A non-object value under a key is
/// logged and kept as an empty field-map (the normalizer turns it into an
/// all-defaults record) rather than failing the whole snapshot.
fn decode_snapshot(body: Value) -> Result<RawSnapshot, FetchError> {
    // ---
    match body {
        Value::Null => Ok(RawSnapshot::new()),
        Value::Object(entries) => {
            let mut snapshot = RawSnapshot::new();
            for (key, value) in entries {
                let field_map = match value {
                    Value::Object(fields) => fields.into_iter().collect(),
                    other => {
                        warn!("record {key}: expected field-map, got {other}");
                        BTreeMap::new()
                    }
                };
                snapshot.insert(key, field_map);
            }
            Ok(snapshot)
        }
        other => Err(FetchError::Payload(format!(
            "expected keyed collection or null, got {other}"
        ))),
    }
}

// ---

/// Clock seam for the cache, so expiry is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Time-based cache wrapping a [`SnapshotSource`].
///
/// `get_or_fetch` returns the cached snapshot while it is younger than
/// `max_age`, otherwise fetches a fresh one. A failed fetch propagates and
/// leaves the previous entry in place for age bookkeeping only; it is not
/// served as fresh.
pub struct CachedFetcher {
    source: Box<dyn SnapshotSource>,
    clock: Box<dyn Clock>,
    max_age: Duration,
    last: Option<(Instant, RawSnapshot)>,
}

impl CachedFetcher {
    pub fn new(source: Box<dyn SnapshotSource>, clock: Box<dyn Clock>, max_age: Duration) -> Self {
        // ---
        Self {
            source,
            clock,
            max_age,
            last: None,
        }
    }

    /// Return the cached snapshot if still valid, otherwise fetch.
    pub async fn get_or_fetch(&mut self) -> Result<RawSnapshot, FetchError> {
        // ---
        let now = self.clock.now();
        if let Some((fetched_at, snapshot)) = &self.last {
            if now.duration_since(*fetched_at) <= self.max_age {
                debug!("serving snapshot from cache ({} records)", snapshot.len());
                return Ok(snapshot.clone());
            }
        }

        let snapshot = self.source.fetch().await?;
        debug!("fetched fresh snapshot ({} records)", snapshot.len());
        self.last = Some((now, snapshot.clone()));
        Ok(snapshot)
    }

    /// Drop the cached entry so the next `get_or_fetch` hits the store.
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        snapshot: RawSnapshot,
    }

    #[async_trait]
    impl SnapshotSource for CountingSource {
        async fn fetch(&self) -> Result<RawSnapshot, FetchError> {
            // ---
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.snapshot.clone())
        }
    }

    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    fn one_record_snapshot() -> RawSnapshot {
        // ---
        let mut raw = RawSnapshot::new();
        raw.insert(
            "-k1".into(),
            [("pm25".to_string(), serde_json::json!(42.0))]
                .into_iter()
                .collect(),
        );
        raw
    }

    #[test]
    fn cache_serves_within_window_and_refetches_after() {
        // ---
        let calls = Arc::new(AtomicUsize::new(0));
        let clock = Arc::new(ManualClock {
            now: Mutex::new(Instant::now()),
        });

        struct SharedClock(Arc<ManualClock>);
        impl Clock for SharedClock {
            fn now(&self) -> Instant {
                self.0.now()
            }
        }

        let mut cache = CachedFetcher::new(
            Box::new(CountingSource {
                calls: calls.clone(),
                snapshot: one_record_snapshot(),
            }),
            Box::new(SharedClock(clock.clone())),
            Duration::from_secs(6),
        );

        tokio_test::block_on(async {
            // First call fetches, second inside the window is served from cache.
            let first = cache.get_or_fetch().await.unwrap();
            assert_eq!(first.len(), 1);
            cache.get_or_fetch().await.unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            // Past the window the cache refetches.
            clock.advance(Duration::from_secs(7));
            cache.get_or_fetch().await.unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 2);

            // Explicit invalidation forces a fetch even inside the window.
            cache.invalidate();
            cache.get_or_fetch().await.unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        });
    }

    #[test]
    fn decode_null_body_is_empty_snapshot() {
        // ---
        assert!(decode_snapshot(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn decode_keyed_collection() {
        // ---
        let body = serde_json::json!({
            "-k1": {"temp": 25, "pm25": 50},
            "-k2": {"temp": 26, "pm25": 85},
        });
        let snapshot = decode_snapshot(body).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains_key("-k1"));
        assert_eq!(snapshot["-k2"]["pm25"], serde_json::json!(85));
    }

    #[test]
    fn decode_non_object_record_becomes_empty_field_map() {
        // ---
        let body = serde_json::json!({"-k1": "garbage"});
        let snapshot = decode_snapshot(body).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot["-k1"].is_empty());
    }

    #[test]
    fn decode_scalar_body_is_a_payload_error() {
        // ---
        let err = decode_snapshot(serde_json::json!(17)).unwrap_err();
        assert!(matches!(err, FetchError::Payload(_)));
    }
}
