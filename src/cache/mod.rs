//! Response cache for the query API.
//!
//! Entries live until the next daily refresh boundary (`CACHE_REFRESH_TIME`,
//! UTC), which is when new trading results are published. Backend failures
//! never fail a request: they are logged and the response is computed uncached.

pub mod memory;
pub mod redis_cache;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::SpimexError;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

const SECONDS_PER_DAY: i64 = 86_400;

/// Minimal string key/value store with per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SpimexError>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), SpimexError>;
}

/// Seconds from `now` until the next `at` wall-clock instant (UTC).
///
/// Always in `1..=86400`; exactly on the boundary the next one is a day away.
pub fn seconds_until_refresh(now: DateTime<Utc>, at: NaiveTime) -> u64 {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now { today } else { today + Duration::days(1) };

    let delta = next - now;
    let secs = delta.num_seconds() + i64::from(delta.subsec_nanos() > 0);
    secs.clamp(1, SECONDS_PER_DAY) as u64
}

#[derive(Clone)]
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
    refresh_time: NaiveTime,
}

impl ResponseCache {
    pub fn new(backend: Arc<dyn CacheBackend>, prefix: impl Into<String>, refresh_time: NaiveTime) -> Self {
        Self { backend, prefix: prefix.into(), refresh_time }
    }

    /// Key for an endpoint and its already-validated parameters.
    pub fn key<P: Serialize>(&self, endpoint: &str, params: &P) -> Result<String, SpimexError> {
        let params = serde_json::to_string(params)?;
        Ok(format!("{}:{endpoint}:{params}", self.prefix))
    }

    /// Return the cached body under `key`, or compute, store and return it.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        now: DateTime<Utc>,
        compute: F,
    ) -> Result<String, SpimexError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, SpimexError>>,
    {
        match self.backend.get(key).await {
            Ok(Some(body)) => {
                debug!(key, "Cache hit");
                return Ok(body);
            }
            Ok(None) => debug!(key, "Cache miss"),
            Err(e) => warn!(key, error = %e, "Cache read failed, serving uncached"),
        }

        let body = compute().await?;

        let ttl_secs = seconds_until_refresh(now, self.refresh_time);
        match self.backend.set_ex(key, &body, ttl_secs).await {
            Ok(()) => debug!(key, ttl_secs, "Response cached"),
            Err(e) => warn!(key, error = %e, "Cache write failed"),
        }
        Ok(body)
    }
}
