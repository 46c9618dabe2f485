//! Read-through cache gateway over an optional key-value backend.
//!
//! Caching is a pure optimization here, never a correctness dependency: a
//! missing backend, a backend error, or an undecodable entry all degrade to
//! calling the producer directly. Writes happen off the request path.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

pub const METRIC_CACHE_HIT_TOTAL: &str = "marea_cache_hit_total";
pub const METRIC_CACHE_MISS_TOTAL: &str = "marea_cache_miss_total";
pub const METRIC_CACHE_DEGRADED_TOTAL: &str = "marea_cache_degraded_total";

/// Per-query-class TTLs, seconds. Assigned by class, never per entry.
pub const TRENDING_TTL_SECONDS: u64 = 300;
pub const CHANNEL_TTL_SECONDS: u64 = 600;
pub const SEARCH_TTL_SECONDS: u64 = 900;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Minimal key-value surface the gateway needs: point get, TTL'd set,
/// cursor-scan delete, and a liveness ping.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError>;
    async fn scan_delete(&self, pattern: &str) -> Result<u64, CacheError>;
    async fn ping(&self) -> Result<(), CacheError>;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    data: &'a T,
    cached_at: i64,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
    cached_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub reachable: bool,
}

/// The read-through primitive shared by every cached read path. `None`
/// backend means caching is disabled, a valid configuration.
#[derive(Clone)]
pub struct CacheGateway {
    backend: Option<Arc<dyn CacheBackend>>,
    key_prefix: String,
}

impl CacheGateway {
    pub fn new(backend: Option<Arc<dyn CacheBackend>>, key_prefix: impl Into<String>) -> Self {
        Self {
            backend,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, "marea")
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    /// Serves `key` from cache when possible, otherwise from `producer`,
    /// returning the produced value immediately and persisting it on a
    /// detached task. Backend failures never surface to the caller.
    pub async fn read_through<T, E, F, Fut>(
        &self,
        key: &str,
        ttl_seconds: u64,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(backend) = &self.backend else {
            return producer().await;
        };
        let full_key = self.namespaced(key);

        match backend.get(&full_key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Envelope<T>>(&raw) {
                Ok(envelope) => {
                    counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                    let age = OffsetDateTime::now_utc().unix_timestamp() - envelope.cached_at;
                    debug!(target: "marea::cache", key = %full_key, age_seconds = age, "cache hit");
                    return Ok(envelope.data);
                }
                Err(error) => {
                    warn!(
                        target: "marea::cache",
                        key = %full_key,
                        %error,
                        "dropping undecodable cache entry"
                    );
                    counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
                }
            },
            Ok(None) => {
                counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
                debug!(target: "marea::cache", key = %full_key, "cache miss");
            }
            Err(error) => {
                counter!(METRIC_CACHE_DEGRADED_TOTAL).increment(1);
                warn!(
                    target: "marea::cache",
                    key = %full_key,
                    %error,
                    "cache read failed; serving from producer"
                );
            }
        }

        let value = producer().await?;
        self.store_detached(full_key, ttl_seconds, &value);
        Ok(value)
    }

    /// Deletes every key matching `pattern` (namespaced), returning how
    /// many were removed. Disabled caching removes nothing.
    pub async fn invalidate(&self, pattern: &str) -> Result<u64, CacheError> {
        let Some(backend) = &self.backend else {
            return Ok(0);
        };
        let full_pattern = self.namespaced(pattern);
        let removed = backend.scan_delete(&full_pattern).await?;
        debug!(target: "marea::cache", pattern = %full_pattern, removed, "cache invalidation");
        Ok(removed)
    }

    pub async fn stats(&self) -> CacheStats {
        let Some(backend) = &self.backend else {
            return CacheStats {
                enabled: false,
                reachable: false,
            };
        };
        let reachable = backend.ping().await.is_ok();
        CacheStats {
            enabled: true,
            reachable,
        }
    }

    fn store_detached<T: Serialize>(&self, key: String, ttl_seconds: u64, value: &T) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        let envelope = EnvelopeRef {
            data: value,
            cached_at: OffsetDateTime::now_utc().unix_timestamp(),
        };
        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(target: "marea::cache", key = %key, %error, "failed to encode cache entry");
                return;
            }
        };
        tokio::spawn(async move {
            if let Err(error) = backend.set_ex(&key, &payload, ttl_seconds).await {
                warn!(target: "marea::cache", key = %key, %error, "cache write failed");
            }
        });
    }
}

/// Deterministic cache key builders. Keys are colon-joined segments in a
/// fixed order; absent optional parameters are omitted, never left as
/// empty segments. Free-text segments are URL-encoded so user input cannot
/// inject separators. The gateway prepends the configured namespace.
pub mod keys {
    use crate::domain::types::{ContentType, Period, SortField, SortOrder};

    pub fn trending(
        content_type: ContentType,
        region_code: &str,
        category_id: Option<&str>,
        page_token: Option<&str>,
    ) -> String {
        let mut key = format!("trending:{}:{region_code}", content_type.as_str());
        if let Some(category) = category_id {
            key.push(':');
            key.push_str(category);
        }
        if let Some(page) = page_token {
            key.push(':');
            key.push_str(page);
        }
        key
    }

    pub fn channel(channel_id: &str) -> String {
        format!("channel:{channel_id}")
    }

    pub fn video(video_id: &str) -> String {
        format!("video:{video_id}")
    }

    pub fn channel_search(query: &str) -> String {
        format!("search:channels:{}", urlencoding::encode(query))
    }

    pub fn home_rankings(content_type: ContentType, period: Period, region_code: &str) -> String {
        format!(
            "home:rankings:{}:{}:{region_code}",
            content_type.as_str(),
            period.as_str()
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn chart(
        region_code: &str,
        content_type: ContentType,
        category_id: Option<&str>,
        period: Period,
        anchor: Option<&str>,
        sort: SortField,
        order: SortOrder,
        hidden_gems_only: bool,
        threshold: f64,
    ) -> String {
        let mut key = format!(
            "charts:{region_code}:{}:{}:{}",
            content_type.as_str(),
            category_id.unwrap_or("all"),
            period.as_str()
        );
        if let Some(anchor) = anchor {
            key.push(':');
            key.push_str(anchor);
        }
        key.push_str(&format!(":{}:{}", sort.as_str(), order.as_str()));
        if hidden_gems_only {
            key.push_str(&format!(":gems:{threshold}"));
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::keys;
    use crate::domain::types::{ContentType, Period, SortField, SortOrder};

    #[test]
    fn trending_keys_omit_absent_segments() {
        assert_eq!(
            keys::trending(ContentType::Short, "US", None, None),
            "trending:short:US"
        );
        assert_eq!(
            keys::trending(ContentType::Short, "US", Some("10"), Some("tok")),
            "trending:short:US:10:tok"
        );
    }

    #[test]
    fn identical_queries_build_identical_keys() {
        let a = keys::chart(
            "GLOBAL",
            ContentType::Short,
            None,
            Period::All,
            None,
            SortField::Rank,
            SortOrder::Asc,
            false,
            2.0,
        );
        let b = keys::chart(
            "GLOBAL",
            ContentType::Short,
            None,
            Period::All,
            None,
            SortField::Rank,
            SortOrder::Asc,
            false,
            2.0,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn chart_keys_distinguish_gem_filtering() {
        let plain = keys::chart(
            "KR",
            ContentType::Long,
            Some("10"),
            Period::Monthly,
            Some("2024-01-01"),
            SortField::Views,
            SortOrder::Desc,
            false,
            2.0,
        );
        let gems = keys::chart(
            "KR",
            ContentType::Long,
            Some("10"),
            Period::Monthly,
            Some("2024-01-01"),
            SortField::Views,
            SortOrder::Desc,
            true,
            2.5,
        );
        assert_ne!(plain, gems);
        assert!(gems.ends_with(":gems:2.5"));
    }

    #[test]
    fn search_keys_encode_free_text() {
        let key = keys::channel_search("lofi beats: 24/7");
        assert_eq!(key, "search:channels:lofi%20beats%3A%2024%2F7");
    }
}
