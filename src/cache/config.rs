//! Query cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CACHE_LIMIT: usize = 500;
const DEFAULT_STALE_TIME_MS: u64 = 0;

/// Sizing and freshness policy for [`QueryClient`](super::QueryClient).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryCacheConfig {
    /// Maximum cached query results before LRU eviction.
    pub cache_limit: usize,
    /// How long a result is served without refetching. Zero means every
    /// fetch goes to the network.
    pub stale_time_ms: u64,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            cache_limit: DEFAULT_CACHE_LIMIT,
            stale_time_ms: DEFAULT_STALE_TIME_MS,
        }
    }
}

impl From<&crate::config::QuerySettings> for QueryCacheConfig {
    fn from(settings: &crate::config::QuerySettings) -> Self {
        Self {
            cache_limit: settings.cache_limit.get(),
            stale_time_ms: u64::try_from(settings.stale_time.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl QueryCacheConfig {
    /// Returns the cache limit as NonZeroUsize, clamping to 1 if zero.
    pub fn cache_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.cache_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }
}
