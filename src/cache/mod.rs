//! Query cache.
//!
//! - **Keys**: canonical `(path, input, kind)` identifiers with prefix
//!   filtering for route-wide invalidation.
//! - **Store**: LRU-bounded results with staleness tracking.
//! - **Client**: fetch-or-serve, invalidation, removal and cancellation of
//!   in-flight fetches.
//!
//! ## Configuration
//!
//! ```toml
//! [query]
//! cache_limit = 500
//! stale_time_ms = 0
//! ```

mod client;
mod config;
mod keys;
mod store;

pub use client::{FetchQueryOptions, QueryClient};
pub use config::QueryCacheConfig;
pub use keys::{KeyInput, QueryFilter, QueryKey, QueryKind};
pub use store::{CacheEntry, QueryStore};
