//! In-process query cache: the store plus fetch bookkeeping.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::domain::{AbortController, AbortSignal, EdenError};

use super::config::QueryCacheConfig;
use super::keys::{QueryFilter, QueryKey};
use super::store::{CacheEntry, QueryStore};

const METRIC_CACHE_HIT: &str = "eden_query_cache_hit_total";
const METRIC_CACHE_MISS: &str = "eden_query_cache_miss_total";

#[derive(Debug, Clone, Default)]
pub struct FetchQueryOptions {
    /// Overrides the configured stale time for this fetch.
    pub stale_time: Option<Duration>,
    /// Owner's lifetime signal. Firing it cancels the fetch in progress and
    /// refuses new ones; each fetch still gets its own controller, so
    /// [`QueryClient::cancel_queries`] only reaches fetches already running.
    pub parent: Option<AbortSignal>,
}

pub struct QueryClient {
    config: QueryCacheConfig,
    store: QueryStore,
    in_flight: DashMap<u64, (QueryKey, AbortController)>,
    next_fetch_id: AtomicU64,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(QueryCacheConfig::default())
    }
}

impl QueryClient {
    pub fn new(config: QueryCacheConfig) -> Self {
        let store = QueryStore::new(&config);
        Self {
            config,
            store,
            in_flight: DashMap::new(),
            next_fetch_id: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &QueryCacheConfig {
        &self.config
    }

    pub fn store(&self) -> &QueryStore {
        &self.store
    }

    pub fn get_query_value(&self, key: &QueryKey) -> Option<Value> {
        self.store.get(key).map(|entry| entry.data)
    }

    pub fn get_query_entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.store.get(key)
    }

    pub fn get_query_data<T: DeserializeOwned>(
        &self,
        key: &QueryKey,
    ) -> Result<Option<T>, EdenError> {
        self.get_query_value(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(EdenError::from)
    }

    pub fn set_query_value(&self, key: QueryKey, data: Value) {
        if let Some(evicted) = self.store.set(key, data) {
            debug!(key = %evicted, "Query evicted from cache");
        }
    }

    pub fn set_query_data<T: Serialize>(&self, key: QueryKey, data: &T) -> Result<(), EdenError> {
        let value = serde_json::to_value(data)?;
        self.set_query_value(key, value);
        Ok(())
    }

    /// True when `key` holds data that may be served without refetching.
    pub fn is_fresh(&self, key: &QueryKey, stale_time: Duration) -> bool {
        self.store
            .get(key)
            .is_some_and(|entry| entry.is_fresh(stale_time))
    }

    /// Serve `key` from cache when fresh, otherwise run `fetcher` and store
    /// its result. Errors leave any previous data in place.
    pub async fn fetch_query<F, Fut>(
        &self,
        key: QueryKey,
        options: FetchQueryOptions,
        fetcher: F,
    ) -> Result<Value, EdenError>
    where
        F: FnOnce(AbortSignal) -> Fut,
        Fut: Future<Output = Result<Value, EdenError>>,
    {
        let stale_time = options.stale_time.unwrap_or_else(|| self.config.stale_time());
        if let Some(entry) = self.store.get(&key).filter(|entry| entry.is_fresh(stale_time)) {
            counter!(METRIC_CACHE_HIT).increment(1);
            return Ok(entry.data);
        }
        counter!(METRIC_CACHE_MISS).increment(1);

        let result = self
            .run_tracked(key.clone(), options.parent.as_ref(), fetcher)
            .await;
        if let Ok(data) = &result {
            self.set_query_value(key, data.clone());
        }
        result
    }

    /// Run `fetcher` under a fresh controller registered for `key`, without
    /// touching the cache. Resolves [`EdenError::Cancelled`] when that
    /// controller or `parent` fires; `fetcher` is never started once
    /// `parent` has fired.
    pub async fn run_tracked<T, F, Fut>(
        &self,
        key: QueryKey,
        parent: Option<&AbortSignal>,
        fetcher: F,
    ) -> Result<T, EdenError>
    where
        F: FnOnce(AbortSignal) -> Fut,
        Fut: Future<Output = Result<T, EdenError>>,
    {
        if parent.is_some_and(AbortSignal::is_aborted) {
            return Err(EdenError::Cancelled);
        }

        let controller = AbortController::new();
        let signal = controller.signal();
        let _guard = self.track(key, controller.clone());
        let parent_aborted = async {
            match parent {
                Some(parent) => parent.aborted().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = signal.aborted() => Err(EdenError::Cancelled),
            () = parent_aborted => {
                controller.abort();
                Err(EdenError::Cancelled)
            }
            result = fetcher(signal.clone()) => result,
        }
    }

    /// Mark matching queries stale so the next fetch goes to the network.
    pub fn invalidate_queries(&self, filter: &QueryFilter) -> usize {
        let marked = self.store.invalidate(filter);
        debug!(marked, ?filter, "Queries invalidated");
        marked
    }

    pub fn remove_queries(&self, filter: &QueryFilter) -> usize {
        self.store.remove(filter)
    }

    /// Fire the abort signal of every in-flight fetch under `filter`.
    pub fn cancel_queries(&self, filter: &QueryFilter) -> usize {
        let mut cancelled = 0;
        for entry in &self.in_flight {
            let (key, controller) = entry.value();
            if filter.matches(key) && controller.abort() {
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            debug!(cancelled, ?filter, "In-flight queries cancelled");
        }
        cancelled
    }

    pub fn is_fetching(&self, filter: &QueryFilter) -> usize {
        self.in_flight
            .iter()
            .filter(|entry| filter.matches(&entry.value().0))
            .count()
    }

    fn track(&self, key: QueryKey, controller: AbortController) -> FetchGuard<'_> {
        let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        self.in_flight.insert(id, (key, controller));
        FetchGuard {
            id,
            in_flight: &self.in_flight,
        }
    }
}

struct FetchGuard<'a> {
    id: u64,
    in_flight: &'a DashMap<u64, (QueryKey, AbortController)>,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;

    fn counting_fetcher(
        calls: &Arc<AtomicUsize>,
        value: Value,
    ) -> impl FnOnce(AbortSignal) -> std::future::Ready<Result<Value, EdenError>> {
        let calls = Arc::clone(calls);
        move |_signal| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(value))
        }
    }

    #[tokio::test]
    async fn fresh_data_is_served_without_fetching() {
        let client = QueryClient::new(QueryCacheConfig {
            stale_time_ms: 60_000,
            ..Default::default()
        });
        let key = QueryKey::new(&["hello"], None);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = client
            .fetch_query(key.clone(), FetchQueryOptions::default(), counting_fetcher(&calls, json!("hi")))
            .await
            .expect("first fetch");
        let second = client
            .fetch_query(key.clone(), FetchQueryOptions::default(), counting_fetcher(&calls, json!("later")))
            .await
            .expect("second fetch");

        assert_eq!(first, json!("hi"));
        assert_eq!(second, json!("hi"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_refetch() {
        let client = QueryClient::new(QueryCacheConfig {
            stale_time_ms: 60_000,
            ..Default::default()
        });
        let key = QueryKey::new(&["hello"], None);
        let calls = Arc::new(AtomicUsize::new(0));

        client
            .fetch_query(key.clone(), FetchQueryOptions::default(), counting_fetcher(&calls, json!(1)))
            .await
            .expect("first fetch");
        assert_eq!(client.invalidate_queries(&QueryFilter::route(&["hello"])), 1);
        let refetched = client
            .fetch_query(key.clone(), FetchQueryOptions::default(), counting_fetcher(&calls, json!(2)))
            .await
            .expect("refetch");

        assert_eq!(refetched, json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.get_query_value(&key), Some(json!(2)));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_data() {
        let client = QueryClient::default();
        let key = QueryKey::new(&["hello"], None);
        client.set_query_value(key.clone(), json!("old"));

        let result = client
            .fetch_query(key.clone(), FetchQueryOptions::default(), |_signal| async {
                Err(EdenError::application(500, json!("boom")))
            })
            .await;

        assert!(matches!(result, Err(EdenError::Application { status: 500, .. })));
        assert_eq!(client.get_query_value(&key), Some(json!("old")));
    }

    #[tokio::test]
    async fn cancel_queries_aborts_in_flight_fetch() {
        let client = Arc::new(QueryClient::default());
        let key = QueryKey::new(&["slow"], None);

        let task = {
            let client = Arc::clone(&client);
            let key = key.clone();
            tokio::spawn(async move {
                client
                    .fetch_query(key, FetchQueryOptions::default(), |signal| async move {
                        signal.aborted().await;
                        Ok(json!("never stored"))
                    })
                    .await
            })
        };

        while client.is_fetching(&QueryFilter::all()) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(client.cancel_queries(&QueryFilter::route(&["slow"])), 1);

        let result = task.await.expect("task should not panic");
        assert_eq!(result, Err(EdenError::Cancelled));
        assert!(client.get_query_value(&key).is_none());
        assert_eq!(client.is_fetching(&QueryFilter::all()), 0);
    }

    #[tokio::test]
    async fn cancellation_does_not_outlive_the_cancelled_fetch() {
        let client = Arc::new(QueryClient::default());
        let key = QueryKey::new(&["slow"], None);

        let (first, cancelled) = tokio::join!(
            client.fetch_query(key.clone(), FetchQueryOptions::default(), |signal| async move {
                signal.aborted().await;
                Ok(json!("never stored"))
            }),
            async {
                tokio::task::yield_now().await;
                client.cancel_queries(&QueryFilter::all())
            }
        );
        assert_eq!(first, Err(EdenError::Cancelled));
        assert_eq!(cancelled, 1);

        let calls = Arc::new(AtomicUsize::new(0));
        let second = client
            .fetch_query(key.clone(), FetchQueryOptions::default(), counting_fetcher(&calls, json!("hi")))
            .await;
        assert_eq!(second, Ok(json!("hi")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fired_parent_refuses_new_fetches() {
        let client = QueryClient::default();
        let key = QueryKey::new(&["hello"], None);
        let parent = AbortController::new();
        parent.abort();
        let calls = Arc::new(AtomicUsize::new(0));

        let options = FetchQueryOptions {
            parent: Some(parent.signal()),
            ..Default::default()
        };
        let result = client
            .fetch_query(key, options, counting_fetcher(&calls, json!("hi")))
            .await;

        assert_eq!(result, Err(EdenError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn typed_data_roundtrip() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Greeting {
            text: String,
        }

        let client = QueryClient::default();
        let key = QueryKey::new(&["greet"], Some(&json!({ "name": "a" })));
        let greeting = Greeting {
            text: "hi a".to_string(),
        };
        client.set_query_data(key.clone(), &greeting).expect("store");
        assert_eq!(client.get_query_data::<Greeting>(&key).expect("decode"), Some(greeting));
        assert!(client.get_query_data::<u32>(&key).is_err());
    }
}
