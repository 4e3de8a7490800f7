//! Explicit context shared by observers, plus utilities for code that runs
//! outside any observer (preloading, background refresh).

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::cache::{FetchQueryOptions, QueryClient, QueryFilter, QueryKey};
use crate::client::{EdenClient, RouteBuilder};
use crate::domain::EdenError;
use crate::hooks::{
    EdenQueryConfig, FetchInfiniteOptions, InfiniteData, QueryRequestOptions, fetch_pages,
};

/// The query cache and the client a set of observers works against.
#[derive(Clone)]
pub struct EdenContext {
    query_client: Arc<QueryClient>,
    client: EdenClient,
    config: EdenQueryConfig,
}

impl EdenContext {
    pub fn new(query_client: Arc<QueryClient>, client: EdenClient) -> Self {
        Self {
            query_client,
            client,
            config: EdenQueryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EdenQueryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn query_client(&self) -> &Arc<QueryClient> {
        &self.query_client
    }

    pub fn client(&self) -> &EdenClient {
        &self.client
    }

    pub fn config(&self) -> &EdenQueryConfig {
        &self.config
    }

    pub fn utils(&self) -> EdenUtils {
        EdenUtils::new(self.clone())
    }
}

/// Cache-aware helpers over an [`EdenContext`].
#[derive(Clone)]
pub struct EdenUtils {
    context: EdenContext,
}

impl EdenUtils {
    pub fn new(context: EdenContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &EdenContext {
        &self.context
    }

    /// Serve from cache when fresh, otherwise query the route and cache the
    /// result.
    pub async fn fetch(
        &self,
        route: &RouteBuilder,
        input: Option<Value>,
        options: &QueryRequestOptions,
    ) -> Result<Value, EdenError> {
        let key = route.query_key(input.as_ref());
        let config = &self.context.config;
        self.context
            .query_client
            .fetch_query(key, FetchQueryOptions::default(), |signal| {
                route.query(input, options.request_options(config, signal))
            })
            .await
    }

    /// Like [`EdenUtils::fetch`], but failures are logged and dropped.
    pub async fn prefetch(
        &self,
        route: &RouteBuilder,
        input: Option<Value>,
        options: &QueryRequestOptions,
    ) {
        if let Err(err) = self.fetch(route, input, options).await {
            debug!(path = %route.path().join("/"), error = %err, "Prefetch failed");
        }
    }

    /// Cached data regardless of freshness, fetching only on a miss.
    pub async fn ensure_data(
        &self,
        route: &RouteBuilder,
        input: Option<Value>,
        options: &QueryRequestOptions,
    ) -> Result<Value, EdenError> {
        let key = route.query_key(input.as_ref());
        match self.context.query_client.get_query_value(&key) {
            Some(data) => Ok(data),
            None => self.fetch(route, input, options).await,
        }
    }

    /// Fetch the first `options.pages` pages of an infinite query.
    pub async fn fetch_infinite(
        &self,
        route: &RouteBuilder,
        input: Option<Value>,
        options: &FetchInfiniteOptions,
    ) -> Result<InfiniteData, EdenError> {
        let key = route.infinite_query_key(input.as_ref());
        let config = &self.context.config;
        let value = self
            .context
            .query_client
            .fetch_query(key, FetchQueryOptions::default(), |signal| async move {
                let request = options.request.request_options(config, signal);
                let data = fetch_pages(route, input.as_ref(), options, request).await?;
                Ok(serde_json::to_value(&data)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn prefetch_infinite(
        &self,
        route: &RouteBuilder,
        input: Option<Value>,
        options: &FetchInfiniteOptions,
    ) {
        if let Err(err) = self.fetch_infinite(route, input, options).await {
            debug!(path = %route.path().join("/"), error = %err, "Infinite prefetch failed");
        }
    }

    pub fn get_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<T>, EdenError> {
        self.context.query_client.get_query_data(key)
    }

    pub fn set_data<T: Serialize>(&self, key: QueryKey, data: &T) -> Result<(), EdenError> {
        self.context.query_client.set_query_data(key, data)
    }

    pub fn invalidate(&self, filter: &QueryFilter) -> usize {
        self.context.query_client.invalidate_queries(filter)
    }

    pub fn cancel(&self, filter: &QueryFilter) -> usize {
        self.context.query_client.cancel_queries(filter)
    }
}
