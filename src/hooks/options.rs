//! Options shared by the query and mutation observers.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::cache::QueryClient;
use crate::domain::{AbortSignal, RequestOptions};

/// Free-form metadata attached to a mutation at the call site.
pub type Meta = Map<String, Value>;

/// Per-query request options.
///
/// Queries never take a caller-supplied abort signal: the observer owns the
/// signal, and `abort_on_unmount` decides whether it is forwarded to the
/// request.
#[derive(Debug, Clone, Default)]
pub struct QueryRequestOptions {
    /// Forward the observer's signal to the request. Falls back to
    /// [`EdenQueryConfig::abort_on_unmount`] when unset.
    pub abort_on_unmount: Option<bool>,
    pub headers: Vec<(String, String)>,
    pub overrides: Option<EdenQueryOverrides>,
}

impl QueryRequestOptions {
    pub fn abort_on_unmount(mut self, enabled: bool) -> Self {
        self.abort_on_unmount = Some(enabled);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Build link options, attaching `signal` only when forwarding is on.
    pub(crate) fn request_options(
        &self,
        config: &EdenQueryConfig,
        signal: AbortSignal,
    ) -> RequestOptions {
        let mut options = RequestOptions {
            signal: None,
            headers: self.headers.clone(),
        };
        if self.forwards_signal(config) {
            options.signal = Some(signal);
        }
        options
    }

    pub(crate) fn forwards_signal(&self, config: &EdenQueryConfig) -> bool {
        self.abort_on_unmount.unwrap_or(config.abort_on_unmount)
    }
}

/// Crate-wide defaults for observers built from one context.
#[derive(Debug, Clone, Default)]
pub struct EdenQueryConfig {
    pub abort_on_unmount: bool,
    pub overrides: EdenQueryOverrides,
}

#[derive(Debug, Clone, Default)]
pub struct EdenQueryOverrides {
    pub mutation: MutationOverrides,
}

/// What an `on_success` override sees.
pub struct MutationSuccess<'a> {
    pub data: &'a Value,
    pub variables: Option<&'a Value>,
    pub meta: &'a Meta,
    pub query_client: &'a QueryClient,
    original: &'a (dyn Fn() + Send + Sync),
}

impl<'a> MutationSuccess<'a> {
    pub(crate) fn new(
        data: &'a Value,
        variables: Option<&'a Value>,
        meta: &'a Meta,
        query_client: &'a QueryClient,
        original: &'a (dyn Fn() + Send + Sync),
    ) -> Self {
        Self {
            data,
            variables,
            meta,
            query_client,
            original,
        }
    }

    /// Run the mutation's own `on_success` callback.
    pub fn call_original(&self) {
        (self.original)();
    }
}

pub type SuccessOverride = Arc<dyn Fn(&MutationSuccess<'_>) + Send + Sync>;

#[derive(Clone, Default)]
pub struct MutationOverrides {
    /// Replaces the mutation's `on_success`; the original is reachable via
    /// [`MutationSuccess::call_original`].
    pub on_success: Option<SuccessOverride>,
}

impl MutationOverrides {
    pub fn on_success(
        callback: impl Fn(&MutationSuccess<'_>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_success: Some(Arc::new(callback)),
        }
    }
}

impl fmt::Debug for MutationOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationOverrides")
            .field("on_success", &self.on_success.is_some())
            .finish()
    }
}
