use std::sync::Mutex;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::{FetchQueryOptions, QueryKey};
use crate::client::RouteBuilder;
use crate::context::EdenContext;
use crate::domain::{AbortController, EdenError};
use crate::util::lock::mutex_lock;

use super::options::QueryRequestOptions;

const SOURCE: &str = "hooks::query";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// No data yet.
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub status: QueryStatus,
    pub data: Option<Value>,
    pub error: Option<EdenError>,
    pub is_fetching: bool,
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// A disabled observer never fetches on mount; `refetch` still works.
    pub enabled: bool,
    pub stale_time: Option<Duration>,
    pub request: QueryRequestOptions,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_time: None,
            request: QueryRequestOptions::default(),
        }
    }
}

impl QueryOptions {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn request(mut self, request: QueryRequestOptions) -> Self {
        self.request = request;
        self
    }
}

/// One subscriber to a cached query.
///
/// Every fetch runs under its own controller, registered with the query
/// client and forwarded to the request only when abort-on-unmount is
/// enabled. With forwarding on, unmounting (or dropping) the observer cancels
/// the fetch in progress and refuses later ones.
pub struct QueryObserver {
    context: EdenContext,
    route: RouteBuilder,
    input: Option<Value>,
    key: QueryKey,
    options: QueryOptions,
    lifetime: AbortController,
    state: Mutex<QueryState>,
}

impl QueryObserver {
    pub fn new(
        context: &EdenContext,
        route: RouteBuilder,
        input: Option<Value>,
        options: QueryOptions,
    ) -> Self {
        let key = route.query_key(input.as_ref());
        let cached = context.query_client().get_query_value(&key);
        let state = QueryState {
            status: if cached.is_some() {
                QueryStatus::Success
            } else {
                QueryStatus::Pending
            },
            data: cached,
            error: None,
            is_fetching: false,
        };
        Self {
            context: context.clone(),
            route,
            input,
            key,
            options,
            lifetime: AbortController::new(),
            state: Mutex::new(state),
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    pub fn state(&self) -> QueryState {
        mutex_lock(&self.state, SOURCE, "state").clone()
    }

    pub fn data<T: DeserializeOwned>(&self) -> Result<Option<T>, EdenError> {
        self.state()
            .data
            .map(serde_json::from_value)
            .transpose()
            .map_err(EdenError::from)
    }

    /// Initial fetch, skipped when the observer is disabled.
    pub async fn mount(&self) -> Option<Result<Value, EdenError>> {
        if !self.options.enabled {
            return None;
        }
        Some(self.refetch().await)
    }

    /// Fetch through the query client, serving fresh cache hits.
    pub async fn refetch(&self) -> Result<Value, EdenError> {
        mutex_lock(&self.state, SOURCE, "refetch").is_fetching = true;

        let fetch_options = FetchQueryOptions {
            stale_time: self.options.stale_time,
            parent: Some(self.lifetime.signal()),
        };
        let input = self.input.clone();
        let result = self
            .context
            .query_client()
            .fetch_query(self.key.clone(), fetch_options, |signal| {
                let request = self
                    .options
                    .request
                    .request_options(self.context.config(), signal);
                self.route.query(input, request)
            })
            .await;

        let mut state = mutex_lock(&self.state, SOURCE, "settle");
        state.is_fetching = false;
        match &result {
            Ok(data) => {
                state.status = QueryStatus::Success;
                state.data = Some(data.clone());
                state.error = None;
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => {
                state.status = QueryStatus::Error;
                state.error = Some(err.clone());
            }
        }
        result
    }

    /// Ends the observer when abort-on-unmount is on. Returns whether this
    /// call did so.
    pub fn unmount(&self) -> bool {
        self.options
            .request
            .forwards_signal(self.context.config())
            && self.lifetime.abort()
    }
}

impl Drop for QueryObserver {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;
    use serde_json::json;

    use super::*;
    use crate::cache::{QueryCacheConfig, QueryClient, QueryFilter};
    use crate::client::EdenClient;
    use crate::domain::RequestDescriptor;
    use crate::hooks::EdenQueryConfig;
    use crate::link::{Link, PendingCall};

    /// Answers `hi`, or `boom` for the `fail` route. Calls on the `lazy`
    /// route yield once first; calls on the `slow` route park until their
    /// signal fires.
    #[derive(Default)]
    struct Greeter {
        calls: AtomicUsize,
        saw_signal: AtomicUsize,
    }

    impl Link for Greeter {
        fn dispatch(&self, descriptor: RequestDescriptor) -> PendingCall {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let signal = descriptor.options().signal.clone();
            if signal.is_some() {
                self.saw_signal.fetch_add(1, Ordering::SeqCst);
            }
            match descriptor.route().as_str() {
                "fail" => futures::future::ready(Err(EdenError::application(500, json!("boom"))))
                    .boxed(),
                "lazy" => async {
                    tokio::task::yield_now().await;
                    Ok(json!("hi"))
                }
                .boxed(),
                "slow" => async move {
                    match signal {
                        Some(signal) => signal.aborted().await,
                        None => futures::future::pending::<()>().await,
                    }
                    Err(EdenError::Cancelled)
                }
                .boxed(),
                _ => futures::future::ready(Ok(json!("hi"))).boxed(),
            }
        }
    }

    fn context(config: EdenQueryConfig, stale_time_ms: u64) -> (EdenContext, Arc<Greeter>) {
        let link = Arc::new(Greeter::default());
        let query_client = Arc::new(QueryClient::new(QueryCacheConfig {
            stale_time_ms,
            ..Default::default()
        }));
        let context =
            EdenContext::new(query_client, EdenClient::new(link.clone())).with_config(config);
        (context, link)
    }

    #[tokio::test]
    async fn mount_fetches_and_caches() {
        let (context, link) = context(EdenQueryConfig::default(), 60_000);
        let route = context.client().route("hello");
        let observer = QueryObserver::new(&context, route.clone(), None, QueryOptions::default());

        let data = observer.mount().await.expect("enabled").expect("fetch");
        assert_eq!(data, json!("hi"));
        assert_eq!(observer.state().status, QueryStatus::Success);
        assert_eq!(observer.data::<String>().expect("decode"), Some("hi".to_string()));

        let second = QueryObserver::new(&context, route, None, QueryOptions::default());
        assert_eq!(second.state().data, Some(json!("hi")));
        second.mount().await.expect("enabled").expect("cache hit");
        assert_eq!(link.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_observer_waits_for_refetch() {
        let (context, link) = context(EdenQueryConfig::default(), 0);
        let route = context.client().route("hello");
        let observer =
            QueryObserver::new(&context, route, None, QueryOptions::default().enabled(false));

        assert!(observer.mount().await.is_none());
        assert_eq!(link.calls.load(Ordering::SeqCst), 0);
        assert_eq!(observer.state().status, QueryStatus::Pending);

        observer.refetch().await.expect("manual refetch");
        assert_eq!(link.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_surfaces_as_error_state() {
        let (context, _) = context(EdenQueryConfig::default(), 0);
        let route = context.client().route("fail");
        let observer = QueryObserver::new(&context, route, None, QueryOptions::default());

        let result = observer.mount().await.expect("enabled");
        assert!(result.is_err());
        let state = observer.state();
        assert_eq!(state.status, QueryStatus::Error);
        assert_eq!(state.error, Some(EdenError::application(500, json!("boom"))));
        assert!(!state.is_fetching);
    }

    #[tokio::test]
    async fn unmount_aborts_forwarded_signal() {
        let config = EdenQueryConfig {
            abort_on_unmount: true,
            ..Default::default()
        };
        let (context, link) = context(config, 0);
        let route = context.client().route("slow");
        let observer = QueryObserver::new(&context, route, None, QueryOptions::default());

        let (result, aborted) = tokio::join!(observer.refetch(), async {
            tokio::task::yield_now().await;
            observer.unmount()
        });

        assert!(aborted);
        assert_eq!(result, Err(EdenError::Cancelled));
        assert_eq!(link.saw_signal.load(Ordering::SeqCst), 1);
        assert!(context.query_client().get_query_value(observer.key()).is_none());
    }

    #[tokio::test]
    async fn refetch_after_cancel_reaches_the_link_again() {
        let (context, link) = context(EdenQueryConfig::default(), 0);
        let observer =
            QueryObserver::new(&context, context.client().route("lazy"), None, QueryOptions::default());

        let (first, cancelled) = tokio::join!(observer.refetch(), async {
            context.query_client().cancel_queries(&QueryFilter::all())
        });
        assert_eq!(first, Err(EdenError::Cancelled));
        assert_eq!(cancelled, 1);
        assert_eq!(observer.state().status, QueryStatus::Pending);

        assert_eq!(observer.refetch().await, Ok(json!("hi")));
        assert_eq!(observer.refetch().await, Ok(json!("hi")));
        assert_eq!(link.calls.load(Ordering::SeqCst), 3);
        assert_eq!(observer.state().status, QueryStatus::Success);
    }

    #[tokio::test]
    async fn unmounted_observer_stops_fetching() {
        let config = EdenQueryConfig {
            abort_on_unmount: true,
            ..Default::default()
        };
        let (context, link) = context(config, 0);
        let observer =
            QueryObserver::new(&context, context.client().route("hello"), None, QueryOptions::default());

        assert!(observer.unmount());
        assert_eq!(observer.refetch().await, Err(EdenError::Cancelled));
        assert_eq!(link.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn opting_out_keeps_signal_off_the_request() {
        let config = EdenQueryConfig {
            abort_on_unmount: true,
            ..Default::default()
        };
        let (context, link) = context(config, 0);
        let route = context.client().route("hello");
        let observer = QueryObserver::new(
            &context,
            route,
            None,
            QueryOptions::default().request(QueryRequestOptions::default().abort_on_unmount(false)),
        );

        observer.refetch().await.expect("fetch");
        assert_eq!(link.saw_signal.load(Ordering::SeqCst), 0);
        assert!(!observer.unmount());
    }
}
