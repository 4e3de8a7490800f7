//! Cursor-paginated queries.
//!
//! Every page is fetched with the base input plus `cursor` and `direction`.
//! Pages accumulate under one infinite [`QueryKey`] because those two fields
//! are stripped from the key.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::{FetchQueryOptions, QueryKey};
use crate::client::RouteBuilder;
use crate::context::EdenContext;
use crate::domain::{AbortController, EdenError, RequestOptions};
use crate::util::lock::mutex_lock;

use super::options::QueryRequestOptions;
use super::query::QueryStatus;

const SOURCE: &str = "hooks::infinite";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

/// Accumulated pages and the cursor each was fetched with (`null` for a
/// page fetched without one).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfiniteData {
    pub pages: Vec<Value>,
    pub page_params: Vec<Value>,
}

/// Derives the next (or previous) cursor from the edge page and all pages.
/// `None` means there is nothing more in that direction.
pub type PageParamFn = Arc<dyn Fn(&Value, &[Value]) -> Option<Value> + Send + Sync>;

/// Base input with the continuation merged in.
pub fn page_input(
    base: Option<&Value>,
    cursor: Option<&Value>,
    direction: Direction,
) -> Result<Value, EdenError> {
    let mut input = match base {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(fields)) => fields.clone(),
        Some(other) => {
            return Err(EdenError::serialization(format!(
                "infinite query input must be an object, got {other}"
            )));
        }
    };
    match cursor.filter(|cursor| !cursor.is_null()) {
        Some(cursor) => {
            input.insert("cursor".to_string(), cursor.clone());
        }
        None => {
            input.remove("cursor");
        }
    }
    input.insert("direction".to_string(), serde_json::to_value(direction)?);
    Ok(Value::Object(input))
}

async fn fetch_page(
    route: &RouteBuilder,
    base: Option<&Value>,
    cursor: Option<&Value>,
    direction: Direction,
    request: RequestOptions,
) -> Result<Value, EdenError> {
    let input = page_input(base, cursor, direction)?;
    route.query(Some(input), request).await
}

/// Options for fetching an infinite query outside an observer.
#[derive(Clone)]
pub struct FetchInfiniteOptions {
    pub initial_cursor: Option<Value>,
    /// How many pages to fetch, stopping early when the cursor runs out.
    pub pages: usize,
    pub get_next_page_param: PageParamFn,
    pub request: QueryRequestOptions,
}

impl FetchInfiniteOptions {
    pub fn new(
        get_next_page_param: impl Fn(&Value, &[Value]) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            initial_cursor: None,
            pages: 1,
            get_next_page_param: Arc::new(get_next_page_param),
            request: QueryRequestOptions::default(),
        }
    }

    pub fn initial_cursor(mut self, cursor: Value) -> Self {
        self.initial_cursor = Some(cursor);
        self
    }

    pub fn pages(mut self, pages: usize) -> Self {
        self.pages = pages;
        self
    }

    pub fn request(mut self, request: QueryRequestOptions) -> Self {
        self.request = request;
        self
    }
}

impl fmt::Debug for FetchInfiniteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchInfiniteOptions")
            .field("initial_cursor", &self.initial_cursor)
            .field("pages", &self.pages)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Fetch forward from `options.initial_cursor` until `options.pages` pages
/// are loaded or the next cursor is `None`.
pub(crate) async fn fetch_pages(
    route: &RouteBuilder,
    base: Option<&Value>,
    options: &FetchInfiniteOptions,
    request: RequestOptions,
) -> Result<InfiniteData, EdenError> {
    let mut data = InfiniteData::default();
    let mut cursor = options.initial_cursor.clone();
    for index in 0..options.pages.max(1) {
        if index > 0 {
            cursor = data
                .pages
                .last()
                .and_then(|last| (options.get_next_page_param)(last, &data.pages));
            if cursor.is_none() {
                break;
            }
        }
        let page = fetch_page(route, base, cursor.as_ref(), Direction::Forward, request.clone())
            .await?;
        data.page_params.push(cursor.clone().unwrap_or(Value::Null));
        data.pages.push(page);
    }
    Ok(data)
}

#[derive(Clone)]
pub struct InfiniteQueryOptions {
    pub enabled: bool,
    pub initial_cursor: Option<Value>,
    pub get_next_page_param: PageParamFn,
    pub get_previous_page_param: Option<PageParamFn>,
    pub request: QueryRequestOptions,
}

impl InfiniteQueryOptions {
    pub fn new(
        get_next_page_param: impl Fn(&Value, &[Value]) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            enabled: true,
            initial_cursor: None,
            get_next_page_param: Arc::new(get_next_page_param),
            get_previous_page_param: None,
            request: QueryRequestOptions::default(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn initial_cursor(mut self, cursor: Value) -> Self {
        self.initial_cursor = Some(cursor);
        self
    }

    pub fn previous_page_param(
        mut self,
        get_previous_page_param: impl Fn(&Value, &[Value]) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.get_previous_page_param = Some(Arc::new(get_previous_page_param));
        self
    }

    pub fn request(mut self, request: QueryRequestOptions) -> Self {
        self.request = request;
        self
    }
}

/// Observer over an infinite query. Pages live in the query cache, so
/// observers of the same route and base input share them.
///
/// Page fetches run under their own controllers, so a cancelled fetch never
/// affects the next one. With abort-on-unmount on, unmounting cancels the
/// fetch in progress and refuses later ones.
pub struct InfiniteQueryObserver {
    context: EdenContext,
    route: RouteBuilder,
    input: Option<Value>,
    key: QueryKey,
    options: InfiniteQueryOptions,
    lifetime: AbortController,
    status: Mutex<(QueryStatus, Option<EdenError>)>,
}

impl InfiniteQueryObserver {
    pub fn new(
        context: &EdenContext,
        route: RouteBuilder,
        input: Option<Value>,
        options: InfiniteQueryOptions,
    ) -> Self {
        let key = route.infinite_query_key(input.as_ref());
        let status = if context.query_client().get_query_value(&key).is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Pending
        };
        Self {
            context: context.clone(),
            route,
            input,
            key,
            options,
            lifetime: AbortController::new(),
            status: Mutex::new((status, None)),
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn status(&self) -> QueryStatus {
        mutex_lock(&self.status, SOURCE, "status").0
    }

    pub fn error(&self) -> Option<EdenError> {
        mutex_lock(&self.status, SOURCE, "error").1.clone()
    }

    pub fn data(&self) -> Result<Option<InfiniteData>, EdenError> {
        self.context.query_client().get_query_data(&self.key)
    }

    /// Initial fetch, skipped when the observer is disabled.
    pub async fn mount(&self) -> Option<Result<InfiniteData, EdenError>> {
        if !self.options.enabled {
            return None;
        }
        Some(self.fetch().await)
    }

    /// Load the query, served from cache when fresh. A stale entry is
    /// refetched page by page with its recorded page params, so the number
    /// of loaded pages is kept; otherwise only the first page is loaded.
    pub async fn fetch(&self) -> Result<InfiniteData, EdenError> {
        let fetch_options = FetchQueryOptions {
            parent: Some(self.lifetime.signal()),
            ..Default::default()
        };
        let result = self
            .context
            .query_client()
            .fetch_query(self.key.clone(), fetch_options, |signal| async move {
                let request = self
                    .options
                    .request
                    .request_options(self.context.config(), signal);
                let params = match self.data()? {
                    Some(cached) if !cached.page_params.is_empty() => cached.page_params,
                    _ => vec![self.options.initial_cursor.clone().unwrap_or(Value::Null)],
                };

                let mut data = InfiniteData::default();
                for param in params {
                    let page = fetch_page(
                        &self.route,
                        self.input.as_ref(),
                        Some(&param),
                        Direction::Forward,
                        request.clone(),
                    )
                    .await?;
                    data.pages.push(page);
                    data.page_params.push(param);
                }
                Ok(serde_json::to_value(&data)?)
            })
            .await
            .and_then(|value| serde_json::from_value(value).map_err(EdenError::from));
        self.settle(result)
    }

    pub fn has_next_page(&self) -> bool {
        self.next_cursor(Direction::Forward).is_some()
    }

    pub fn has_previous_page(&self) -> bool {
        self.next_cursor(Direction::Backward).is_some()
    }

    /// Append the next page. Returns `false` without any request when the
    /// next cursor is `None`.
    pub async fn fetch_next_page(&self) -> Result<bool, EdenError> {
        self.fetch_adjacent(Direction::Forward).await
    }

    /// Prepend the previous page. Returns `false` without any request when
    /// there is no previous cursor accessor or it yields `None`.
    pub async fn fetch_previous_page(&self) -> Result<bool, EdenError> {
        self.fetch_adjacent(Direction::Backward).await
    }

    /// Ends the observer when abort-on-unmount is on. Returns whether this
    /// call did so.
    pub fn unmount(&self) -> bool {
        self.options
            .request
            .forwards_signal(self.context.config())
            && self.lifetime.abort()
    }

    async fn fetch_adjacent(&self, direction: Direction) -> Result<bool, EdenError> {
        let Some(data) = self.data()? else {
            self.fetch().await?;
            return Ok(true);
        };
        let Some(cursor) = self.cursor_for(&data, direction) else {
            return Ok(false);
        };

        let page = self
            .context
            .query_client()
            .run_tracked(
                self.key.clone(),
                Some(&self.lifetime.signal()),
                |signal| {
                    let request = self
                        .options
                        .request
                        .request_options(self.context.config(), signal);
                    fetch_page(&self.route, self.input.as_ref(), Some(&cursor), direction, request)
                },
            )
            .await;
        let page = self.settle(page)?;

        // An overlapping fetch may have moved the edge while this page was
        // in flight; its result wins.
        let Some(mut data) = self.data()? else {
            return Ok(false);
        };
        if self.cursor_for(&data, direction).as_ref() != Some(&cursor) {
            return Ok(false);
        }

        match direction {
            Direction::Forward => {
                data.pages.push(page);
                data.page_params.push(cursor);
            }
            Direction::Backward => {
                data.pages.insert(0, page);
                data.page_params.insert(0, cursor);
            }
        }
        self.context
            .query_client()
            .set_query_data(self.key.clone(), &data)?;
        Ok(true)
    }

    fn next_cursor(&self, direction: Direction) -> Option<Value> {
        let data = self.data().ok().flatten()?;
        self.cursor_for(&data, direction)
    }

    fn cursor_for(&self, data: &InfiniteData, direction: Direction) -> Option<Value> {
        match direction {
            Direction::Forward => {
                let last = data.pages.last()?;
                (self.options.get_next_page_param)(last, &data.pages)
            }
            Direction::Backward => {
                let accessor = self.options.get_previous_page_param.as_ref()?;
                let first = data.pages.first()?;
                accessor(first, &data.pages)
            }
        }
    }

    fn settle<T>(&self, result: Result<T, EdenError>) -> Result<T, EdenError> {
        let mut status = mutex_lock(&self.status, SOURCE, "settle");
        match &result {
            Ok(_) => *status = (QueryStatus::Success, None),
            Err(err) if err.is_cancelled() => {}
            Err(err) => *status = (QueryStatus::Error, Some(err.clone())),
        }
        result
    }
}

impl Drop for InfiniteQueryObserver {
    fn drop(&mut self) {
        self.unmount();
    }
}
