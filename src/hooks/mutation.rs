use std::fmt;
use std::sync::{Arc, Mutex};

use eden_query_wire::Method;
use serde_json::Value;

use crate::client::RouteBuilder;
use crate::context::EdenContext;
use crate::domain::{EdenError, RequestOptions};
use crate::util::lock::mutex_lock;

use super::options::{Meta, MutationSuccess, QueryRequestOptions};

const SOURCE: &str = "hooks::mutation";

pub type OnSuccess = Arc<dyn Fn(&Value, Option<&Value>) + Send + Sync>;
pub type OnError = Arc<dyn Fn(&EdenError, Option<&Value>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationState {
    pub status: MutationStatus,
    pub data: Option<Value>,
    pub error: Option<EdenError>,
    /// Input of the latest mutation.
    pub variables: Option<Value>,
}

impl Default for MutationState {
    fn default() -> Self {
        Self {
            status: MutationStatus::Idle,
            data: None,
            error: None,
            variables: None,
        }
    }
}

#[derive(Clone)]
pub struct MutationOptions {
    pub method: Method,
    pub on_success: Option<OnSuccess>,
    pub on_error: Option<OnError>,
    pub meta: Meta,
    pub request: QueryRequestOptions,
}

impl Default for MutationOptions {
    fn default() -> Self {
        Self {
            method: Method::Post,
            on_success: None,
            on_error: None,
            meta: Meta::new(),
            request: QueryRequestOptions::default(),
        }
    }
}

impl MutationOptions {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn on_success(
        mut self,
        callback: impl Fn(&Value, Option<&Value>) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error(
        mut self,
        callback: impl Fn(&EdenError, Option<&Value>) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn request(mut self, request: QueryRequestOptions) -> Self {
        self.request = request;
        self
    }
}

impl fmt::Debug for MutationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationOptions")
            .field("method", &self.method)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("meta", &self.meta)
            .field("request", &self.request)
            .finish()
    }
}

pub struct MutationObserver {
    context: EdenContext,
    route: RouteBuilder,
    options: MutationOptions,
    state: Mutex<MutationState>,
}

impl MutationObserver {
    pub fn new(context: &EdenContext, route: RouteBuilder, options: MutationOptions) -> Self {
        Self {
            context: context.clone(),
            route,
            options,
            state: Mutex::new(MutationState::default()),
        }
    }

    pub fn state(&self) -> MutationState {
        mutex_lock(&self.state, SOURCE, "state").clone()
    }

    pub fn reset(&self) {
        *mutex_lock(&self.state, SOURCE, "reset") = MutationState::default();
    }

    /// Submit the mutation and run the success or error callback.
    pub async fn mutate(&self, input: Option<Value>) -> Result<Value, EdenError> {
        {
            let mut state = mutex_lock(&self.state, SOURCE, "mutate");
            state.status = MutationStatus::Pending;
            state.variables = input.clone();
        }

        let request = RequestOptions {
            signal: None,
            headers: self.options.request.headers.clone(),
        };
        let result = self
            .route
            .call(self.options.method, input.clone(), request)
            .await;

        {
            let mut state = mutex_lock(&self.state, SOURCE, "settle");
            match &result {
                Ok(data) => {
                    state.status = MutationStatus::Success;
                    state.data = Some(data.clone());
                    state.error = None;
                }
                Err(err) => {
                    state.status = MutationStatus::Error;
                    state.error = Some(err.clone());
                }
            }
        }

        match &result {
            Ok(data) => self.notify_success(data, input.as_ref()),
            Err(err) => {
                if let Some(on_error) = &self.options.on_error {
                    on_error(err, input.as_ref());
                }
            }
        }
        result
    }

    fn notify_success(&self, data: &Value, variables: Option<&Value>) {
        let original = || {
            if let Some(on_success) = &self.options.on_success {
                on_success(data, variables);
            }
        };
        let overrides = self
            .options
            .request
            .overrides
            .as_ref()
            .unwrap_or(&self.context.config().overrides);

        match &overrides.mutation.on_success {
            Some(on_success) => on_success(&MutationSuccess::new(
                data,
                variables,
                &self.options.meta,
                self.context.query_client(),
                &original,
            )),
            None => original(),
        }
    }
}
