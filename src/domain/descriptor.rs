//! Immutable record of a single RPC call awaiting dispatch.

use eden_query_wire::{BatchCall, Method};
use serde_json::Value;
use uuid::Uuid;

use super::error::EdenError;
use super::signal::AbortSignal;
use super::transformer::Transformer;

/// Per-call options that travel with a descriptor but never reach the wire
/// body.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Cancels this call locally when fired.
    pub signal: Option<AbortSignal>,
    /// Extra HTTP headers merged into the outbound batch request.
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_aborted(&self) -> bool {
        self.signal.as_ref().is_some_and(AbortSignal::is_aborted)
    }
}

#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    id: Uuid,
    path: Vec<String>,
    method: Method,
    input: Option<Value>,
    options: RequestOptions,
}

impl RequestDescriptor {
    pub fn new<I, S>(path: I, method: Method, input: Option<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::new_v4(),
            path: path.into_iter().map(Into::into).collect(),
            method,
            input,
            options: RequestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Slash-joined route, for logs.
    pub fn route(&self) -> String {
        self.path.join("/")
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn input(&self) -> Option<&Value> {
        self.input.as_ref()
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Encode into the wire shape, running the input through `transformer`.
    pub fn to_call(&self, transformer: &dyn Transformer) -> Result<BatchCall, EdenError> {
        let input = self
            .input
            .clone()
            .map(|value| transformer.serialize(value))
            .transpose()?;
        Ok(BatchCall {
            path: self.path.clone(),
            method: self.method,
            input,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::signal::AbortController;
    use crate::domain::transformer::IdentityTransformer;

    #[test]
    fn to_call_preserves_path_order_and_absent_input() {
        let descriptor = RequestDescriptor::new(["users", "byId"], Method::Get, None);
        let call = descriptor
            .to_call(&IdentityTransformer)
            .expect("identity never fails");

        assert_eq!(call.path, vec!["users".to_string(), "byId".to_string()]);
        assert_eq!(call.input, None);
        assert_eq!(descriptor.route(), "users/byId");
    }

    #[test]
    fn to_call_runs_input_through_transformer() {
        #[derive(Debug)]
        struct Wrap;
        impl Transformer for Wrap {
            fn serialize(&self, value: Value) -> Result<Value, EdenError> {
                Ok(json!({ "json": value }))
            }
            fn deserialize(&self, value: Value) -> Result<Value, EdenError> {
                Ok(value)
            }
        }

        let descriptor = RequestDescriptor::new(["greet"], Method::Post, Some(json!({"n": 1})));
        let call = descriptor.to_call(&Wrap).expect("encode");
        assert_eq!(call.input, Some(json!({ "json": { "n": 1 } })));
    }

    #[test]
    fn options_report_abort_state() {
        let controller = AbortController::new();
        let options = RequestOptions::default().with_signal(controller.signal());
        assert!(!options.is_aborted());
        controller.abort();
        assert!(options.is_aborted());
    }
}
