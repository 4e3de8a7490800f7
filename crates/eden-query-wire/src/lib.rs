//! Wire envelopes exchanged between a batching client and a batch endpoint.
//!
//! One HTTP request carries an ordered array of [`BatchCall`]s; the endpoint
//! answers with an array of [`BatchOutcome`]s aligned by position.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP verb a procedure is routed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Reads are cacheable; everything else is a mutation.
    pub fn is_query(self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call inside a batch request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCall {
    pub path: Vec<String>,
    pub method: Method,
    /// Omitted entirely when the caller supplied no input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

/// Positional result for one [`BatchCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl BatchOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            status: 200,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(status: u16, error: Value) -> Self {
        Self {
            status,
            data: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub type BatchRequestBody = Vec<BatchCall>;
pub type BatchResponseBody = Vec<BatchOutcome>;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn batch_call_omits_absent_input() {
        let call = BatchCall {
            path: vec!["hello".to_string()],
            method: Method::Get,
            input: None,
        };
        let encoded = serde_json::to_value(&call).expect("encode");
        assert_eq!(encoded, json!({ "path": ["hello"], "method": "GET" }));
    }

    #[test]
    fn batch_call_keeps_present_empty_input() {
        let call = BatchCall {
            path: vec!["greet".to_string()],
            method: Method::Post,
            input: Some(json!({})),
        };
        let encoded = serde_json::to_value(&call).expect("encode");
        assert_eq!(
            encoded,
            json!({ "path": ["greet"], "method": "POST", "input": {} })
        );
    }

    #[test]
    fn outcomes_decode_from_mixed_envelope() {
        let body = json!([
            { "status": 200, "data": "hi" },
            { "status": 500, "error": "boom" }
        ]);
        let outcomes: BatchResponseBody = serde_json::from_value(body).expect("decode");

        assert!(outcomes[0].is_success());
        assert_eq!(outcomes[0].data, Some(json!("hi")));
        assert!(!outcomes[1].is_success());
        assert_eq!(outcomes[1].error, Some(json!("boom")));
    }

    #[test]
    fn outcome_without_status_is_rejected() {
        let body = json!([{ "data": "hi" }]);
        assert!(serde_json::from_value::<BatchResponseBody>(body).is_err());
    }

    #[test]
    fn method_is_query_only_for_get() {
        assert!(Method::Get.is_query());
        assert!(!Method::Post.is_query());
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
