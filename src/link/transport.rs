//! HTTP seam between the batch link and the network.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use eden_query_wire::{BatchCall, BatchOutcome, BatchResponseBody};
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::domain::{EdenError, Transformer, TransportError};

/// One outbound batch: a single HTTP request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<BatchCall>,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`BatchTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = Client::builder().user_agent(Self::user_agent());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn user_agent() -> &'static str {
        concat!("eden-query/", env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl BatchTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self.client.post(request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.json(&request.body).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(TransportResponse { status, body })
    }
}

/// Parse a batch response and check it lines up with `expected` calls.
pub(crate) fn decode_outcomes(
    response: &TransportResponse,
    expected: usize,
) -> Result<Vec<BatchOutcome>, TransportError> {
    let outcomes: BatchResponseBody = serde_json::from_slice(&response.body).map_err(|err| {
        TransportError::malformed(format!(
            "HTTP {} body is not a batch envelope: {err}",
            response.status
        ))
    })?;

    if outcomes.len() != expected {
        return Err(TransportError::malformed(format!(
            "expected {expected} outcomes, got {}",
            outcomes.len()
        )));
    }
    Ok(outcomes)
}

/// Turn one positional outcome into the caller's result.
pub(crate) fn resolve_outcome(
    outcome: BatchOutcome,
    transformer: &dyn Transformer,
) -> Result<Value, EdenError> {
    if outcome.is_success() {
        transformer.deserialize(outcome.data.unwrap_or(Value::Null))
    } else {
        let error = transformer.deserialize(outcome.error.unwrap_or(Value::Null))?;
        Err(EdenError::application(outcome.status, error))
    }
}
