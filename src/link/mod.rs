//! Links carry request descriptors to the server.
//!
//! [`HttpBatchLink`] coalesces calls into positional batches,
//! [`HttpLink`] sends them one at a time and [`LoggerLink`] decorates
//! either with tracing. The network itself sits behind [`BatchTransport`].

mod batch;
mod http;
mod logger;
mod transport;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::domain::{EdenError, RequestDescriptor};

pub use batch::{BatchLinkOptions, DEFAULT_MAX_BATCH_SIZE, HttpBatchLink};
pub use http::HttpLink;
pub use logger::LoggerLink;
pub use transport::{BatchTransport, ReqwestTransport, TransportRequest, TransportResponse};

/// Result of a dispatched call, resolved once the server answers.
pub type PendingCall = BoxFuture<'static, Result<Value, EdenError>>;

/// Anything that can carry a descriptor to the server.
///
/// `dispatch` must register the call before returning; awaiting the
/// returned future only waits for the outcome.
pub trait Link: Send + Sync {
    fn dispatch(&self, descriptor: RequestDescriptor) -> PendingCall;
}

pub type SharedLink = Arc<dyn Link>;
