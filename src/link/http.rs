//! Non-batching link: one HTTP request per call.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::domain::{RequestDescriptor, TransportError};

use super::batch::{BatchLinkOptions, HttpBatchLink};
use super::transport::BatchTransport;
use super::{Link, PendingCall};

/// Sends each call as a single-element batch over the same wire format.
#[derive(Clone)]
pub struct HttpLink {
    inner: HttpBatchLink,
}

impl HttpLink {
    pub fn new(options: BatchLinkOptions) -> Result<Self, TransportError> {
        Ok(Self {
            inner: HttpBatchLink::new(single(options))?,
        })
    }

    pub fn with_transport(options: BatchLinkOptions, transport: Arc<dyn BatchTransport>) -> Self {
        Self {
            inner: HttpBatchLink::with_transport(single(options), transport),
        }
    }
}

fn single(options: BatchLinkOptions) -> BatchLinkOptions {
    options.max_batch_size(NonZeroUsize::MIN)
}

impl Link for HttpLink {
    fn dispatch(&self, descriptor: RequestDescriptor) -> PendingCall {
        self.inner.dispatch(descriptor)
    }
}
