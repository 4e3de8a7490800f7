//! Client facade: turns route calls into request descriptors and hands
//! them to a [`Link`]. Nothing here caches.

mod procedure;
mod route;

use std::sync::Arc;

use eden_query_wire::Method;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{EdenError, RequestDescriptor, RequestOptions};
use crate::link::{Link, PendingCall, SharedLink};

pub use procedure::Procedure;
pub use route::RouteBuilder;

#[derive(Clone)]
pub struct EdenClient {
    link: SharedLink,
}

impl EdenClient {
    pub fn new(link: SharedLink) -> Self {
        Self { link }
    }

    pub fn from_link(link: impl Link + 'static) -> Self {
        Self::new(Arc::new(link))
    }

    pub fn link(&self) -> &SharedLink {
        &self.link
    }

    /// Start a route at `segment`; chain [`RouteBuilder::route`] for nested
    /// segments.
    pub fn route(&self, segment: impl Into<String>) -> RouteBuilder {
        RouteBuilder::new(self.clone(), vec![segment.into()])
    }

    /// Route addressed by an already split path.
    pub fn path<I, S>(&self, path: I) -> RouteBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RouteBuilder::new(self.clone(), path.into_iter().map(Into::into).collect())
    }

    /// Hand one descriptor to the link. The call joins the link's current
    /// window before this returns.
    pub fn submit(&self, descriptor: RequestDescriptor) -> PendingCall {
        self.link.dispatch(descriptor)
    }

    /// Call a typed procedure.
    pub fn call<P: Procedure>(
        &self,
        input: &P::Input,
        options: RequestOptions,
    ) -> BoxFuture<'static, Result<P::Output, EdenError>> {
        let descriptor = match P::descriptor(input) {
            Ok(descriptor) => descriptor.with_options(options),
            Err(err) => return futures::future::ready(Err(err)).boxed(),
        };
        decode(self.submit(descriptor)).boxed()
    }
}

/// Await a pending call and decode its payload into `T`.
pub async fn decode<T: DeserializeOwned>(pending: PendingCall) -> Result<T, EdenError> {
    let value = pending.await?;
    serde_json::from_value(value).map_err(EdenError::from)
}

/// `null` input is treated as absent.
pub(crate) fn input_value(value: Value) -> Option<Value> {
    (!value.is_null()).then_some(value)
}

pub(crate) fn build_descriptor(
    path: &[String],
    method: Method,
    input: Option<Value>,
    options: RequestOptions,
) -> RequestDescriptor {
    RequestDescriptor::new(path.iter().cloned(), method, input.and_then(input_value))
        .with_options(options)
}
