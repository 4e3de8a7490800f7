use eden_query_wire::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::{QueryFilter, QueryKey};
use crate::domain::{EdenError, RequestOptions};
use crate::link::PendingCall;

use super::{EdenClient, build_descriptor, decode};

/// Path accumulated segment by segment, ending in exactly one call.
#[derive(Clone)]
pub struct RouteBuilder {
    client: EdenClient,
    path: Vec<String>,
}

impl RouteBuilder {
    pub(super) fn new(client: EdenClient, path: Vec<String>) -> Self {
        Self { client, path }
    }

    pub fn route(mut self, segment: impl Into<String>) -> Self {
        self.path.push(segment.into());
        self
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn client(&self) -> &EdenClient {
        &self.client
    }

    /// `GET` the route.
    pub fn query(&self, input: Option<Value>, options: RequestOptions) -> PendingCall {
        self.call(Method::Get, input, options)
    }

    /// `POST` to the route.
    pub fn mutate(&self, input: Option<Value>, options: RequestOptions) -> PendingCall {
        self.call(Method::Post, input, options)
    }

    pub fn call(&self, method: Method, input: Option<Value>, options: RequestOptions) -> PendingCall {
        self.client
            .submit(build_descriptor(&self.path, method, input, options))
    }

    /// Typed variant of [`RouteBuilder::call`].
    pub async fn call_as<I, O>(
        &self,
        method: Method,
        input: &I,
        options: RequestOptions,
    ) -> Result<O, EdenError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let input = serde_json::to_value(input)?;
        decode(self.call(method, Some(input), options)).await
    }

    pub fn query_key(&self, input: Option<&Value>) -> QueryKey {
        QueryKey::new(&self.path, input)
    }

    pub fn infinite_query_key(&self, input: Option<&Value>) -> QueryKey {
        QueryKey::infinite(&self.path, input)
    }

    /// Filter covering every cached query at or below this route.
    pub fn filter(&self) -> QueryFilter {
        QueryFilter::route(&self.path)
    }
}
