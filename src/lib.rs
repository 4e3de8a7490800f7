//! Batching RPC client with cache-keyed query bindings.
//!
//! Calls made through an [`EdenClient`] become [`RequestDescriptor`]s. A
//! [`link`] carries them to the server, coalescing calls issued in the same
//! scheduling turn into one positional batch request. The [`hooks`]
//! observers and [`EdenUtils`] put a [`QueryClient`] cache in front of the
//! client.

pub mod cache;
pub mod client;
pub mod config;
pub mod context;
pub mod domain;
pub mod hooks;
pub mod infra;
pub mod link;
pub(crate) mod util;

pub use cache::{QueryClient, QueryFilter, QueryKey};
pub use client::{EdenClient, Procedure, RouteBuilder};
pub use context::{EdenContext, EdenUtils};
pub use domain::{AbortController, AbortSignal, EdenError, RequestDescriptor, TransportError};
pub use eden_query_wire::Method;
