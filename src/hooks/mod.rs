//! Observer bindings over the query cache.
//!
//! Each observer pairs a route from the client facade with a
//! [`QueryKey`](crate::cache::QueryKey) and tracks its own request state.
//! Submission failures always land in the observer's error state.

mod infinite;
mod mutation;
mod options;
mod query;

pub use infinite::{
    Direction, FetchInfiniteOptions, InfiniteData, InfiniteQueryObserver, InfiniteQueryOptions,
    PageParamFn, page_input,
};
pub(crate) use infinite::fetch_pages;
pub use mutation::{
    MutationObserver, MutationOptions, MutationState, MutationStatus, OnError, OnSuccess,
};
pub use options::{
    EdenQueryConfig, EdenQueryOverrides, Meta, MutationOverrides, MutationSuccess,
    QueryRequestOptions, SuccessOverride,
};
pub use query::{QueryObserver, QueryOptions, QueryState, QueryStatus};
