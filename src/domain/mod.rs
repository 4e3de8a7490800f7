//! Core value types shared by links, the client facade and the bindings.

pub mod descriptor;
pub mod error;
pub mod signal;
pub mod transformer;

pub use descriptor::{RequestDescriptor, RequestOptions};
pub use error::{EdenError, TransportError};
pub use signal::{AbortController, AbortSignal};
pub use transformer::{IdentityTransformer, SharedTransformer, Transformer};
