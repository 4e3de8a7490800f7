//! Pluggable wire transformer.
//!
//! The batch link hands every outbound input to [`Transformer::serialize`]
//! and every inbound payload (data or error) to [`Transformer::deserialize`].
//! The representation in between is opaque to the link.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::error::EdenError;

pub trait Transformer: fmt::Debug + Send + Sync {
    fn serialize(&self, value: Value) -> Result<Value, EdenError>;

    fn deserialize(&self, value: Value) -> Result<Value, EdenError>;
}

/// Passes values through unchanged. Used when no transformer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformer;

impl Transformer for IdentityTransformer {
    fn serialize(&self, value: Value) -> Result<Value, EdenError> {
        Ok(value)
    }

    fn deserialize(&self, value: Value) -> Result<Value, EdenError> {
        Ok(value)
    }
}

pub type SharedTransformer = Arc<dyn Transformer>;

pub fn identity() -> SharedTransformer {
    Arc::new(IdentityTransformer)
}
