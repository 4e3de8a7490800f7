use thiserror::Error;

use crate::config::LoadError;
use crate::domain::TransportError;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("failed to build link: {0}")]
    Link(#[from] TransportError),
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
