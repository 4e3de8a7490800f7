use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Failure of a whole batch round-trip.
///
/// A transport error is never specific to one call: the same value is
/// cloned to every caller whose descriptor rode in the affected window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network failure: {message}")]
    Network { message: String },
    #[error("malformed batch response: {message}")]
    Malformed { message: String },
    #[error("no async runtime available to flush the batch")]
    NoRuntime,
    #[error("batch window closed before a result was delivered")]
    Dropped,
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        Self::network(error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EdenError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("request cancelled")]
    Cancelled,
    #[error("application error (status {status}): {}", ApplicationMessage(.error))]
    Application { status: u16, error: Value },
    #[error("serialization failed: {message}")]
    Serialization { message: String },
}

impl EdenError {
    pub fn application(status: u16, error: Value) -> Self {
        Self::Application { status, error }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EdenError::Cancelled)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, EdenError::Transport(_))
    }

    /// Server-reported payload, when this is an application error.
    pub fn application_payload(&self) -> Option<&Value> {
        match self {
            EdenError::Application { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EdenError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string())
    }
}

/// Renders string payloads bare and everything else as compact JSON.
struct ApplicationMessage<'a>(&'a Value);

impl fmt::Display for ApplicationMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::String(message) => f.write_str(message),
            other => write!(f, "{other}"),
        }
    }
}
