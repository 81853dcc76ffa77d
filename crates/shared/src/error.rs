use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a failed backend exchange went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response reached the client.
    Transport,
    /// The server answered with a non-success outcome.
    Rejected,
    /// The server no longer accepts the session cookie.
    Unauthorized,
    /// A response arrived but did not match the contract.
    Malformed,
}

/// Operator-facing error recorded into screen state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Authorization loss escalates to the session instead of staying a
    /// table-level error.
    pub fn requires_reauth(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }
}
