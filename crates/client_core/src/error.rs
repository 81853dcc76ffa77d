use shared::error::{ApiError, ErrorKind};
use thiserror::Error;

/// Failure of a single backend exchange, before it is turned into screen state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiFailure {
    #[error("no response from server: {0}")]
    Transport(String),
    #[error(
        "request rejected (status {status:?}): {}",
        .message.as_deref().unwrap_or("no message")
    )]
    Rejected {
        status: Option<u16>,
        message: Option<String>,
    },
    #[error(
        "session not authorized (status {status}): {}",
        .message.as_deref().unwrap_or("no message")
    )]
    Unauthorized {
        status: u16,
        message: Option<String>,
    },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiFailure {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiFailure::Transport(_) => ErrorKind::Transport,
            ApiFailure::Rejected { .. } => ErrorKind::Rejected,
            ApiFailure::Unauthorized { .. } => ErrorKind::Unauthorized,
            ApiFailure::Malformed(_) => ErrorKind::Malformed,
        }
    }

    /// The human-readable message the server attached, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiFailure::Rejected { message, .. } | ApiFailure::Unauthorized { message, .. } => {
                message.as_deref()
            }
            ApiFailure::Transport(_) | ApiFailure::Malformed(_) => None,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }

    /// Operator-facing error: the server's message when it sent one, otherwise
    /// `fallback`.
    pub fn into_api_error(self, fallback: impl Into<String>) -> ApiError {
        let message = self
            .server_message()
            .map(str::to_owned)
            .unwrap_or_else(|| fallback.into());
        ApiError::new(self.kind(), message)
    }
}

impl From<reqwest::Error> for ApiFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiFailure::Malformed(err.to_string())
        } else {
            ApiFailure::Transport(err.to_string())
        }
    }
}
