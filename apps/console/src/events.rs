//! Events marshaled from background tasks back onto the console loop.

use client_core::ApiFailure;
use shared::error::{ApiError, ErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Output from the list screen mounted as `screen`.
    Render { screen: u64, text: String },
    Info(String),
    SignedIn,
    Registered,
    /// The server stopped honoring the session cookie.
    AuthorizationLost(ApiError),
}

/// Sign-in and sign-up failures in the wording operators saw before.
pub fn describe_auth_failure(failure: &ApiFailure) -> String {
    if let Some(message) = failure.server_message().filter(|m| !m.trim().is_empty()) {
        return message.to_string();
    }
    match failure.kind() {
        ErrorKind::Transport => "No response from server. Please try again.".to_string(),
        ErrorKind::Rejected | ErrorKind::Unauthorized | ErrorKind::Malformed => {
            "Something went wrong. Please try again.".to_string()
        }
    }
}
