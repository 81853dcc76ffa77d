//! Process-wide authenticated/unauthenticated belief.
//!
//! The status lives in a `watch` channel owned by [`SessionAuthority`]; only
//! `resolve`, `login` and `logout` write to it. Everything else holds an
//! `Arc<SessionAuthority>` and reads or subscribes.

use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};

use crate::transport::AuthBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Startup check has not completed yet.
    Resolving,
    Authenticated,
    Unauthenticated,
}

impl SessionStatus {
    pub fn is_settled(self) -> bool {
        self != SessionStatus::Resolving
    }
}

pub struct SessionAuthority {
    backend: Arc<dyn AuthBackend>,
    status: watch::Sender<SessionStatus>,
}

impl SessionAuthority {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Arc<Self> {
        let (status, _) = watch::channel(SessionStatus::Resolving);
        Arc::new(Self { backend, status })
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Waits until the startup check has produced a conclusive status.
    pub async fn settled(&self) -> SessionStatus {
        let mut status = self.subscribe();
        let settled = match status.wait_for(|current| current.is_settled()).await {
            Ok(current) => *current,
            Err(_) => self.status(),
        };
        settled
    }

    /// Asks the backend whether the session cookie is still valid. Any failure
    /// (transport, rejection, malformed body) counts as "not authenticated".
    /// Calling it again performs a fresh check.
    pub async fn resolve(&self) -> SessionStatus {
        let next = match self.backend.check_auth().await {
            Ok(true) => SessionStatus::Authenticated,
            Ok(false) => SessionStatus::Unauthenticated,
            Err(err) => {
                warn!(error = %err, kind = ?err.kind(), "session check failed");
                SessionStatus::Unauthenticated
            }
        };
        self.transition(next, "resolve");
        next
    }

    /// Records a sign-in the caller already verified with the backend.
    pub fn login(&self) {
        self.transition(SessionStatus::Authenticated, "login");
    }

    /// Drops the local session immediately and asks the backend to invalidate
    /// the cookie on a background task. The remote outcome never changes the
    /// local status; the handle is only for callers that want to wait on it.
    pub fn logout(&self) -> JoinHandle<()> {
        self.transition(SessionStatus::Unauthenticated, "logout");
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            if let Err(err) = backend.logout().await {
                warn!(error = %err, "remote logout failed; local session already cleared");
            }
        })
    }

    fn transition(&self, next: SessionStatus, cause: &'static str) {
        let previous = self.status.send_replace(next);
        if previous != next {
            info!(from = ?previous, to = ?next, cause, "session status changed");
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
