use std::sync::Arc;

use tracing::error;

use crate::session::{SessionAuthority, SessionStatus};

/// Sign-in entry point that unauthenticated navigation is sent back to.
pub const SIGN_IN_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session not resolved yet; show nothing conclusive.
    Defer,
    Render,
    /// `replace` means the guarded entry must not stay in history.
    Redirect { to: &'static str, replace: bool },
}

impl GuardDecision {
    pub fn renders_protected(self) -> bool {
        self == GuardDecision::Render
    }
}

const TO_SIGN_IN: GuardDecision = GuardDecision::Redirect {
    to: SIGN_IN_PATH,
    replace: true,
};

/// `None` means the guard was wired without a session; that fails closed.
pub fn decide(status: Option<SessionStatus>) -> GuardDecision {
    match status {
        Some(SessionStatus::Resolving) => GuardDecision::Defer,
        Some(SessionStatus::Authenticated) => GuardDecision::Render,
        Some(SessionStatus::Unauthenticated) => TO_SIGN_IN,
        None => {
            error!("route guard evaluated without a session authority");
            TO_SIGN_IN
        }
    }
}

#[derive(Clone)]
pub struct RouteGuard {
    session: Option<Arc<SessionAuthority>>,
}

impl RouteGuard {
    pub fn new(session: Arc<SessionAuthority>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn unwired() -> Self {
        Self { session: None }
    }

    pub fn decide(&self) -> GuardDecision {
        decide(self.session.as_ref().map(|session| session.status()))
    }

    /// Like [`RouteGuard::decide`] but waits out `Resolving`, so the result is
    /// always `Render` or a redirect.
    pub async fn admit(&self) -> GuardDecision {
        match &self.session {
            Some(session) => decide(Some(session.settled().await)),
            None => decide(None),
        }
    }
}

#[cfg(test)]
#[path = "tests/guard_tests.rs"]
mod tests;
