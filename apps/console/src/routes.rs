//! Console screens and the navigation history between them.

use std::fmt;

use client_core::SIGN_IN_PATH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignIn,
    SignUp,
    Dashboard,
    Customers,
    Orders,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::SignIn => SIGN_IN_PATH,
            Route::SignUp => "/signup",
            Route::Dashboard => "/dashboard",
            Route::Customers => "/customers",
            Route::Orders => "/orders",
        }
    }

    /// Accepts either a path (`/orders`) or a bare screen name (`orders`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().trim_start_matches('/').to_ascii_lowercase().as_str() {
            "" | "signin" | "login" => Some(Route::SignIn),
            "signup" | "register" => Some(Route::SignUp),
            "dashboard" => Some(Route::Dashboard),
            "customers" => Some(Route::Customers),
            "orders" => Some(Route::Orders),
            _ => None,
        }
    }

    pub fn is_protected(self) -> bool {
        matches!(self, Route::Dashboard | Route::Customers | Route::Orders)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Browser-style history: `replace` swaps the current entry so `back` can
/// never land on it again.
#[derive(Debug, Clone)]
pub struct Navigator {
    entries: Vec<Route>,
}

impl Navigator {
    pub fn new(start: Route) -> Self {
        Self {
            entries: vec![start],
        }
    }

    pub fn current(&self) -> Route {
        self.entries.last().copied().unwrap_or(Route::SignIn)
    }

    pub fn push(&mut self, route: Route) {
        if self.current() != route {
            self.entries.push(route);
        }
    }

    pub fn replace(&mut self, route: Route) {
        self.entries.pop();
        self.entries.push(route);
    }

    /// Steps back one entry; `None` at the start of history.
    pub fn back(&mut self) -> Option<Route> {
        if self.entries.len() < 2 {
            return None;
        }
        self.entries.pop();
        Some(self.current())
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.entries.len()
    }
}
