//! Route guard policy and the navigation seam.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// Where unauthenticated users are sent.
pub const LOGIN_ROUTE: &str = "/auth";

/// Where freshly authenticated users land.
pub const APP_ROOT: &str = "/dashboard";

/// Landing page, always public.
pub const PUBLIC_ROOT: &str = "/";

/// Everything below this prefix is public.
pub const PUBLIC_PREFIX: &str = "/public";

/// Password reset links must keep working while signed out.
pub const RESET_PASSWORD_ROUTE: &str = "/reset-password";

/// Paths a signed-out user may stay on.
pub fn is_public(path: &str) -> bool {
    path == PUBLIC_ROOT || path.starts_with(PUBLIC_PREFIX) || path.contains(RESET_PASSWORD_ROUTE)
}

/// Redirect target after a session with a user arrives.
pub fn redirect_when_authenticated(path: &str) -> Option<&'static str> {
    (path == LOGIN_ROUTE).then_some(APP_ROOT)
}

/// Redirect target after the session goes away.
pub fn redirect_when_signed_out(path: &str) -> Option<&'static str> {
    (!is_public(path)).then_some(LOGIN_ROUTE)
}

/// Something that knows the current location and can move it.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;

    fn navigate(&self, path: &str);
}

/// In-memory navigator that keeps the full history.
#[derive(Debug)]
pub struct Router {
    history: Mutex<Vec<String>>,
}

impl Router {
    pub fn new(initial: &str) -> Self {
        Self {
            history: Mutex::new(vec![initial.to_string()]),
        }
    }

    /// Every path visited, starting with the initial one.
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of navigations since construction.
    pub fn navigations(&self) -> usize {
        self.history().len().saturating_sub(1)
    }

    /// How many times `path` was navigated to.
    pub fn visits_to(&self, path: &str) -> usize {
        self.history().iter().skip(1).filter(|p| *p == path).count()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(PUBLIC_ROOT)
    }
}

impl Navigator for Router {
    fn current_path(&self) -> String {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
            .unwrap_or_else(|| PUBLIC_ROOT.to_string())
    }

    fn navigate(&self, path: &str) {
        debug!(path, "Navigating");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert!(is_public("/"));
        assert!(is_public("/public"));
        assert!(is_public("/public/terms"));
        assert!(is_public("/reset-password"));
        assert!(is_public("/account/reset-password?token=abc"));

        assert!(!is_public("/auth"));
        assert!(!is_public("/dashboard"));
        assert!(!is_public("/inbox"));
        assert!(!is_public(""));
    }

    #[test]
    fn test_redirect_targets() {
        assert_eq!(redirect_when_authenticated("/auth"), Some(APP_ROOT));
        assert_eq!(redirect_when_authenticated("/inbox"), None);
        assert_eq!(redirect_when_authenticated("/"), None);

        assert_eq!(redirect_when_signed_out("/inbox"), Some(LOGIN_ROUTE));
        // Already on the login page still counts as protected
        assert_eq!(redirect_when_signed_out("/auth"), Some(LOGIN_ROUTE));
        assert_eq!(redirect_when_signed_out("/public/pricing"), None);
        assert_eq!(redirect_when_signed_out("/"), None);
        assert_eq!(redirect_when_signed_out("/reset-password"), None);
    }

    #[test]
    fn test_router_history() {
        let router = Router::new("/auth");
        assert_eq!(router.current_path(), "/auth");
        assert_eq!(router.navigations(), 0);

        router.navigate("/dashboard");
        router.navigate("/inbox");
        router.navigate("/dashboard");
        assert_eq!(router.current_path(), "/dashboard");
        assert_eq!(router.navigations(), 3);
        assert_eq!(router.visits_to("/dashboard"), 2);
        assert_eq!(router.history(), vec!["/auth", "/dashboard", "/inbox", "/dashboard"]);
    }
}
