//! The process-wide session store.
//!
//! Holds `{identity, loading}` and keeps it in step with the identity
//! provider: a one-shot lookup on activation, then every session-changed
//! notification until teardown. Navigation is a side effect of those
//! transitions (see [`super::routes`]).

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::panic_message;
use super::routes::{self, Navigator};
use crate::models::Identity;
use crate::provider::{IdentityProvider, SessionChange};

/// Where the store is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPhase {
    #[default]
    Uninitialized,
    Loading,
    Authenticated,
    Unauthenticated,
}

/// Read-only view of the session, as observed by the rest of the app.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub loading: bool,
    pub phase: AuthPhase,
}

impl SessionState {
    fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            loading: false,
            phase: AuthPhase::Authenticated,
        }
    }

    fn unauthenticated() -> Self {
        Self {
            identity: None,
            loading: false,
            phase: AuthPhase::Unauthenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// State shared with the notification listener task.
struct Shared {
    state: watch::Sender<SessionState>,
    navigator: Arc<dyn Navigator>,
    /// Notifications applied so far. Guards the lookup against
    /// overwriting a newer notification.
    applied: Mutex<u64>,
}

impl Shared {
    fn applied(&self) -> std::sync::MutexGuard<'_, u64> {
        self.applied.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, change: SessionChange) {
        debug!(event = ?change.event, has_session = change.session.is_some(), "Session change");
        let mut applied = self.applied();
        *applied += 1;
        self.settle(change.session.map(|session| session.user));
    }

    /// Publish the lookup result, unless a notification was applied after
    /// `seen` was read. Returns whether the result was published.
    fn settle_lookup(&self, identity: Option<Identity>, seen: u64) -> bool {
        let applied = self.applied();
        if *applied != seen {
            debug!("Session changed during lookup, keeping the newer state");
            return false;
        }
        self.settle(identity);
        true
    }

    /// Publish `identity` and apply route policy for the current path.
    fn settle(&self, identity: Option<Identity>) {
        let path = self.navigator.current_path();
        let target = match identity {
            Some(identity) => {
                self.state.send_replace(SessionState::authenticated(identity));
                routes::redirect_when_authenticated(&path)
            }
            None => {
                self.state.send_replace(SessionState::unauthenticated());
                routes::redirect_when_signed_out(&path)
            }
        };
        if let Some(target) = target.filter(|target| *target != path) {
            self.navigator.navigate(target);
        }
    }
}

/// Owns the session state. Create one per application and share it.
pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    shared: Arc<Shared>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn IdentityProvider>, navigator: Arc<dyn Navigator>) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::default());
        Arc::new(Self {
            provider,
            shared: Arc::new(Shared {
                state,
                navigator,
                applied: Mutex::new(0),
            }),
            listener: Mutex::new(None),
        })
    }

    /// Start following the provider: subscribe to session changes, then
    /// lookup for the current session.
    ///
    /// Resolves once the lookup has. The lookup result goes through the same
    /// route policy as a notification, so a signed-out start on a protected
    /// route lands on the login route. A notification applied while the
    /// lookup is in flight wins over the lookup result. The lookup is never
    /// retried; any failure leaves the store unauthenticated. Activating
    /// twice is a no-op.
    pub async fn activate(&self) {
        let seen = {
            let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
            if listener.is_some() {
                warn!("Session store already active");
                return;
            }
            self.shared.state.send_replace(SessionState {
                identity: None,
                loading: true,
                phase: AuthPhase::Loading,
            });

            // Subscribe before probing so nothing emitted meanwhile is lost
            let changes = self.provider.on_session_change();
            let seen = *self.shared.applied();
            *listener = Some(tokio::spawn(listen(self.shared.clone(), changes)));
            seen
        };

        let lookup = AssertUnwindSafe(self.provider.get_current_session())
            .catch_unwind()
            .await;

        let resolved = match lookup {
            Ok(Ok(Some(session))) => {
                info!(user_id = %session.user.id, "Restored existing session");
                Some(session.user)
            }
            Ok(Ok(None)) => {
                debug!("No active session");
                None
            }
            Ok(Err(e)) => {
                error!(error = %e, "Error checking session");
                None
            }
            Err(panic) => {
                error!(error = %panic_message(&*panic), "Session lookup panicked");
                None
            }
        };
        self.shared.settle_lookup(resolved, seen);
    }

    /// Stop listening for session changes.
    pub fn shutdown(&self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            debug!("Session store listener stopped");
            handle.abort();
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.shared.state.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    pub fn phase(&self) -> AuthPhase {
        self.shared.state.borrow().phase
    }

    /// Observe state changes.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Wait up to `timeout` for an authenticated identity.
    ///
    /// A sign-in call returns before its notification has been applied, so
    /// callers that print the identity right after use this.
    pub async fn wait_for_identity(&self, timeout: Duration) -> Option<Identity> {
        let mut rx = self.watch();
        let identity = match tokio::time::timeout(timeout, rx.wait_for(SessionState::is_authenticated)).await {
            Ok(Ok(state)) => state.identity.clone(),
            Ok(Err(_)) => None,
            Err(_) => {
                debug!(?timeout, "No identity arrived in time");
                None
            }
        };
        identity
    }

    pub(crate) fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    pub(crate) fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.shared.navigator
    }

    /// Forget the identity without waiting for the provider to say so.
    pub(crate) fn clear_identity(&self) {
        self.shared.state.send_replace(SessionState::unauthenticated());
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn listen(shared: Arc<Shared>, mut changes: broadcast::Receiver<SessionChange>) {
    loop {
        match changes.recv().await {
            Ok(change) => shared.apply(change),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Session change listener lagged behind");
            }
            Err(RecvError::Closed) => {
                debug!("Provider closed the session change stream");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::routes::{Router, APP_ROOT, LOGIN_ROUTE};
    use crate::auth::testing::{session_for, Lookup, ScriptedProvider};
    use crate::provider::AuthChangeEvent;

    fn store_with(lookup: Lookup, path: &str) -> (Arc<SessionStore>, Arc<ScriptedProvider>, Arc<Router>) {
        let provider = ScriptedProvider::new(lookup);
        let router = Arc::new(Router::new(path));
        let store = SessionStore::new(provider.clone(), router.clone());
        (store, provider, router)
    }

    fn signed_in(id: &str, email: &str) -> SessionChange {
        SessionChange::new(AuthChangeEvent::SignedIn, Some(session_for(id, email)))
    }

    #[tokio::test]
    async fn test_lookup_with_session_authenticates() {
        let (store, _provider, router) =
            store_with(Lookup::Session(session_for("u1", "a@x.com")), "/dashboard");
        assert_eq!(store.phase(), AuthPhase::Uninitialized);
        assert!(!store.is_loading());

        store.activate().await;

        let state = store.snapshot();
        assert_eq!(state.phase, AuthPhase::Authenticated);
        assert!(!state.loading);
        let identity = state.identity.unwrap();
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.email, "a@x.com");
        // Already inside the app, nowhere to go
        assert_eq!(router.navigations(), 0);
    }

    #[tokio::test]
    async fn test_signed_out_start_on_protected_route_redirects_to_login() {
        for lookup in [Lookup::Empty, Lookup::Fail("backend down")] {
            let (store, _provider, router) = store_with(lookup, "/inbox");
            store.activate().await;
            assert_eq!(store.phase(), AuthPhase::Unauthenticated);
            assert_eq!(router.current_path(), LOGIN_ROUTE);
            assert_eq!(router.navigations(), 1);
        }
    }

    #[tokio::test]
    async fn test_signed_in_start_on_login_route_redirects_to_app() {
        let (store, _provider, router) =
            store_with(Lookup::Session(session_for("u1", "a@x.com")), LOGIN_ROUTE);
        store.activate().await;
        assert_eq!(router.current_path(), APP_ROOT);
    }

    #[tokio::test]
    async fn test_signed_out_start_on_login_route_stays_put() {
        let (store, _provider, router) = store_with(Lookup::Empty, LOGIN_ROUTE);
        store.activate().await;
        assert_eq!(router.navigations(), 0);
    }

    #[tokio::test]
    async fn test_notification_during_lookup_wins_over_lookup_result() {
        let (store, provider, router) = store_with(Lookup::Empty, "/inbox");
        let gate = provider.hold_lookup();
        let mut rx = store.watch();

        let activating = tokio::spawn({
            let store = store.clone();
            async move { store.activate().await }
        });
        rx.wait_for(|s| s.phase == AuthPhase::Loading).await.unwrap();

        provider.emit(signed_in("u1", "a@x.com"));
        rx.wait_for(|s| s.phase == AuthPhase::Authenticated).await.unwrap();

        // The stale empty lookup resolves afterwards
        gate.notify_one();
        activating.await.unwrap();

        assert_eq!(store.identity().unwrap().id, "u1");
        assert_eq!(store.phase(), AuthPhase::Authenticated);
        assert_eq!(router.navigations(), 0);
    }

    #[tokio::test]
    async fn test_lookup_without_session_or_with_failure_is_unauthenticated() {
        for lookup in [Lookup::Empty, Lookup::Fail("backend down"), Lookup::Panic] {
            let (store, _provider, _router) = store_with(lookup, "/");
            store.activate().await;
            let state = store.snapshot();
            assert_eq!(state.phase, AuthPhase::Unauthenticated);
            assert!(state.identity.is_none());
            assert!(!state.loading);
        }
    }

    #[tokio::test]
    async fn test_loading_only_while_lookup_in_flight() {
        let (store, provider, _router) =
            store_with(Lookup::Session(session_for("u1", "a@x.com")), "/dashboard");
        let gate = provider.hold_lookup();
        let mut rx = store.watch();

        let activating = tokio::spawn({
            let store = store.clone();
            async move { store.activate().await }
        });

        let loading = rx.wait_for(|s| s.phase == AuthPhase::Loading).await.unwrap().clone();
        assert!(loading.loading);
        assert!(loading.identity.is_none());

        gate.notify_one();
        activating.await.unwrap();
        assert!(!store.is_loading());
        assert_eq!(store.phase(), AuthPhase::Authenticated);
    }

    #[tokio::test]
    async fn test_identity_tracks_latest_notification() {
        let (store, provider, _router) = store_with(Lookup::Empty, "/inbox");
        store.activate().await;
        let mut rx = store.watch();

        provider.emit(signed_in("u1", "a@x.com"));
        rx.changed().await.unwrap();
        assert_eq!(store.identity().unwrap().id, "u1");

        provider.emit(SessionChange::new(
            AuthChangeEvent::TokenRefreshed,
            Some(session_for("u2", "b@x.com")),
        ));
        rx.changed().await.unwrap();
        assert_eq!(store.identity().unwrap().id, "u2");
        assert_eq!(store.phase(), AuthPhase::Authenticated);

        provider.emit(SessionChange::signed_out());
        rx.changed().await.unwrap();
        assert!(store.identity().is_none());
        assert_eq!(store.phase(), AuthPhase::Unauthenticated);
        assert!(!store.is_loading());

        provider.emit(signed_in("u3", "c@x.com"));
        rx.changed().await.unwrap();
        assert_eq!(store.identity().unwrap().id, "u3");
    }

    #[tokio::test]
    async fn test_sign_in_on_login_route_redirects_to_app() {
        let (store, provider, router) = store_with(Lookup::Empty, LOGIN_ROUTE);
        store.activate().await;
        let mut rx = store.watch();

        provider.emit(signed_in("u1", "a@x.com"));
        rx.changed().await.unwrap();
        assert_eq!(router.current_path(), APP_ROOT);
        assert_eq!(router.navigations(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_elsewhere_does_not_redirect() {
        let (store, provider, router) = store_with(Lookup::Empty, "/public/pricing");
        store.activate().await;
        let mut rx = store.watch();

        provider.emit(signed_in("u1", "a@x.com"));
        rx.changed().await.unwrap();
        assert_eq!(router.navigations(), 0);
    }

    #[tokio::test]
    async fn test_sign_out_on_public_routes_stays_put() {
        for path in ["/", "/public", "/public/pricing", "/reset-password", "/auth/reset-password"] {
            let (store, provider, router) =
                store_with(Lookup::Session(session_for("u1", "a@x.com")), path);
            store.activate().await;
            let mut rx = store.watch();

            provider.emit(SessionChange::signed_out());
            rx.changed().await.unwrap();
            assert!(store.identity().is_none());
            assert_eq!(router.navigations(), 0, "unexpected redirect from {}", path);
        }
    }

    #[tokio::test]
    async fn test_sign_out_on_protected_route_redirects_to_login() {
        let (store, provider, router) =
            store_with(Lookup::Session(session_for("u1", "a@x.com")), "/inbox");
        store.activate().await;
        let mut rx = store.watch();

        provider.emit(SessionChange::signed_out());
        rx.changed().await.unwrap();
        assert_eq!(router.current_path(), LOGIN_ROUTE);
        assert_eq!(router.visits_to(LOGIN_ROUTE), 1);
    }

    #[tokio::test]
    async fn test_wait_for_identity_sees_late_sign_in() {
        let (store, provider, _router) = store_with(Lookup::Empty, "/auth");
        store.activate().await;
        assert!(store.identity().is_none());

        tokio::spawn({
            let provider = provider.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                provider.emit(signed_in("u1", "a@x.com"));
            }
        });

        let identity = store.wait_for_identity(Duration::from_secs(5)).await.unwrap();
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_wait_for_identity_returns_current_identity() {
        let (store, _provider, _router) =
            store_with(Lookup::Session(session_for("u1", "a@x.com")), "/dashboard");
        store.activate().await;
        let identity = store.wait_for_identity(Duration::ZERO).await;
        assert_eq!(identity.unwrap().id, "u1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_identity_gives_up_after_timeout() {
        let (store, _provider, _router) = store_with(Lookup::Empty, "/auth");
        store.activate().await;
        assert!(store.wait_for_identity(Duration::from_secs(2)).await.is_none());
    }

    #[tokio::test]
    async fn test_activate_twice_subscribes_once() {
        let (store, provider, _router) = store_with(Lookup::Empty, "/");
        store.activate().await;
        store.activate().await;
        assert_eq!(provider.listeners(), 1);
        assert_eq!(
            provider.calls().iter().filter(|c| *c == "get_current_session").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_shutdown_releases_listener() {
        let (store, provider, _router) = store_with(Lookup::Empty, "/");
        store.activate().await;
        assert_eq!(provider.listeners(), 1);

        store.shutdown();
        for _ in 0..10 {
            if provider.listeners() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(provider.listeners(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases_listener() {
        let (store, provider, _router) = store_with(Lookup::Empty, "/");
        store.activate().await;
        drop(store);
        for _ in 0..10 {
            if provider.listeners() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(provider.listeners(), 0);
    }
}
