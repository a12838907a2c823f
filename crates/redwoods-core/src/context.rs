//! Explicit injection of the application's capabilities.
//!
//! There is exactly one session store per application. Components receive
//! it through an [`AppContext`] built once at startup; asking for a
//! capability that was never provided is an error, never a silent default.

use std::sync::Arc;

use thiserror::Error;

use crate::auth::{AuthActions, SessionStore};
use crate::channel::ReconnectingChannel;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("auth capability requested outside of an auth provider")]
    MissingAuthProvider,

    #[error("no message channel was provided")]
    MissingChannel,
}

/// The session store together with the actions that drive it.
#[derive(Clone)]
pub struct AuthHandle {
    pub store: Arc<SessionStore>,
    pub actions: AuthActions,
}

impl AuthHandle {
    pub fn new(store: Arc<SessionStore>, actions: AuthActions) -> Self {
        Self { store, actions }
    }
}

#[derive(Clone, Default)]
pub struct AppContext {
    auth: Option<AuthHandle>,
    channel: Option<Arc<ReconnectingChannel>>,
}

impl AppContext {
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::default()
    }

    pub fn auth(&self) -> Result<&AuthHandle, ContextError> {
        self.auth.as_ref().ok_or(ContextError::MissingAuthProvider)
    }

    pub fn channel(&self) -> Result<&Arc<ReconnectingChannel>, ContextError> {
        self.channel.as_ref().ok_or(ContextError::MissingChannel)
    }
}

#[derive(Default)]
pub struct AppContextBuilder {
    auth: Option<AuthHandle>,
    channel: Option<Arc<ReconnectingChannel>>,
}

impl AppContextBuilder {
    pub fn auth(mut self, handle: AuthHandle) -> Self {
        self.auth = Some(handle);
        self
    }

    pub fn channel(mut self, channel: Arc<ReconnectingChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn build(self) -> AppContext {
        AppContext {
            auth: self.auth,
            channel: self.channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{Lookup, ScriptedProvider};
    use crate::auth::{RedirectUrls, Router};

    #[test]
    fn test_missing_auth_is_an_error() {
        let context = AppContext::builder().build();
        assert_eq!(context.auth().err(), Some(ContextError::MissingAuthProvider));
        assert_eq!(context.channel().err(), Some(ContextError::MissingChannel));
    }

    #[tokio::test]
    async fn test_injected_store_is_shared() {
        let provider = ScriptedProvider::new(Lookup::Empty);
        let store = SessionStore::new(provider, Arc::new(Router::default()));
        let actions = AuthActions::new(store.clone(), RedirectUrls::for_origin("http://localhost"));

        let context = AppContext::builder()
            .auth(AuthHandle::new(store.clone(), actions))
            .build();
        let copy = context.clone();

        let handle = copy.auth().unwrap();
        assert!(Arc::ptr_eq(&handle.store, &store));
        assert!(Arc::ptr_eq(&context.auth().unwrap().store, &store));
    }
}
