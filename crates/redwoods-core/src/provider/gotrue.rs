//! HTTP identity provider for GoTrue-style auth services.
//!
//! Talks to the `/auth/v1` REST surface, keeps the current session in
//! memory (and optionally on disk), and broadcasts session changes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use super::{
    AuthChangeEvent, IdentityProvider, PasswordCredentials, ProviderError, SessionChange,
    SessionFile, SignUpRequest, UserAttributes, VerifyOtpParams, SESSION_CHANGE_CAPACITY,
};
use crate::models::{Identity, ProviderSession};

// ============================================================================
// Constants
// ============================================================================

/// Path prefix of the auth API below the project URL.
const AUTH_PATH: &str = "auth/v1";

/// HTTP request timeout in seconds.
/// Auth calls are small; 30s tolerates a cold backend without hanging forever.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    user: Identity,
}

impl TokenResponse {
    fn into_session(self) -> ProviderSession {
        let expires_in = self.expires_in;
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)));

        ProviderSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up answers with a session when auto-confirm is on, otherwise with
/// the pending user record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(Identity),
}

struct Inner {
    http: Client,
    base_url: String,
    anon_key: String,
    storage: Option<SessionFile>,
    session: RwLock<Option<ProviderSession>>,
    changes: broadcast::Sender<SessionChange>,
}

/// Identity provider client. Clone is cheap and clones share the session.
#[derive(Clone)]
pub struct GoTrueClient {
    inner: Arc<Inner>,
}

impl GoTrueClient {
    /// Create a client for the project at `base_url`.
    ///
    /// With `storage`, sessions survive restarts; without it they live only
    /// as long as the client.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        storage: Option<SessionFile>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let (changes, _) = broadcast::channel(SESSION_CHANGE_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.into(),
                anon_key: anon_key.into(),
                storage,
                session: RwLock::new(None),
                changes,
            }),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.inner.base_url.trim_end_matches('/'),
            AUTH_PATH,
            path
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner
            .http
            .request(method, self.endpoint(path))
            .header("apikey", &self.inner.anon_key)
            .header(header::ACCEPT, "application/json")
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ProviderError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::from_status(status, &body))
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    /// The in-memory session, falling back to the persisted one.
    async fn active_session(&self) -> Option<ProviderSession> {
        if let Some(session) = self.inner.session.read().await.clone() {
            return Some(session);
        }

        let storage = self.inner.storage.as_ref()?;
        match storage.load() {
            Ok(Some(session)) => {
                debug!(path = ?storage.path(), "Loaded persisted session");
                *self.inner.session.write().await = Some(session.clone());
                Some(session)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session file");
                self.discard_session().await;
                None
            }
        }
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<ProviderSession, ProviderError> {
        let response = self
            .request(Method::POST, "token")
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let token: TokenResponse = Self::parse(response).await?;
        Ok(token.into_session())
    }

    async fn install_session(&self, session: ProviderSession, event: AuthChangeEvent) {
        if let Some(ref storage) = self.inner.storage {
            if let Err(e) = storage.save(&session) {
                warn!(error = %e, "Failed to persist session");
            }
        }
        *self.inner.session.write().await = Some(session.clone());
        self.emit(SessionChange::new(event, Some(session)));
    }

    async fn discard_session(&self) {
        self.inner.session.write().await.take();
        if let Some(ref storage) = self.inner.storage {
            if let Err(e) = storage.clear() {
                warn!(error = %e, "Failed to remove persisted session");
            }
        }
    }

    async fn refresh_with(&self, session: &ProviderSession) -> Result<ProviderSession, ProviderError> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or(ProviderError::MissingSession)?;

        match self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(fresh) => {
                self.install_session(fresh.clone(), AuthChangeEvent::TokenRefreshed).await;
                Ok(fresh)
            }
            Err(e) => {
                if e.invalidates_session() {
                    // No notification: the caller decides how to surface a dead session.
                    self.discard_session().await;
                }
                Err(e)
            }
        }
    }

    fn emit(&self, change: SessionChange) {
        let event = change.event;
        if self.inner.changes.send(change).is_err() {
            debug!(?event, "No session change listeners");
        }
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn get_current_session(&self) -> Result<Option<ProviderSession>, ProviderError> {
        let Some(session) = self.active_session().await else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        debug!("Stored session expired, refreshing");
        match self.refresh_with(&session).await {
            Ok(fresh) => Ok(Some(fresh)),
            Err(e) if e.invalidates_session() => {
                info!(error = %e, "Stored session can no longer be refreshed");
                self.discard_session().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn on_session_change(&self) -> broadcast::Receiver<SessionChange> {
        self.inner.changes.subscribe()
    }

    async fn sign_in_with_password(&self, credentials: &PasswordCredentials) -> Result<(), ProviderError> {
        let body = serde_json::to_value(credentials)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let session = self.token_grant("password", body).await?;
        info!(user_id = %session.user.id, "Signed in");
        self.install_session(session, AuthChangeEvent::SignedIn).await;
        Ok(())
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<(), ProviderError> {
        let mut builder = self.request(Method::POST, "signup");
        if let Some(ref redirect) = request.options.email_redirect_to {
            builder = builder.query(&[("redirect_to", redirect)]);
        }

        let response = builder
            .json(&json!({
                "email": request.email,
                "password": request.password,
                "data": request.options.data,
            }))
            .send()
            .await?;
        let response = Self::check_response(response).await?;

        match Self::parse::<SignUpResponse>(response).await? {
            SignUpResponse::Session(token) => {
                let session = token.into_session();
                info!(user_id = %session.user.id, "Signed up with immediate session");
                self.install_session(session, AuthChangeEvent::SignedIn).await;
            }
            SignUpResponse::User(user) => {
                info!(user_id = %user.id, "Signed up, awaiting email confirmation");
            }
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let result = match self.active_session().await {
            Some(session) => {
                let outcome = match self
                    .request(Method::POST, "logout")
                    .bearer_auth(&session.access_token)
                    .send()
                    .await
                {
                    Ok(response) => Self::check_response(response).await.map(|_| ()),
                    Err(e) => Err(e.into()),
                };
                match outcome {
                    // Token already dead on the server: the local sign-out still counts
                    Err(ProviderError::Unauthorized) => Ok(()),
                    other => other,
                }
            }
            None => Ok(()),
        };

        self.discard_session().await;
        self.emit(SessionChange::signed_out());
        result
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), ProviderError> {
        let response = self
            .request(Method::POST, "recover")
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn update_user(&self, attributes: &UserAttributes) -> Result<(), ProviderError> {
        let mut session = self
            .active_session()
            .await
            .ok_or(ProviderError::MissingSession)?;

        let response = self
            .request(Method::PUT, "user")
            .bearer_auth(&session.access_token)
            .json(attributes)
            .send()
            .await?;
        let response = Self::check_response(response).await?;

        session.user = Self::parse(response).await?;
        self.install_session(session, AuthChangeEvent::UserUpdated).await;
        Ok(())
    }

    async fn verify_otp(&self, params: &VerifyOtpParams) -> Result<(), ProviderError> {
        let response = self
            .request(Method::POST, "verify")
            .json(params)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let token: TokenResponse = Self::parse(response).await?;
        self.install_session(token.into_session(), AuthChangeEvent::SignedIn).await;
        Ok(())
    }

    async fn refresh_session(&self) -> Result<(), ProviderError> {
        let session = self
            .active_session()
            .await
            .ok_or(ProviderError::MissingSession)?;
        self.refresh_with(&session).await.map(|_| ())
    }
}
