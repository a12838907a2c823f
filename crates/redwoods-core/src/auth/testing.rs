//! Scripted identity provider for exercising the session core.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use crate::models::{Identity, ProviderSession};
use crate::provider::{
    IdentityProvider, PasswordCredentials, ProviderError, SessionChange, SignUpRequest,
    UserAttributes, VerifyOtpParams, SESSION_CHANGE_CAPACITY,
};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Ok,
    Reject(&'static str),
    Panic(&'static str),
}

#[derive(Debug, Clone)]
pub(crate) enum Lookup {
    Session(ProviderSession),
    Empty,
    Fail(&'static str),
    Panic,
}

pub(crate) struct ScriptedProvider {
    changes: broadcast::Sender<SessionChange>,
    lookup: Mutex<Lookup>,
    gate: Mutex<Option<Arc<Notify>>>,
    replies: Mutex<HashMap<&'static str, Reply>>,
    calls: Mutex<Vec<String>>,
}

pub(crate) fn session_for(id: &str, email: &str) -> ProviderSession {
    ProviderSession::new(format!("token-{}", id), Identity::new(id, email))
}

impl ScriptedProvider {
    pub(crate) fn new(lookup: Lookup) -> Arc<Self> {
        let (changes, _) = broadcast::channel(SESSION_CHANGE_CAPACITY);
        Arc::new(Self {
            changes,
            lookup: Mutex::new(lookup),
            gate: Mutex::new(None),
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Make `operation` answer with `reply` from now on.
    pub(crate) fn script(&self, operation: &'static str, reply: Reply) {
        self.replies.lock().unwrap().insert(operation, reply);
    }

    /// Block the session lookup until the returned notify fires.
    pub(crate) fn hold_lookup(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn emit(&self, change: SessionChange) {
        self.changes.send(change).expect("store should be listening");
    }

    pub(crate) fn listeners(&self) -> usize {
        self.changes.receiver_count()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: String, operation: &'static str) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(call);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(operation)
            .cloned()
            .unwrap_or(Reply::Ok);
        match reply {
            Reply::Ok => Ok(()),
            Reply::Reject(message) => Err(ProviderError::Rejected(message.to_string())),
            Reply::Panic(message) => panic!("{}", message),
        }
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn get_current_session(&self) -> Result<Option<ProviderSession>, ProviderError> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.calls.lock().unwrap().push("get_current_session".to_string());
        let lookup = self.lookup.lock().unwrap().clone();
        match lookup {
            Lookup::Session(session) => Ok(Some(session)),
            Lookup::Empty => Ok(None),
            Lookup::Fail(message) => Err(ProviderError::ServerError(message.to_string())),
            Lookup::Panic => panic!("session lookup exploded"),
        }
    }

    fn on_session_change(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(&self, credentials: &PasswordCredentials) -> Result<(), ProviderError> {
        self.answer(format!("sign_in:{}", credentials.email), "sign_in")
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<(), ProviderError> {
        let redirect = request.options.email_redirect_to.clone().unwrap_or_default();
        self.answer(format!("sign_up:{}:{}", request.email, redirect), "sign_up")
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.answer("sign_out".to_string(), "sign_out")
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), ProviderError> {
        self.answer(format!("reset:{}:{}", email, redirect_to), "reset")
    }

    async fn update_user(&self, attributes: &UserAttributes) -> Result<(), ProviderError> {
        let password = attributes.password.clone().unwrap_or_default();
        self.answer(format!("update_user:{}", password), "update_user")
    }

    async fn verify_otp(&self, params: &VerifyOtpParams) -> Result<(), ProviderError> {
        let kind = serde_json::to_value(params.kind).unwrap();
        self.answer(
            format!("verify:{}:{}:{}", params.email, params.token, kind.as_str().unwrap_or("")),
            "verify",
        )
    }

    async fn refresh_session(&self) -> Result<(), ProviderError> {
        self.answer("refresh".to_string(), "refresh")
    }
}
