//! Wiring of the core pieces for one CLI invocation.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use redwoods_core::auth::routes::APP_ROOT;
use redwoods_core::auth::{AuthActions, Navigator, Router, SessionStore};
use redwoods_core::channel::ReconnectingChannel;
use redwoods_core::config::Config;
use redwoods_core::provider::{GoTrueClient, SessionFile};
use redwoods_core::{AppContext, AuthHandle};

pub struct App {
    pub config: Config,
    pub router: Arc<Router>,
    context: AppContext,
}

impl App {
    /// Build the provider, store and actions, then run the initial session
    /// lookup. The CLI behaves as if the user opened the dashboard.
    pub async fn new(config: Config) -> Result<Self> {
        let cache_dir = config.cache_dir()?;
        let provider = GoTrueClient::new(
            config.provider_url()?,
            config.anon_key(),
            Some(SessionFile::new(cache_dir)),
        )
        .context("Failed to create identity provider client")?;

        let router = Arc::new(Router::new(APP_ROOT));
        let store = SessionStore::new(Arc::new(provider), router.clone());
        let actions = AuthActions::new(store.clone(), config.redirect_urls());

        store.activate().await;
        debug!(phase = ?store.phase(), path = %router.current_path(), "Session resolved");

        let context = AppContext::builder()
            .auth(AuthHandle::new(store, actions))
            .build();

        Ok(Self {
            config,
            router,
            context,
        })
    }

    pub fn auth(&self) -> Result<&AuthHandle> {
        Ok(self.context.auth()?)
    }

    pub fn store(&self) -> Result<&Arc<SessionStore>> {
        Ok(&self.auth()?.store)
    }

    pub fn actions(&self) -> Result<&AuthActions> {
        Ok(&self.auth()?.actions)
    }

    /// Open the message channel and make it available through the context.
    pub fn attach_channel(&mut self, url: Option<String>) -> Result<Arc<ReconnectingChannel>> {
        let mut channel_config = self.config.channel_config();
        if let Some(url) = url {
            channel_config.url = url;
        }
        info!(url = %channel_config.url, "Opening message channel");

        let auth = self.auth()?.clone();
        self.context = AppContext::builder()
            .auth(auth)
            .channel(Arc::new(ReconnectingChannel::websocket(channel_config)))
            .build();
        Ok(self.context.channel()?.clone())
    }

    /// Remember the last email used to sign in. Only that field is
    /// written back; environment overrides stay out of the file.
    pub fn remember_email(&mut self, email: &str) -> Result<()> {
        self.config.last_email = Some(email.to_string());
        let mut stored = Config::load()?;
        if stored.last_email.as_deref() == Some(email) {
            return Ok(());
        }
        stored.last_email = Some(email.to_string());
        stored.save()
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Ok(store) = self.store() {
            store.shutdown();
        }
    }
}
