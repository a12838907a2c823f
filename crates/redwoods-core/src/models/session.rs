use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Identity;

/// Seconds before expiry at which a session is worth refreshing.
const REFRESH_BUFFER_SECS: i64 = 60;

/// The provider's proof that a principal is authenticated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: Identity,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl ProviderSession {
    pub fn new(access_token: impl Into<String>, user: Identity) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
            expires_at: None,
            user,
        }
    }

    /// Sessions without an expiry never expire locally; the provider decides.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Utc::now() >= at).unwrap_or(false)
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        self.expires_at
            .map(|at| Utc::now() + Duration::seconds(REFRESH_BUFFER_SECS) >= at)
            .unwrap_or(false)
    }

    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|at| at - Utc::now())
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.time_until_expiry().map(|d| d.num_minutes().max(0))
    }
}
