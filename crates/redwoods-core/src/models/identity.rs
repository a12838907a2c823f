use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{null_as_default, AccountType};

/// The authenticated principal, as reported by the identity provider.
///
/// Only the fields the client uses are modelled; everything else the
/// provider attaches to the user record is ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(rename = "user_metadata", default, deserialize_with = "null_as_default")]
    pub metadata: UserMetadata,
}

/// Free-form profile data stored alongside the identity.
///
/// `userType` is the account-type tag used to pick a dashboard. It is a
/// UI routing hint, never an authorization decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "userType", default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: None,
            avatar_url: None,
            metadata: UserMetadata::default(),
        }
    }

    /// Name to greet the user with: explicit name, then metadata name,
    /// then the local part of the email address.
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .or(self.metadata.name.as_deref())
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                self.email
                    .split('@')
                    .next()
                    .filter(|local| !local.is_empty())
                    .unwrap_or("User")
                    .to_string()
            })
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar_url
            .as_deref()
            .or(self.metadata.avatar_url.as_deref())
    }

    /// Uppercased first letter of the display name, for avatar placeholders.
    pub fn initial(&self) -> char {
        self.display_name()
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('U')
    }

    pub fn account_type(&self) -> AccountType {
        AccountType::from_tag(self.metadata.user_type.as_deref())
    }
}
