use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kinds of account a user can register as.
///
/// Stored as a free-form `userType` tag in the identity metadata; anything
/// missing or unrecognized falls back to `Organization`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccountType {
    #[default]
    Organization,
    Developer,
    Freelancer,
    #[serde(rename = "NGO")]
    Ngo,
    Government,
    Institution,
    Religious,
    Healthcare,
    Startup,
}

impl AccountType {
    pub const ALL: [AccountType; 9] = [
        AccountType::Organization,
        AccountType::Developer,
        AccountType::Freelancer,
        AccountType::Ngo,
        AccountType::Government,
        AccountType::Institution,
        AccountType::Religious,
        AccountType::Healthcare,
        AccountType::Startup,
    ];

    /// Parse a metadata tag. Matching ignores case and surrounding whitespace.
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        Self::ALL
            .into_iter()
            .find(|account| account.tag().eq_ignore_ascii_case(tag))
    }

    /// Resolve the account type for an optional tag, defaulting to `Organization`.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.and_then(Self::parse) {
            Some(account) => account,
            None => {
                if let Some(tag) = tag {
                    tracing::debug!(tag, "Unrecognized account type tag, using default");
                }
                Self::default()
            }
        }
    }

    /// The tag written into identity metadata.
    pub fn tag(&self) -> &'static str {
        match self {
            AccountType::Organization => "Organization",
            AccountType::Developer => "Developer",
            AccountType::Freelancer => "Freelancer",
            AccountType::Ngo => "NGO",
            AccountType::Government => "Government",
            AccountType::Institution => "Institution",
            AccountType::Religious => "Religious",
            AccountType::Healthcare => "Healthcare",
            AccountType::Startup => "Startup",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(AccountType::tag).collect();
            format!("unknown account type '{}' (expected one of: {})", s, known.join(", "))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!(AccountType::parse("Developer"), Some(AccountType::Developer));
        assert_eq!(AccountType::parse("ngo"), Some(AccountType::Ngo));
        assert_eq!(AccountType::parse(" Healthcare "), Some(AccountType::Healthcare));
        assert_eq!(AccountType::parse("Pirate"), None);
    }

    #[test]
    fn test_from_tag_defaults_to_organization() {
        assert_eq!(AccountType::from_tag(None), AccountType::Organization);
        assert_eq!(AccountType::from_tag(Some("")), AccountType::Organization);
        assert_eq!(AccountType::from_tag(Some("Pirate")), AccountType::Organization);
        assert_eq!(AccountType::from_tag(Some("Startup")), AccountType::Startup);
    }

    #[test]
    fn test_every_tag_parses_back() {
        for account in AccountType::ALL {
            assert_eq!(account.tag().parse::<AccountType>(), Ok(account));
        }
    }

    #[test]
    fn test_serde_uses_metadata_tags() {
        assert_eq!(serde_json::to_string(&AccountType::Ngo).unwrap(), r#""NGO""#);
        let parsed: AccountType = serde_json::from_str(r#""Government""#).unwrap();
        assert_eq!(parsed, AccountType::Government);
    }
}
