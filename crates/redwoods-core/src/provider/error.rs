use serde::Deserialize;
use thiserror::Error;

/// Failures reported by (or while talking to) the identity provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider rejected the credentials; the message is the provider's.
    #[error("{0}")]
    InvalidCredentials(String),

    /// The provider refused the request, e.g. a weak password or an
    /// expired one-time code.
    #[error("{0}")]
    Rejected(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No active session")]
    MissingSession,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// The shapes GoTrue-style services use for error bodies.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl ErrorBody {
    fn message(&self) -> Option<String> {
        self.error_description
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.message.clone())
            .or_else(|| self.error.clone())
            .filter(|m| !m.trim().is_empty())
    }
}

impl ProviderError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .message()
            .unwrap_or_else(|| Self::truncate_body(body));

        match status.as_u16() {
            400 if parsed.error.as_deref() == Some("invalid_grant") => {
                ProviderError::InvalidCredentials(message)
            }
            400 | 404 | 409 | 422 => ProviderError::Rejected(message),
            401 | 403 => ProviderError::Unauthorized,
            429 => ProviderError::RateLimited,
            500..=599 => ProviderError::ServerError(message),
            _ => ProviderError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// True when retrying with the same session cannot succeed.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            ProviderError::InvalidCredentials(_)
                | ProviderError::Unauthorized
                | ProviderError::MissingSession
        )
    }
}
