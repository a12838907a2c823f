use std::any::Any;

use thiserror::Error;

use crate::provider::ProviderError;

/// Why an auth action did not succeed.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The provider reported the failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The provider call blew up instead of returning an error.
    #[error("Unexpected failure during {operation}: {message}")]
    Unexpected {
        operation: &'static str,
        message: String,
    },
}

impl AuthError {
    /// Human-readable message, suitable for showing next to a form.
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            AuthError::Provider(e) => Some(e),
            AuthError::Unexpected { .. } => None,
        }
    }
}

/// Result of an auth action: `error` is `None` on success.
///
/// Actions never fail outright; callers branch on `error`.
#[derive(Debug, Default)]
#[must_use]
pub struct AuthOutcome {
    pub error: Option<AuthError>,
}

impl AuthOutcome {
    pub fn success() -> Self {
        Self { error: None }
    }

    pub fn failure(error: AuthError) -> Self {
        Self { error: Some(error) }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<(), AuthError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl From<Result<(), AuthError>> for AuthOutcome {
    fn from(result: Result<(), AuthError>) -> Self {
        Self { error: result.err() }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_result() {
        assert!(AuthOutcome::from(Ok(())).is_ok());

        let outcome = AuthOutcome::from(Err(AuthError::Provider(ProviderError::Rejected(
            "Invalid credentials".to_string(),
        ))));
        assert!(!outcome.is_ok());
        assert_eq!(outcome.error.as_ref().unwrap().message(), "Invalid credentials");
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn test_panic_message_payloads() {
        let static_str: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*static_str), "boom");

        let owned: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(&*owned), "kaboom");

        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*other), "panic with non-string payload");
    }
}
