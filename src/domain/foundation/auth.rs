//! Authentication types for the domain layer.
//!
//! These types represent an identity extracted from a verified bearer token.
//! They have **no external dependencies**; any token verifier can populate
//! them through the `SessionValidator` port.

use super::UserId;
use thiserror::Error;

/// Identity extracted from a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Stable user identifier from the token subject.
    pub id: UserId,

    /// Display name if the token carries one.
    pub display_name: Option<String>,
}

impl AuthenticatedUser {
    /// Creates a new authenticated user.
    pub fn new(id: UserId, display_name: Option<String>) -> Self {
        Self { id, display_name }
    }

    /// Returns the display name, or the user id as fallback.
    pub fn display_name_or_id(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Authentication errors that can occur during token verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No token was presented.
    #[error("Token not provided")]
    MissingToken,

    /// The token is malformed or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token signature is valid but it has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The verifier could not run (misconfiguration, remote outage).
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this error indicates the client should re-authenticate.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::TokenExpired
        )
    }

    /// Stable machine-readable code for HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidToken | AuthError::TokenExpired => "INVALID_TOKEN",
            AuthError::ServiceUnavailable(_) => "AUTH_UNAVAILABLE",
        }
    }
}
