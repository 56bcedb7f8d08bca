//! Chat-specific error types.

use crate::domain::foundation::{AuthError, DomainError, ErrorCode, ValidationError};

/// Errors raised by chat operations.
///
/// Every variant is recoverable at the operation boundary: it becomes a
/// scoped `error` event on the originating connection or an HTTP response,
/// never a closed connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// No bearer token was presented.
    #[error("Token not provided")]
    MissingToken,

    /// Bearer token was malformed, forged or expired.
    #[error("Invalid token")]
    InvalidToken,

    /// Authenticated user acted on a chat they do not belong to.
    #[error("You do not have permission to send messages to this chat")]
    PermissionDenied,

    /// Referenced chat does not exist or is not visible to the user.
    #[error("Chat not found or access denied")]
    NotFound,

    /// Request payload failed validation.
    #[error("Validation failed for '{field}': {message}")]
    ValidationFailed { field: String, message: String },

    /// Chat row could not be persisted.
    #[error("Failed to create chat: {0}")]
    ChatCreationFailed(String),

    /// Store unavailable or query error.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl ChatError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ChatError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        ChatError::PersistenceFailure(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ChatError::MissingToken | ChatError::InvalidToken => ErrorCode::Unauthorized,
            ChatError::PermissionDenied => ErrorCode::Forbidden,
            ChatError::NotFound => ErrorCode::ChatNotFound,
            ChatError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            ChatError::ChatCreationFailed(_) => ErrorCode::ChatCreationFailed,
            ChatError::PersistenceFailure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Message safe to show to the client.
    ///
    /// Storage failures are reported generically so internals never leak.
    pub fn client_message(&self) -> String {
        match self {
            ChatError::ChatCreationFailed(_) => "Error creating the chat".to_string(),
            ChatError::PersistenceFailure(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// True for failures the server should log with full detail.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ChatError::ChatCreationFailed(_) | ChatError::PersistenceFailure(_)
        )
    }
}

impl From<ValidationError> for ChatError {
    fn from(err: ValidationError) -> Self {
        ChatError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for ChatError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => ChatError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::ChatNotFound => ChatError::NotFound,
            ErrorCode::Forbidden => ChatError::PermissionDenied,
            _ => ChatError::PersistenceFailure(err.to_string()),
        }
    }
}

impl From<AuthError> for ChatError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => ChatError::MissingToken,
            _ => ChatError::InvalidToken,
        }
    }
}
