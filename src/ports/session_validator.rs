//! Session validation port for bearer tokens.
//!
//! This port defines the contract for validating access tokens and extracting
//! user identity. HTTP middleware and the realtime handshake both go through
//! it, so a connection is never admitted on weaker checks than a request.
//!
//! # Example Implementation
//!
//! ```ignore
//! pub struct JwtSessionValidator { ... }
//!
//! #[async_trait]
//! impl SessionValidator for JwtSessionValidator {
//!     async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
//!         // 1. Verify the HS256 signature
//!         // 2. Check exp (with leeway)
//!         // 3. Map the subject claim to AuthenticatedUser
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts user identity.
///
/// # Contract
///
/// Implementations must:
/// - Return `AuthError::MissingToken` for a blank token
/// - Return `AuthError::InvalidToken` for malformed/bad signature tokens
/// - Return `AuthError::TokenExpired` for expired tokens
/// - Be deterministic for a given token and clock
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a raw token (without "Bearer " prefix) and return the user.
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
