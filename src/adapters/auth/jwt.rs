//! HS256 JWT session validator.
//!
//! Tokens are signed with a shared secret by the account service. The user
//! id travels in `sub`; tokens minted by older clients carry it in `id`
//! instead (string or number), and both are accepted.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::SessionValidator;

/// Subject claim, textual or numeric.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum SubjectClaim {
    Text(String),
    Number(i64),
}

impl SubjectClaim {
    fn into_string(self) -> String {
        match self {
            SubjectClaim::Text(s) => s,
            SubjectClaim::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<SubjectClaim>,

    /// Legacy subject claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<SubjectClaim>,

    exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

/// Verifies HS256 bearer tokens signed with a shared secret.
pub struct JwtSessionValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    leeway_secs: u64,
}

impl JwtSessionValidator {
    pub fn new(secret: &Secret<String>, leeway_secs: u64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            leeway_secs,
        }
    }

    /// Mints a token for `user_id` valid for `ttl`.
    ///
    /// Used by local tooling and tests; production tokens come from the
    /// account service.
    pub fn issue_token(
        &self,
        user_id: &UserId,
        name: Option<&str>,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: Some(SubjectClaim::Text(user_id.to_string())),
            id: None,
            exp: (now + ttl).timestamp(),
            iat: Some(now.timestamp()),
            name: name.map(str::to_string),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::service_unavailable(format!("failed to sign token: {}", e)))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation()).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Token expired");
                    AuthError::TokenExpired
                }
                _ => {
                    tracing::debug!("Token validation failed: {}", e);
                    AuthError::InvalidToken
                }
            }
        })?;

        let claims = data.claims;
        let subject = claims.sub.or(claims.id).ok_or_else(|| {
            tracing::warn!("Token carries no subject claim");
            AuthError::InvalidToken
        })?;

        let user_id = UserId::new(subject.into_string()).map_err(|_| {
            tracing::warn!("Token subject is blank");
            AuthError::InvalidToken
        })?;

        Ok(AuthenticatedUser::new(user_id, claims.name))
    }
}
