//! Bearer-token issuing and verification.
//!
//! Tokens are HMAC-signed JWTs carrying a [`TokenClaims`] payload. The signing
//! secret is fixed for the life of the process. Verification accepts only the
//! HMAC algorithm family, so a token re-labelled with another `alg` is refused.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, CatalogError, CatalogResult};

/// Claims
///
/// Payload embedded in every bearer token. Created at login, never mutated, and
/// decoded fresh on every verification. It holds no reference to a live user row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub username: String,
    /// Wire name is `admin`.
    #[serde(rename = "admin")]
    pub is_admin: bool,
    /// Expiration time (UTC Unix timestamp, seconds).
    pub exp: i64,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// TokenCodec
///
/// The issue/verify contract. Handlers and the authorization gate depend on this
/// trait only, so tests can substitute a deterministic stub.
pub trait TokenCodec: Send + Sync {
    /// Issues a signed token for `username` expiring one TTL from now.
    fn issue(&self, username: &str, is_admin: bool) -> CatalogResult<String>;

    /// Verifies signature, algorithm family and expiry, returning the decoded claims.
    fn verify(&self, token: &str) -> Result<TokenClaims, AuthError>;
}

/// TokenState
///
/// The concrete type used to share the codec across the application state.
pub type TokenState = Arc<dyn TokenCodec>;

/// JwtCodec
///
/// HMAC-SHA256 implementation of [`TokenCodec`] backed by `jsonwebtoken`.
pub struct JwtCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtCodec {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Issues a token with an explicit expiry instant.
    pub fn issue_expiring_at(
        &self,
        username: &str,
        is_admin: bool,
        expires_at: DateTime<Utc>,
    ) -> CatalogResult<String> {
        let claims = TokenClaims {
            username: username.to_string(),
            is_admin,
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CatalogError::Signing(e.to_string()))
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Any HMAC variant is accepted; every other family is rejected by the decoder.
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }
}

impl TokenCodec for JwtCodec {
    fn issue(&self, username: &str, is_admin: bool) -> CatalogResult<String> {
        self.issue_expiring_at(username, is_admin, Utc::now() + self.ttl)
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        match decode::<TokenClaims>(token, &self.decoding, &Self::validation()) {
            Ok(data) => Ok(data.claims),
            Err(e) => {
                let err = match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        AuthError::InvalidSignature
                    }
                    _ => AuthError::MalformedToken,
                };
                tracing::debug!(error = %e, "Token rejected");
                Err(err)
            }
        }
    }
}
