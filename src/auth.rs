use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{
    error::{AuthError, CatalogError},
    token::{TokenClaims, TokenCodec, TokenState},
};

/// AccessLevel
///
/// The access requirement attached to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// Anyone, with or without a token.
    Public,
    /// Any caller holding a well-formed, correctly signed, unexpired token.
    AuthenticatedAny,
    /// As `AuthenticatedAny`, and the claims must carry the admin flag.
    AdminOnly,
}

/// authorize
///
/// The role gate: a pure function of (token-or-absence, required level).
///
/// Returns the verified claims when a token was checked, `None` for public access.
/// The decision trusts the claims as issued; the user store is not consulted again.
pub fn authorize(
    codec: &dyn TokenCodec,
    token: Option<&str>,
    level: AccessLevel,
) -> Result<Option<TokenClaims>, AuthError> {
    if level == AccessLevel::Public {
        return Ok(None);
    }

    let token = token.ok_or(AuthError::MissingToken)?;
    let claims = codec.verify(token)?;

    if level == AccessLevel::AdminOnly && !claims.is_admin {
        tracing::warn!(username = %claims.username, "Admin operation denied");
        return Err(AuthError::InsufficientRole);
    }

    Ok(Some(claims))
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
/// Any other shape is treated as no token at all.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty() && !token.contains(' '))
}

fn authorize_parts<S>(
    parts: &Parts,
    state: &S,
    level: AccessLevel,
) -> Result<TokenClaims, CatalogError>
where
    TokenState: FromRef<S>,
{
    let codec = TokenState::from_ref(state);
    authorize(codec.as_ref(), bearer_token(parts), level)?
        .ok_or(CatalogError::Auth(AuthError::MissingToken))
}

/// AuthUser Extractor Result
///
/// The resolved identity of a request that passed the `AuthenticatedAny` gate.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub is_admin: bool,
}

impl From<TokenClaims> for AuthUser {
    fn from(claims: TokenClaims) -> Self {
        Self {
            username: claims.username,
            is_admin: claims.is_admin,
        }
    }
}

/// Rejects with 401 unless a valid bearer token is present.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenState: FromRef<S>,
{
    type Rejection = CatalogError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authorize_parts(parts, state, AccessLevel::AuthenticatedAny).map(AuthUser::from)
    }
}

/// AdminUser Extractor Result
///
/// The resolved identity of a request that passed the `AdminOnly` gate.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub username: String,
}

/// Rejects with 401 on a missing/bad token and 403 on a valid non-admin token.
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    TokenState: FromRef<S>,
{
    type Rejection = CatalogError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authorize_parts(parts, state, AccessLevel::AdminOnly).map(|claims| AdminUser {
            username: claims.username,
        })
    }
}
