use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// AuthError
///
/// Every way a bearer token or a login attempt can be refused. "No usable token"
/// (401) and "valid token, wrong role" (403) are kept apart because callers see
/// them as different outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("token does not exist")]
    MissingToken,
    #[error("malformed token")]
    MalformedToken,
    #[error("token expired")]
    ExpiredToken,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("insufficient role for this operation")]
    InsufficientRole,
    #[error("invalid email or password")]
    InvalidCredentials,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// CatalogError
///
/// The error taxonomy returned by every catalog, query and auth operation.
/// Nothing is retried inside the crate; the caller decides what to do with it.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Malformed or missing input, always detected before touching the store.
    #[error("validation error: {0}")]
    Validation(String),

    /// The username/email pair is already registered.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("not found: {0}")]
    NotFound(String),

    /// Any failure surfaced by Postgres, with the underlying cause attached.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// The password hashing capability failed.
    #[error("hashing error: {0}")]
    Hashing(String),

    /// A token could not be signed. A server fault, not a caller error.
    #[error("token signing error: {0}")]
    Signing(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CatalogError::Validation(msg.into())
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            CatalogError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            CatalogError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            CatalogError::Auth(err) => {
                let code = match err {
                    AuthError::InsufficientRole => "FORBIDDEN",
                    _ => "UNAUTHORIZED",
                };
                (err.status(), code, err.to_string())
            }
            CatalogError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            CatalogError::Storage(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            CatalogError::Signing(msg) => {
                tracing::error!(error = %msg, "Token signing error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            CatalogError::Hashing(msg) => {
                tracing::error!(error = %msg, "Password hashing error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

/// Returns true when a sqlx error is a Postgres unique-constraint violation (SQLSTATE 23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
