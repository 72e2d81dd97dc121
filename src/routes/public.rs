use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /user/register
        .route("/user/register", post(handlers::register_user))
        // POST /user/login
        // Exchanges email + password for a bearer token valid for the configured TTL.
        .route("/user/login", post(handlers::login))
}
