use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Read access to the catalog. Wrapped by `auth_middleware`, so every request here
/// already carries a valid token; the role is not checked.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /actors?fragment=...
        .route("/actors", get(handlers::get_actors))
        // GET /films?sortby=...&asc=...  |  ?actor=...  |  ?title=...  |  ?actor_title=...
        // Parameter precedence is decided by `FilmQuery::resolve`.
        .route("/films", get(handlers::get_films))
}
