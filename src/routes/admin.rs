use crate::{AppState, handlers};
use axum::{
    Router,
    routing::post,
};

/// Admin Router Module
///
/// Catalog mutations. Wrapped by `admin_middleware`: a missing or bad token is
/// rejected with 401, a valid token without the admin flag with 403.
///
/// These share paths with the authenticated reads and differ only by method, so
/// the two routers are merged at the top level.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST/PATCH/DELETE /actors
        // DELETE takes `{"id": n}` in the body and removes the actor's film links first.
        .route(
            "/actors",
            post(handlers::create_actor)
                .patch(handlers::update_actor)
                .delete(handlers::delete_actor),
        )
        // POST/PATCH/DELETE /films
        // POST inserts the film and its actor links as one unit of work.
        .route(
            "/films",
            post(handlers::create_film)
                .patch(handlers::update_film)
                .delete(handlers::delete_film),
        )
}
