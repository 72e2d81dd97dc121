use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core catalog and authorization components.
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod password;
pub mod query;
pub mod repository;
pub mod schema;
pub mod token;

// Thin HTTP glue.
pub mod handlers;
pub mod routes;
use auth::{AdminUser, AuthUser};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AuthError, CatalogError, CatalogResult};
pub use repository::{CatalogState, CatalogStore, PostgresCatalogStore};
pub use token::{JwtCodec, TokenCodec, TokenState};

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers and the
/// `ToSchema` models, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login,
        handlers::get_actors, handlers::create_actor, handlers::update_actor, handlers::delete_actor,
        handlers::get_films, handlers::create_film, handlers::update_film, handlers::delete_film,
    ),
    components(
        schemas(
            models::Actor, models::Film, models::ActorWithFilms, models::RegisterUserRequest,
            models::LoginRequest, models::TokenResponse, models::DeleteRequest,
        )
    ),
    tags(
        (name = "cinema-library", description = "Film and actor catalog API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Catalog persistence (actors, films, links, users).
    pub store: CatalogState,
    /// Bearer token issuing and verification.
    pub tokens: TokenState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Wires the production token codec from the configured secret and TTL.
    pub fn new(store: CatalogState, config: AppConfig) -> Self {
        let tokens = std::sync::Arc::new(JwtCodec::new(
            &config.jwt_secret,
            chrono::Duration::hours(config.token_ttl_hours),
        )) as TokenState;
        Self {
            store,
            tokens,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for CatalogState {
    fn from_ref(app_state: &AppState) -> CatalogState {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for TokenState {
    fn from_ref(app_state: &AppState) -> TokenState {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Lets the request through only if `AuthUser` can be extracted (valid, unexpired
/// token of any role); otherwise the extractor's 401 is returned.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// As `auth_middleware`, but the token must carry the admin flag (403 otherwise).
async fn admin_middleware(_admin: AdminUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies the access-level layers and the
/// observability stack, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Reads and writes share paths; each method keeps its own layer after the merge.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .merge(admin::admin_routes().route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_middleware,
        )))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of a request shares its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
