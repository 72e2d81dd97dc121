use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    AppState,
    auth::{AdminUser, AuthUser},
    error::{AuthError, CatalogError, CatalogResult},
    models::{
        Actor, ActorWithFilms, DeleteRequest, Film, LoginRequest, RegisterUserRequest,
        TokenResponse,
    },
    password,
    query::FilmQuery,
};

/// ActorFilter
///
/// Query parameters for `GET /actors`.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ActorFilter {
    /// Substring of the actor's name (case-sensitive).
    pub fragment: Option<String>,
}

// --- Users ---

/// register_user
///
/// [Public Route] Hashes the password and stores the user. Fails with 409 if the
/// username or the email is already taken.
#[utoipa::path(
    post,
    path = "/user/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered"),
        (status = 409, description = "Username or email taken")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> CatalogResult<StatusCode> {
    if payload.username.is_empty() || payload.email.is_empty() || payload.password.is_empty() {
        return Err(CatalogError::validation(
            "username, email and password are required",
        ));
    }

    let password_hash = password::hash_password(&payload.password)?;
    state
        .store
        .register_user(&payload.username, &payload.email, &password_hash)
        .await?;

    tracing::info!(username = %payload.username, "User registered");
    Ok(StatusCode::CREATED)
}

/// login
///
/// [Public Route] Checks the password against the stored hash and issues a bearer
/// token carrying the stored username and admin flag. Unknown email and wrong
/// password are reported identically.
#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> CatalogResult<Json<TokenResponse>> {
    let credentials = match state.store.get_user_credentials(&payload.email).await {
        Ok(credentials) => credentials,
        Err(CatalogError::NotFound(_)) => return Err(AuthError::InvalidCredentials.into()),
        Err(e) => return Err(e),
    };

    if !password::verify_password(&payload.password, &credentials.password_hash)? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state
        .tokens
        .issue(&credentials.username, credentials.is_admin)?;
    Ok(Json(TokenResponse { token }))
}

// --- Actors ---

/// get_actors
///
/// [Authenticated Route] Lists actors, optionally filtered by a name fragment, each
/// with the titles of the films they appear in.
#[utoipa::path(
    get,
    path = "/actors",
    params(ActorFilter),
    responses((status = 200, description = "Actors", body = [ActorWithFilms]))
)]
pub async fn get_actors(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<ActorFilter>,
) -> CatalogResult<Json<Vec<ActorWithFilms>>> {
    // An empty fragment means no filter.
    let fragment = filter.fragment.as_deref().filter(|f| !f.is_empty());
    Ok(Json(state.store.list_actors(fragment).await?))
}

/// create_actor
///
/// [Admin Route] Adds an actor. Names are not unique.
#[utoipa::path(
    post,
    path = "/actors",
    request_body = Actor,
    responses((status = 201, description = "Created", body = i32))
)]
pub async fn create_actor(
    AdminUser { username }: AdminUser,
    State(state): State<AppState>,
    Json(actor): Json<Actor>,
) -> CatalogResult<(StatusCode, Json<i32>)> {
    let id = state.store.create_actor(&actor).await?;
    tracing::info!(%username, actor_id = id, "Actor created");
    Ok((StatusCode::CREATED, Json(id)))
}

/// update_actor
///
/// [Admin Route] Overwrites name, gender and birthdate of the actor with `id`.
/// An unknown id is a silent no-op (200).
#[utoipa::path(
    patch,
    path = "/actors",
    request_body = Actor,
    responses((status = 200, description = "Updated"))
)]
pub async fn update_actor(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(actor): Json<Actor>,
) -> CatalogResult<StatusCode> {
    state.store.update_actor(&actor).await?;
    Ok(StatusCode::OK)
}

/// delete_actor
///
/// [Admin Route] Removes the actor and every film link that references it.
#[utoipa::path(
    delete,
    path = "/actors",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Deleted"),
        (status = 400, description = "Missing id")
    )
)]
pub async fn delete_actor(
    AdminUser { username }: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<DeleteRequest>,
) -> CatalogResult<StatusCode> {
    let id = payload.require_id("Actor")?;
    state.store.delete_actor(id).await?;
    tracing::info!(%username, actor_id = id, "Actor deleted");
    Ok(StatusCode::OK)
}

// --- Films ---

/// get_films
///
/// [Authenticated Route] Lists or searches films. Recognized parameters:
/// `sortby` (rating | title | release_date), `asc`, and one of `actor`, `title`,
/// `actor_title`.
#[utoipa::path(
    get,
    path = "/films",
    params(
        ("sortby" = Option<String>, Query, description = "rating | title | release_date"),
        ("asc" = Option<bool>, Query, description = "Ascending order (default false)"),
        ("actor" = Option<String>, Query, description = "Actor name fragment"),
        ("title" = Option<String>, Query, description = "Title fragment"),
        ("actor_title" = Option<String>, Query, description = "Actor name or title fragment")
    ),
    responses(
        (status = 200, description = "Films", body = [Film]),
        (status = 400, description = "Invalid or conflicting parameters")
    )
)]
pub async fn get_films(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> CatalogResult<Json<Vec<Film>>> {
    let lookup = FilmQuery::from_params(params).resolve()?;
    tracing::debug!(?lookup, "Resolved film query");
    Ok(Json(lookup.run(state.store.as_ref()).await?))
}

/// create_film
///
/// [Admin Route] Adds a film together with its actor links. Empty title or an
/// out-of-range rating is rejected with 400 before anything is written.
#[utoipa::path(
    post,
    path = "/films",
    request_body = Film,
    responses(
        (status = 201, description = "Created", body = i32),
        (status = 400, description = "Invalid film")
    )
)]
pub async fn create_film(
    AdminUser { username }: AdminUser,
    State(state): State<AppState>,
    Json(film): Json<Film>,
) -> CatalogResult<(StatusCode, Json<i32>)> {
    let id = state.store.create_film(&film).await?;
    tracing::info!(%username, film_id = id, links = film.actors.len(), "Film created");
    Ok((StatusCode::CREATED, Json(id)))
}

/// update_film
///
/// [Admin Route] Overwrites the film's scalar fields; actor links are untouched.
#[utoipa::path(
    patch,
    path = "/films",
    request_body = Film,
    responses((status = 200, description = "Updated"))
)]
pub async fn update_film(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(film): Json<Film>,
) -> CatalogResult<StatusCode> {
    state.store.update_film(&film).await?;
    Ok(StatusCode::OK)
}

/// delete_film
///
/// [Admin Route] Removes the film and its actor links.
#[utoipa::path(
    delete,
    path = "/films",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Deleted"),
        (status = 400, description = "Missing id")
    )
)]
pub async fn delete_film(
    AdminUser { username }: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<DeleteRequest>,
) -> CatalogResult<StatusCode> {
    let id = payload.require_id("Film")?;
    state.store.delete_film(id).await?;
    tracing::info!(%username, film_id = id, "Film deleted");
    Ok(StatusCode::OK)
}
