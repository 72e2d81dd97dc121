use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::{CatalogError, CatalogResult};

/// Store-assigned identifiers (Postgres `SERIAL`).
pub type ActorId = i32;
pub type FilmId = i32;

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 10.0;

// --- Catalog Entities (Mapped to Database) ---

/// Actor
///
/// A row of the `actors` table. `id` is absent/zero on creation and assigned by the
/// store; `birthdate` is carried as text and not validated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Actor {
    #[serde(default)]
    pub id: ActorId,
    pub name: String,
    pub gender: String,
    // Stored in the `date_of_birth` column.
    pub birthdate: String,
}

/// Film
///
/// A row of the `films` table. `actors` holds the ids linked through `film_actors`:
/// on creation it names the links to insert, on reads it is aggregated from the link table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Film {
    #[serde(default)]
    pub id: FilmId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub release_date: String,
    pub rating: f64,
    #[serde(default)]
    pub actors: Vec<ActorId>,
}

impl Film {
    /// Checks run before `create_film` writes anything.
    pub fn validate_new(&self) -> CatalogResult<()> {
        if self.title.is_empty() {
            return Err(CatalogError::validation("film title is required"));
        }
        self.validate_rating()
    }

    /// Rating must be a finite value within [0, 10].
    pub fn validate_rating(&self) -> CatalogResult<()> {
        if !self.rating.is_finite() || self.rating < MIN_RATING || self.rating > MAX_RATING {
            return Err(CatalogError::validation(format!(
                "rating must be between {MIN_RATING} and {MAX_RATING}, got {}",
                self.rating
            )));
        }
        Ok(())
    }
}

/// ActorWithFilms
///
/// List response for actors. `film_titles` is `None` when the actor appears in no film.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ActorWithFilms {
    pub id: ActorId,
    pub name: String,
    pub film_titles: Option<Vec<String>>,
}

/// Credentials
///
/// What login needs from the `users` table. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct Credentials {
    pub username: String,
    #[sqlx(rename = "password")]
    pub password_hash: String,
    #[sqlx(rename = "adminflag")]
    pub is_admin: bool,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Input payload for `POST /user/register`. The password is hashed before it reaches
/// the store and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// TokenResponse
///
/// Output of a successful login: the signed bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// DeleteRequest
///
/// Body of the delete endpoints. A missing id deserializes to 0 and is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DeleteRequest {
    #[serde(default)]
    pub id: i32,
}

impl DeleteRequest {
    pub fn require_id(&self, entity: &str) -> CatalogResult<i32> {
        if self.id <= 0 {
            return Err(CatalogError::validation(format!("{entity} ID is required")));
        }
        Ok(self.id)
    }
}
