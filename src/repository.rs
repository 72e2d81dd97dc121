use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::{
    error::{CatalogError, CatalogResult, is_unique_violation},
    models::{Actor, ActorId, ActorWithFilms, Credentials, Film, FilmId},
    query::SortField,
};

/// Projection shared by every film read. `rating` and `release_date` are cast so they
/// decode into `f64` / `String`; `actors` is aggregated from the link table.
const FILM_COLUMNS: &str = "f.id, f.title, f.description, f.release_date::text AS release_date, \
    f.rating::float8 AS rating, \
    ARRAY(SELECT fa2.actor_id FROM film_actors AS fa2 WHERE fa2.film_id = f.id ORDER BY fa2.actor_id) AS actors";

/// Substring match with `LIKE`, so it is case-sensitive.
const CONTAINS: &str = "LIKE '%' || $1 || '%'";

/// CatalogStore Trait
///
/// The persistence contract for actors, films, their links and users. Handlers and
/// the query resolver work against `Arc<dyn CatalogStore>` and never see SQL.
///
/// Every store failure comes back as `CatalogError::Storage` with the sqlx cause
/// attached; nothing is retried here.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // --- Actors ---
    async fn create_actor(&self, actor: &Actor) -> CatalogResult<ActorId>;
    /// An unknown id updates zero rows and still returns `Ok(())`.
    async fn update_actor(&self, actor: &Actor) -> CatalogResult<()>;
    /// Removes the actor's links, then the actor row.
    async fn delete_actor(&self, id: ActorId) -> CatalogResult<()>;
    /// All actors, or those whose name contains `fragment`, each with their film titles.
    async fn list_actors(&self, fragment: Option<&str>) -> CatalogResult<Vec<ActorWithFilms>>;

    // --- Films ---
    /// Inserts the film and one link per actor id as a single unit of work.
    async fn create_film(&self, film: &Film) -> CatalogResult<FilmId>;
    /// Leaves actor links untouched. An unknown id is not an error.
    async fn update_film(&self, film: &Film) -> CatalogResult<()>;
    /// Removes the film's links, then the film row.
    async fn delete_film(&self, id: FilmId) -> CatalogResult<()>;
    async fn list_films(&self, sort: SortField, ascending: bool) -> CatalogResult<Vec<Film>>;
    /// One row per matching (film, actor) pair; not deduplicated.
    async fn search_films_by_actor_fragment(&self, fragment: &str) -> CatalogResult<Vec<Film>>;
    async fn search_films_by_title_fragment(&self, fragment: &str) -> CatalogResult<Vec<Film>>;
    /// Actor-name matches followed by title matches (`UNION ALL`, duplicates kept).
    async fn search_films_by_fragment(&self, fragment: &str) -> CatalogResult<Vec<Film>>;

    // --- Users ---
    /// Users whose username OR email matches.
    async fn count_users_with_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> CatalogResult<i64>;
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> CatalogResult<()>;
    /// Uniqueness check followed by insert, in one transaction. A taken username or
    /// email yields `CatalogError::Conflict`.
    async fn register_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> CatalogResult<()>;
    async fn get_user_credentials(&self, email: &str) -> CatalogResult<Credentials>;
}

/// CatalogState
///
/// The concrete type used to share the persistence layer across the application state.
pub type CatalogState = Arc<dyn CatalogStore>;

/// PostgresCatalogStore
///
/// The `CatalogStore` implementation backed by PostgreSQL.
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fills in the film titles of each actor, one lookup per actor.
    async fn attach_film_titles(
        &self,
        actors: Vec<(ActorId, String)>,
    ) -> CatalogResult<Vec<ActorWithFilms>> {
        let mut out = Vec::with_capacity(actors.len());
        for (id, name) in actors {
            let titles = self.film_titles_for_actor(id).await?;
            out.push(ActorWithFilms {
                id,
                name,
                film_titles: (!titles.is_empty()).then_some(titles),
            });
        }
        Ok(out)
    }

    async fn film_titles_for_actor(&self, actor_id: ActorId) -> CatalogResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT f.title FROM films AS f JOIN film_actors AS fa ON f.id = fa.film_id \
             WHERE fa.actor_id = $1 ORDER BY f.id",
        )
        .bind(actor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("film_titles_for_actor", e))
    }

    async fn fetch_films(
        &self,
        op: &'static str,
        sql: &str,
        fragment: &str,
    ) -> CatalogResult<Vec<Film>> {
        sqlx::query_as::<_, Film>(sql)
            .bind(fragment)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error(op, e))
    }

    async fn count_users_in(
        tx: &mut Transaction<'_, Postgres>,
        username: &str,
        email: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = $1 OR email = $2")
            .bind(username)
            .bind(email)
            .fetch_one(&mut **tx)
            .await
    }
}

/// Logs a store failure with the operation that hit it and wraps it as `Storage`.
fn storage_error(op: &'static str, err: sqlx::Error) -> CatalogError {
    tracing::error!(operation = op, error = %err, "Catalog store operation failed");
    CatalogError::Storage(err)
}

fn actor_by_film_sql() -> String {
    format!(
        "SELECT {FILM_COLUMNS} FROM films AS f \
         JOIN film_actors AS fa ON f.id = fa.film_id \
         JOIN actors AS a ON fa.actor_id = a.id \
         WHERE a.name {CONTAINS}"
    )
}

fn title_sql() -> String {
    format!("SELECT {FILM_COLUMNS} FROM films AS f WHERE f.title {CONTAINS}")
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn create_actor(&self, actor: &Actor) -> CatalogResult<ActorId> {
        sqlx::query_scalar::<_, ActorId>(
            "INSERT INTO actors (name, gender, date_of_birth) VALUES ($1, $2, $3::date) RETURNING id",
        )
        .bind(&actor.name)
        .bind(&actor.gender)
        .bind(&actor.birthdate)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_error("create_actor", e))
    }

    async fn update_actor(&self, actor: &Actor) -> CatalogResult<()> {
        let result = sqlx::query(
            "UPDATE actors SET name = $1, gender = $2, date_of_birth = $3::date WHERE id = $4",
        )
        .bind(&actor.name)
        .bind(&actor.gender)
        .bind(&actor.birthdate)
        .bind(actor.id)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("update_actor", e))?;

        if result.rows_affected() == 0 {
            tracing::debug!(actor_id = actor.id, "update_actor matched no rows");
        }
        Ok(())
    }

    /// delete_actor
    ///
    /// Links first, then the actor, inside one transaction. If the link delete fails
    /// the actor delete is never issued, and dropping the uncommitted transaction
    /// leaves every row as it was.
    async fn delete_actor(&self, id: ActorId) -> CatalogResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| storage_error("delete_actor", e))?;

        sqlx::query("DELETE FROM film_actors WHERE actor_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("delete_actor.links", e))?;

        sqlx::query("DELETE FROM actors WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("delete_actor.row", e))?;

        tx.commit().await.map_err(|e| storage_error("delete_actor", e))
    }

    async fn list_actors(&self, fragment: Option<&str>) -> CatalogResult<Vec<ActorWithFilms>> {
        let filtered_sql = format!("SELECT id, name FROM actors WHERE name {CONTAINS} ORDER BY id");
        let rows = match fragment {
            Some(fragment) => {
                sqlx::query_as::<_, (ActorId, String)>(&filtered_sql)
                    .bind(fragment)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as::<_, (ActorId, String)>("SELECT id, name FROM actors ORDER BY id")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| storage_error("list_actors", e))?;

        self.attach_film_titles(rows).await
    }

    /// create_film
    ///
    /// Validates before any write, then inserts the film and its links in one
    /// transaction. A failing link insert rolls the film row back with it.
    async fn create_film(&self, film: &Film) -> CatalogResult<FilmId> {
        film.validate_new()?;

        let mut tx = self.pool.begin().await.map_err(|e| storage_error("create_film", e))?;

        let film_id = sqlx::query_scalar::<_, FilmId>(
            "INSERT INTO films (title, description, release_date, rating) \
             VALUES ($1, $2, $3::date, $4) RETURNING id",
        )
        .bind(&film.title)
        .bind(&film.description)
        .bind(&film.release_date)
        .bind(film.rating)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| storage_error("create_film.row", e))?;

        for actor_id in &film.actors {
            sqlx::query("INSERT INTO film_actors (film_id, actor_id) VALUES ($1, $2)")
                .bind(film_id)
                .bind(*actor_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| storage_error("create_film.link", e))?;
        }

        tx.commit().await.map_err(|e| storage_error("create_film", e))?;
        Ok(film_id)
    }

    async fn update_film(&self, film: &Film) -> CatalogResult<()> {
        film.validate_rating()?;

        let result = sqlx::query(
            "UPDATE films SET title = $2, description = $3, release_date = $4::date, rating = $5 \
             WHERE id = $1",
        )
        .bind(film.id)
        .bind(&film.title)
        .bind(&film.description)
        .bind(&film.release_date)
        .bind(film.rating)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("update_film", e))?;

        if result.rows_affected() == 0 {
            tracing::debug!(film_id = film.id, "update_film matched no rows");
        }
        Ok(())
    }

    /// delete_film
    ///
    /// Same cascade discipline as `delete_actor`: links, then the film row.
    async fn delete_film(&self, id: FilmId) -> CatalogResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| storage_error("delete_film", e))?;

        sqlx::query("DELETE FROM film_actors WHERE film_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("delete_film.links", e))?;

        sqlx::query("DELETE FROM films WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("delete_film.row", e))?;

        tx.commit().await.map_err(|e| storage_error("delete_film", e))
    }

    async fn list_films(&self, sort: SortField, ascending: bool) -> CatalogResult<Vec<Film>> {
        let direction = if ascending { "ASC" } else { "DESC" };
        // Only the enum's fixed column and a fixed keyword are interpolated.
        let sql = format!(
            "SELECT {FILM_COLUMNS} FROM films AS f ORDER BY {} {direction}, f.id ASC",
            sort.column()
        );

        sqlx::query_as::<_, Film>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("list_films", e))
    }

    async fn search_films_by_actor_fragment(&self, fragment: &str) -> CatalogResult<Vec<Film>> {
        self.fetch_films("search_films_by_actor_fragment", &actor_by_film_sql(), fragment)
            .await
    }

    async fn search_films_by_title_fragment(&self, fragment: &str) -> CatalogResult<Vec<Film>> {
        self.fetch_films("search_films_by_title_fragment", &title_sql(), fragment)
            .await
    }

    async fn search_films_by_fragment(&self, fragment: &str) -> CatalogResult<Vec<Film>> {
        let sql = format!("({}) UNION ALL ({})", actor_by_film_sql(), title_sql());
        self.fetch_films("search_films_by_fragment", &sql, fragment).await
    }

    async fn count_users_with_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> CatalogResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = $1 OR email = $2")
            .bind(username)
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage_error("count_users_with_username_or_email", e))
    }

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> CatalogResult<()> {
        sqlx::query("INSERT INTO users (username, email, password) VALUES ($1, $2, $3)")
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| user_insert_error(username, e))
    }

    /// register_user
    ///
    /// The count is only a fast-path rejection: two concurrent registrations can both
    /// see zero. The unique indexes on `users` are what actually enforce uniqueness,
    /// and their violation is reported as the same `Conflict`.
    async fn register_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> CatalogResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| storage_error("register_user", e))?;

        let existing = Self::count_users_in(&mut tx, username, email)
            .await
            .map_err(|e| storage_error("register_user.count", e))?;
        if existing > 0 {
            return Err(CatalogError::Conflict(
                "username or email already registered".to_string(),
            ));
        }

        sqlx::query("INSERT INTO users (username, email, password) VALUES ($1, $2, $3)")
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| user_insert_error(username, e))?;

        tx.commit().await.map_err(|e| storage_error("register_user", e))
    }

    async fn get_user_credentials(&self, email: &str) -> CatalogResult<Credentials> {
        sqlx::query_as::<_, Credentials>(
            "SELECT username, password, adminflag FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("get_user_credentials", e))?
        .ok_or_else(|| CatalogError::NotFound(format!("no user with email {email}")))
    }
}

fn user_insert_error(username: &str, err: sqlx::Error) -> CatalogError {
    if is_unique_violation(&err) {
        tracing::info!(username, "Registration rejected by unique constraint");
        return CatalogError::Conflict("username or email already registered".to_string());
    }
    storage_error("create_user", err)
}
