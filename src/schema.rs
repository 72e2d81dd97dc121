//! Startup-time verification and creation of the catalog's four tables.

use sqlx::PgPool;

/// TableSpec
///
/// One required table: its name, the columns the store reads and writes, the DDL
/// used to create it when absent, and idempotent index DDL applied on every start.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub create: &'static [&'static str],
    pub indexes: &'static [&'static str],
}

/// SchemaSpec
///
/// Immutable registry of required tables, built once at startup and passed to
/// [`ensure_schema`]. Tables are listed in dependency order (parents first).
#[derive(Debug, Clone)]
pub struct SchemaSpec {
    pub tables: Vec<TableSpec>,
}

impl SchemaSpec {
    pub fn catalog() -> Self {
        Self {
            tables: vec![
                TableSpec {
                    name: "users",
                    columns: &["id", "username", "email", "password", "adminflag"],
                    create: &["CREATE TABLE users (
                        id SERIAL PRIMARY KEY,
                        username VARCHAR(50) NOT NULL,
                        email VARCHAR(100) NOT NULL,
                        password VARCHAR(100) NOT NULL,
                        adminflag BOOLEAN NOT NULL DEFAULT false)"],
                    // Also installed on a pre-existing users table.
                    indexes: &[
                        "CREATE UNIQUE INDEX IF NOT EXISTS uq_users_username ON users (username)",
                        "CREATE UNIQUE INDEX IF NOT EXISTS uq_users_email ON users (email)",
                    ],
                },
                TableSpec {
                    name: "films",
                    columns: &["id", "title", "description", "release_date", "rating"],
                    create: &["CREATE TABLE films (
                        id SERIAL PRIMARY KEY,
                        title VARCHAR(150) NOT NULL,
                        description TEXT,
                        release_date DATE NOT NULL,
                        rating DECIMAL(3,1) NOT NULL CHECK (rating >= 0 AND rating <= 10))"],
                    indexes: &[],
                },
                TableSpec {
                    name: "actors",
                    columns: &["id", "name", "gender", "date_of_birth"],
                    create: &["CREATE TABLE actors (
                        id SERIAL PRIMARY KEY,
                        name VARCHAR(100) NOT NULL,
                        gender VARCHAR(10) NOT NULL,
                        date_of_birth DATE NOT NULL)"],
                    indexes: &[],
                },
                TableSpec {
                    name: "film_actors",
                    columns: &["film_id", "actor_id"],
                    create: &["CREATE TABLE film_actors (
                        film_id INTEGER REFERENCES films(id) ON DELETE CASCADE,
                        actor_id INTEGER REFERENCES actors(id) ON DELETE CASCADE,
                        PRIMARY KEY (film_id, actor_id))"],
                    indexes: &[],
                },
            ],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("table {table} is missing required columns: {missing:?}")]
    MissingColumns {
        table: &'static str,
        missing: Vec<&'static str>,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Columns of `table` that are required but absent from `existing`.
pub fn missing_columns(table: &TableSpec, existing: &[String]) -> Vec<&'static str> {
    table
        .columns
        .iter()
        .copied()
        .filter(|col| !existing.iter().any(|e| e == col))
        .collect()
}

/// ensure_schema
///
/// Creates each missing table. An existing table lacking a required column aborts
/// startup instead of being rebuilt, so no data is ever dropped here. Index DDL runs
/// for every table either way; existing duplicate rows make it fail and abort startup.
pub async fn ensure_schema(pool: &PgPool, spec: &SchemaSpec) -> Result<(), SchemaError> {
    for table in &spec.tables {
        ensure_table(pool, table).await?;
        for statement in table.indexes {
            sqlx::query(*statement).execute(pool).await?;
        }
    }
    Ok(())
}

async fn ensure_table(pool: &PgPool, table: &TableSpec) -> Result<(), SchemaError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name = $1)",
    )
    .bind(table.name)
    .fetch_one(pool)
    .await?;

    if !exists {
        tracing::info!(table = table.name, "Creating missing table");
        for statement in table.create {
            sqlx::query(*statement).execute(pool).await?;
        }
        return Ok(());
    }

    let existing = sqlx::query_scalar::<_, String>(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = $1",
    )
    .bind(table.name)
    .fetch_all(pool)
    .await?;

    let missing = missing_columns(table, &existing);
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns {
            table: table.name,
            missing,
        });
    }
    tracing::debug!(table = table.name, "Table present with required columns");
    Ok(())
}
