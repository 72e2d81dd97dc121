//! Resolution of `GET /films` query parameters into exactly one catalog call.

use std::collections::HashMap;
use std::str::FromStr;

use crate::{
    error::{CatalogError, CatalogResult},
    models::Film,
    repository::CatalogStore,
};

/// SortField
///
/// The closed set of columns a film listing may be ordered by. Only these map to
/// SQL; caller text never reaches an identifier position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Rating,
    Title,
    ReleaseDate,
}

impl SortField {
    /// Lenient resolution: anything unrecognized, including the empty string, is `Rating`.
    pub fn resolve(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Fixed column reference used in `ORDER BY`.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Rating => "f.rating",
            SortField::Title => "f.title",
            SortField::ReleaseDate => "f.release_date",
        }
    }
}

impl FromStr for SortField {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rating" => Ok(SortField::Rating),
            "title" => Ok(SortField::Title),
            "release_date" => Ok(SortField::ReleaseDate),
            other => Err(CatalogError::validation(format!(
                "invalid value for sortby: {other:?}"
            ))),
        }
    }
}

/// Parses a boolean the way the query layer always has: `1 t T TRUE true True`
/// and `0 f F FALSE false False`.
pub fn parse_bool_lenient(value: &str) -> CatalogResult<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(CatalogError::validation(format!(
            "invalid value for asc: {other:?}"
        ))),
    }
}

/// FilmQuery
///
/// The recognized parameters of a film listing request. A parameter that is
/// present with an empty value still counts as present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilmQuery {
    pub sortby: Option<String>,
    pub asc: Option<String>,
    pub actor: Option<String>,
    pub title: Option<String>,
    pub actor_title: Option<String>,
    /// Whether any parameter outside the recognized set was supplied.
    pub has_unrecognized: bool,
}

impl FilmQuery {
    pub fn from_params(mut params: HashMap<String, String>) -> Self {
        let mut query = FilmQuery {
            sortby: params.remove("sortby"),
            asc: params.remove("asc"),
            actor: params.remove("actor"),
            title: params.remove("title"),
            actor_title: params.remove("actor_title"),
            has_unrecognized: false,
        };
        query.has_unrecognized = !params.is_empty();
        query
    }

    fn is_empty(&self) -> bool {
        self.sortby.is_none()
            && self.asc.is_none()
            && self.actor.is_none()
            && self.title.is_none()
            && self.actor_title.is_none()
            && !self.has_unrecognized
    }

    /// resolve
    ///
    /// Picks the single catalog call for this query. The rule order decides which of
    /// several plausible combinations wins:
    /// 1. no parameters at all: default listing (rating, descending);
    /// 2. `sortby` (strictly validated), with `asc` if given;
    /// 3. `asc` alone: rating order in that direction;
    /// 4. exactly one of `actor`, `title`, `actor_title`; two or more conflict;
    /// 5. anything else is an unrecognized query shape.
    pub fn resolve(&self) -> CatalogResult<FilmLookup> {
        if self.is_empty() {
            return Ok(FilmLookup::List {
                sort: SortField::Rating,
                ascending: false,
            });
        }

        let ascending = self.asc.as_deref().map(parse_bool_lenient).transpose()?;

        if let Some(sortby) = &self.sortby {
            let sort = sortby.parse::<SortField>()?;
            return Ok(FilmLookup::List {
                sort,
                ascending: ascending.unwrap_or(false),
            });
        }

        if let Some(ascending) = ascending {
            return Ok(FilmLookup::List {
                sort: SortField::resolve(self.sortby.as_deref().unwrap_or_default()),
                ascending,
            });
        }

        let filters = [&self.actor, &self.title, &self.actor_title]
            .iter()
            .filter(|f| f.is_some())
            .count();
        if filters > 1 {
            return Err(CatalogError::validation(
                "conflicting filters: use only one of actor, title, actor_title",
            ));
        }

        if let Some(fragment) = &self.actor {
            return Ok(FilmLookup::ByActor(fragment.clone()));
        }
        if let Some(fragment) = &self.title {
            return Ok(FilmLookup::ByTitle(fragment.clone()));
        }
        if let Some(fragment) = &self.actor_title {
            return Ok(FilmLookup::ByActorOrTitle(fragment.clone()));
        }

        Err(CatalogError::validation("unrecognized query shape"))
    }
}

/// FilmLookup
///
/// The one catalog call a [`FilmQuery`] resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum FilmLookup {
    List { sort: SortField, ascending: bool },
    ByActor(String),
    ByTitle(String),
    ByActorOrTitle(String),
}

impl FilmLookup {
    pub async fn run(self, store: &dyn CatalogStore) -> CatalogResult<Vec<Film>> {
        match self {
            FilmLookup::List { sort, ascending } => store.list_films(sort, ascending).await,
            FilmLookup::ByActor(fragment) => store.search_films_by_actor_fragment(&fragment).await,
            FilmLookup::ByTitle(fragment) => store.search_films_by_title_fragment(&fragment).await,
            FilmLookup::ByActorOrTitle(fragment) => {
                store.search_films_by_fragment(&fragment).await
            }
        }
    }
}
