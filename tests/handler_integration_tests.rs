use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use chrono::Duration;
use cinema_library::{
    AppState, AuthError, CatalogError, CatalogResult, JwtCodec, TokenCodec, TokenState,
    config::AppConfig,
    create_router,
    models::{Actor, ActorId, ActorWithFilms, Credentials, Film, FilmId},
    query::SortField,
    repository::CatalogStore,
    token::TokenClaims,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::test;
use tower::ServiceExt;

// --- MOCK STORE IMPLEMENTATION ---

#[derive(Default)]
struct MockData {
    actors: Vec<Actor>,
    films: Vec<Film>,
    users: Vec<(String, String, String, bool)>,
    // Every store method that was reached, in order.
    calls: Vec<String>,
}

// In-memory stand-in for Postgres. Matching is case-sensitive like the real store.
#[derive(Default)]
struct MockCatalogStore {
    data: Mutex<MockData>,
}

impl MockCatalogStore {
    fn record(&self, call: impl Into<String>) {
        self.data.lock().unwrap().calls.push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.data.lock().unwrap().calls.clone()
    }

    fn films_where(&self, keep: impl Fn(&MockData, &Film) -> usize) -> Vec<Film> {
        let guard = self.data.lock().unwrap();
        let data: &MockData = &guard;
        data.films
            .iter()
            .flat_map(|f| std::iter::repeat_n(f.clone(), keep(data, f)))
            .collect()
    }
}

#[async_trait]
impl CatalogStore for MockCatalogStore {
    async fn create_actor(&self, actor: &Actor) -> CatalogResult<ActorId> {
        self.record("create_actor");
        let mut data = self.data.lock().unwrap();
        let id = data.actors.len() as ActorId + 1;
        data.actors.push(Actor {
            id,
            ..actor.clone()
        });
        Ok(id)
    }

    async fn update_actor(&self, actor: &Actor) -> CatalogResult<()> {
        self.record(format!("update_actor:{}", actor.id));
        let mut data = self.data.lock().unwrap();
        if let Some(existing) = data.actors.iter_mut().find(|a| a.id == actor.id) {
            *existing = actor.clone();
        }
        Ok(())
    }

    async fn delete_actor(&self, id: ActorId) -> CatalogResult<()> {
        self.record(format!("delete_actor:{id}"));
        let mut data = self.data.lock().unwrap();
        data.actors.retain(|a| a.id != id);
        for film in &mut data.films {
            film.actors.retain(|a| *a != id);
        }
        Ok(())
    }

    async fn list_actors(&self, fragment: Option<&str>) -> CatalogResult<Vec<ActorWithFilms>> {
        self.record(format!("list_actors:{}", fragment.unwrap_or("*")));
        let data = self.data.lock().unwrap();
        Ok(data
            .actors
            .iter()
            .filter(|a| fragment.is_none_or(|f| a.name.contains(f)))
            .map(|a| {
                let titles: Vec<String> = data
                    .films
                    .iter()
                    .filter(|f| f.actors.contains(&a.id))
                    .map(|f| f.title.clone())
                    .collect();
                ActorWithFilms {
                    id: a.id,
                    name: a.name.clone(),
                    film_titles: (!titles.is_empty()).then_some(titles),
                }
            })
            .collect())
    }

    async fn create_film(&self, film: &Film) -> CatalogResult<FilmId> {
        film.validate_new()?;
        self.record("create_film");
        let mut data = self.data.lock().unwrap();
        let id = data.films.len() as FilmId + 1;
        data.films.push(Film {
            id,
            ..film.clone()
        });
        Ok(id)
    }

    async fn update_film(&self, film: &Film) -> CatalogResult<()> {
        self.record(format!("update_film:{}", film.id));
        Ok(())
    }

    async fn delete_film(&self, id: FilmId) -> CatalogResult<()> {
        self.record(format!("delete_film:{id}"));
        self.data.lock().unwrap().films.retain(|f| f.id != id);
        Ok(())
    }

    async fn list_films(&self, sort: SortField, ascending: bool) -> CatalogResult<Vec<Film>> {
        self.record(format!("list_films:{}:{ascending}", sort.column()));
        Ok(self.films_where(|_, _| 1))
    }

    async fn search_films_by_actor_fragment(&self, fragment: &str) -> CatalogResult<Vec<Film>> {
        self.record(format!("by_actor:{fragment}"));
        Ok(self.films_where(|data, film| {
            data.actors
                .iter()
                .filter(|a| film.actors.contains(&a.id) && a.name.contains(fragment))
                .count()
        }))
    }

    async fn search_films_by_title_fragment(&self, fragment: &str) -> CatalogResult<Vec<Film>> {
        self.record(format!("by_title:{fragment}"));
        Ok(self.films_where(|_, film| usize::from(film.title.contains(fragment))))
    }

    async fn search_films_by_fragment(&self, fragment: &str) -> CatalogResult<Vec<Film>> {
        let mut films = self.search_films_by_actor_fragment(fragment).await?;
        films.extend(self.search_films_by_title_fragment(fragment).await?);
        Ok(films)
    }

    async fn count_users_with_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> CatalogResult<i64> {
        let data = self.data.lock().unwrap();
        Ok(data
            .users
            .iter()
            .filter(|(u, e, _, _)| u == username || e == email)
            .count() as i64)
    }

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> CatalogResult<()> {
        self.record(format!("create_user:{username}"));
        self.data.lock().unwrap().users.push((
            username.to_string(),
            email.to_string(),
            password_hash.to_string(),
            false,
        ));
        Ok(())
    }

    async fn register_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> CatalogResult<()> {
        if self
            .count_users_with_username_or_email(username, email)
            .await?
            > 0
        {
            return Err(CatalogError::Conflict(
                "username or email already registered".to_string(),
            ));
        }
        self.create_user(username, email, password_hash).await
    }

    async fn get_user_credentials(&self, email: &str) -> CatalogResult<Credentials> {
        let data = self.data.lock().unwrap();
        data.users
            .iter()
            .find(|(_, e, _, _)| e == email)
            .map(|(username, _, hash, is_admin)| Credentials {
                username: username.clone(),
                password_hash: hash.clone(),
                is_admin: *is_admin,
            })
            .ok_or_else(|| CatalogError::NotFound(format!("user {email}")))
    }
}

// --- TEST HELPERS ---

fn test_codec() -> JwtCodec {
    let config = AppConfig::default();
    JwtCodec::new(&config.jwt_secret, Duration::hours(config.token_ttl_hours))
}

fn create_test_app(store: Arc<MockCatalogStore>) -> Router {
    create_router(AppState::new(store, AppConfig::default()))
}

fn admin_token() -> String {
    test_codec().issue("root", true).unwrap()
}

fn user_token() -> String {
    test_codec().issue("alice", false).unwrap()
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- PUBLIC ROUTES ---

#[test]
async fn test_health_is_public() {
    let app = create_test_app(Arc::new(MockCatalogStore::default()));

    let response = send(&app, request(Method::GET, "/health", None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[test]
async fn test_register_then_duplicate_conflicts() {
    let store = Arc::new(MockCatalogStore::default());
    let app = create_test_app(store.clone());
    let payload = json!({"username": "alice", "email": "a@x.com", "password": "pw"});

    let first = send(
        &app,
        request(Method::POST, "/user/register", None, Some(payload.clone())),
    )
    .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = send(
        &app,
        request(Method::POST, "/user/register", None, Some(payload)),
    )
    .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["code"], "CONFLICT");

    // The stored password is a hash, never the plain text.
    let data = store.data.lock().unwrap();
    assert_eq!(data.users.len(), 1);
    assert_ne!(data.users[0].2, "pw");
    assert!(data.users[0].2.starts_with("$argon2"));
}

#[test]
async fn test_register_rejects_empty_fields() {
    let store = Arc::new(MockCatalogStore::default());
    let app = create_test_app(store.clone());

    let response = send(
        &app,
        request(
            Method::POST,
            "/user/register",
            None,
            Some(json!({"username": "", "email": "a@x.com", "password": "pw"})),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(store.calls().is_empty());
}

#[test]
async fn test_login_issues_verifiable_token() {
    let app = create_test_app(Arc::new(MockCatalogStore::default()));
    send(
        &app,
        request(
            Method::POST,
            "/user/register",
            None,
            Some(json!({"username": "alice", "email": "a@x.com", "password": "s3cret"})),
        ),
    )
    .await;

    let response = send(
        &app,
        request(
            Method::POST,
            "/user/login",
            None,
            Some(json!({"email": "a@x.com", "password": "s3cret"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let token = body["token"].as_str().unwrap();
    let claims = test_codec().verify(token).unwrap();
    assert_eq!(claims.username, "alice");
    assert!(!claims.is_admin);
}

#[test]
async fn test_login_wrong_password_and_unknown_email_look_the_same() {
    let app = create_test_app(Arc::new(MockCatalogStore::default()));
    send(
        &app,
        request(
            Method::POST,
            "/user/register",
            None,
            Some(json!({"username": "alice", "email": "a@x.com", "password": "s3cret"})),
        ),
    )
    .await;

    let wrong_password = send(
        &app,
        request(
            Method::POST,
            "/user/login",
            None,
            Some(json!({"email": "a@x.com", "password": "nope"})),
        ),
    )
    .await;
    let unknown_email = send(
        &app,
        request(
            Method::POST,
            "/user/login",
            None,
            Some(json!({"email": "b@x.com", "password": "s3cret"})),
        ),
    )
    .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(wrong_password).await, body_json(unknown_email).await);
}

/// Verifies nothing and can never sign.
struct BrokenSigner;

impl TokenCodec for BrokenSigner {
    fn issue(&self, _username: &str, _is_admin: bool) -> CatalogResult<String> {
        Err(CatalogError::Signing("signing key unavailable".to_string()))
    }

    fn verify(&self, _token: &str) -> Result<TokenClaims, AuthError> {
        Err(AuthError::MalformedToken)
    }
}

#[test]
async fn test_login_signing_failure_is_a_server_error() {
    let store = Arc::new(MockCatalogStore::default());
    let app = create_test_app(store.clone());
    send(
        &app,
        request(
            Method::POST,
            "/user/register",
            None,
            Some(json!({"username": "alice", "email": "a@x.com", "password": "s3cret"})),
        ),
    )
    .await;

    let broken = create_router(AppState {
        store,
        tokens: Arc::new(BrokenSigner) as TokenState,
        config: AppConfig::default(),
    });
    let response = send(
        &broken,
        request(
            Method::POST,
            "/user/login",
            None,
            Some(json!({"email": "a@x.com", "password": "s3cret"})),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "INTERNAL_ERROR");
}

// --- ACCESS LEVELS ---

#[test]
async fn test_reads_require_a_token() {
    let store = Arc::new(MockCatalogStore::default());
    let app = create_test_app(store.clone());

    let films = send(&app, request(Method::GET, "/films", None, None)).await;
    let actors = send(&app, request(Method::GET, "/actors", None, None)).await;

    assert_eq!(films.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(actors.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(films).await["code"], "UNAUTHORIZED");
    assert!(store.calls().is_empty());
}

#[test]
async fn test_non_admin_cannot_create_film() {
    let store = Arc::new(MockCatalogStore::default());
    let app = create_test_app(store.clone());
    let token = user_token();

    let response = send(
        &app,
        request(
            Method::POST,
            "/films",
            Some(&token),
            Some(json!({"title": "Heat", "rating": 8.5})),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(store.calls().is_empty());
}

#[test]
async fn test_non_admin_can_read() {
    let app = create_test_app(Arc::new(MockCatalogStore::default()));
    let token = user_token();

    let response = send(&app, request(Method::GET, "/films", Some(&token), None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

#[test]
async fn test_expired_token_is_rejected() {
    let app = create_test_app(Arc::new(MockCatalogStore::default()));
    let expired = test_codec()
        .issue_expiring_at("root", true, chrono::Utc::now() - Duration::hours(1))
        .unwrap();

    let response = send(
        &app,
        request(Method::DELETE, "/films", Some(&expired), Some(json!({"id": 1}))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// --- CATALOG ---

#[test]
async fn test_actor_with_film_titles_end_to_end() {
    let app = create_test_app(Arc::new(MockCatalogStore::default()));
    let admin = admin_token();

    let created = send(
        &app,
        request(
            Method::POST,
            "/actors",
            Some(&admin),
            Some(json!({"name": "John Doe", "gender": "male", "birthdate": "1990-01-01"})),
        ),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let john_id = body_json(created).await.as_i64().unwrap();

    let film = send(
        &app,
        request(
            Method::POST,
            "/films",
            Some(&admin),
            Some(json!({"title": "Heat", "rating": 8.5, "actors": [john_id]})),
        ),
    )
    .await;
    assert_eq!(film.status(), StatusCode::CREATED);

    let user = user_token();
    let actors = send(&app, request(Method::GET, "/actors", Some(&user), None)).await;
    assert_eq!(
        body_json(actors).await,
        json!([{"id": john_id, "name": "John Doe", "film_titles": ["Heat"]}])
    );
}

#[test]
async fn test_actor_fragment_filter() {
    let store = Arc::new(MockCatalogStore::default());
    let app = create_test_app(store.clone());
    let admin = admin_token();
    for name in ["John Doe", "Al Pacino"] {
        send(
            &app,
            request(
                Method::POST,
                "/actors",
                Some(&admin),
                Some(json!({"name": name, "gender": "male", "birthdate": "1950-01-01"})),
            ),
        )
        .await;
    }

    let hits = send(
        &app,
        request(Method::GET, "/actors?fragment=Doe", Some(&admin), None),
    )
    .await;
    let everyone = send(
        &app,
        request(Method::GET, "/actors?fragment=", Some(&admin), None),
    )
    .await;

    assert_eq!(body_json(hits).await.as_array().unwrap().len(), 1);
    assert_eq!(body_json(everyone).await.as_array().unwrap().len(), 2);
    assert!(store.calls().contains(&"list_actors:*".to_string()));
}

#[test]
async fn test_create_film_rejects_out_of_range_rating() {
    let store = Arc::new(MockCatalogStore::default());
    let app = create_test_app(store.clone());
    let admin = admin_token();

    let response = send(
        &app,
        request(
            Method::POST,
            "/films",
            Some(&admin),
            Some(json!({"title": "Loud", "rating": 10.5})),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert!(!store.calls().contains(&"create_film".to_string()));
}

#[test]
async fn test_delete_without_id_never_reaches_the_store() {
    let store = Arc::new(MockCatalogStore::default());
    let app = create_test_app(store.clone());
    let admin = admin_token();

    let actor = send(
        &app,
        request(Method::DELETE, "/actors", Some(&admin), Some(json!({}))),
    )
    .await;
    let film = send(
        &app,
        request(Method::DELETE, "/films", Some(&admin), Some(json!({"id": 0}))),
    )
    .await;

    assert_eq!(actor.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(actor).await["error"], "Actor ID is required");
    assert_eq!(film.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(film).await["error"], "Film ID is required");
    assert!(store.calls().is_empty());
}

#[test]
async fn test_delete_and_update_dispatch() {
    let store = Arc::new(MockCatalogStore::default());
    let app = create_test_app(store.clone());
    let admin = admin_token();

    let deleted = send(
        &app,
        request(Method::DELETE, "/films", Some(&admin), Some(json!({"id": 7}))),
    )
    .await;
    let updated = send(
        &app,
        request(
            Method::PATCH,
            "/actors",
            Some(&admin),
            Some(json!({"id": 42, "name": "Ghost", "gender": "female", "birthdate": "2000-01-01"})),
        ),
    )
    .await;

    assert_eq!(deleted.status(), StatusCode::OK);
    // Unknown id is a silent no-op.
    assert_eq!(updated.status(), StatusCode::OK);
    assert_eq!(store.calls(), vec!["delete_film:7", "update_actor:42"]);
}

// --- FILM QUERIES ---

#[test]
async fn test_film_query_dispatch() {
    let store = Arc::new(MockCatalogStore::default());
    let app = create_test_app(store.clone());
    let token = user_token();

    for uri in [
        "/films",
        "/films?sortby=title&asc=true",
        "/films?asc=1",
        "/films?actor=Doe",
        "/films?title=He",
        "/films?actor_title=Al",
    ] {
        let response = send(&app, request(Method::GET, uri, Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }

    assert_eq!(
        store.calls(),
        vec![
            "list_films:f.rating:false",
            "list_films:f.title:true",
            "list_films:f.rating:true",
            "by_actor:Doe",
            "by_title:He",
            "by_actor:Al",
            "by_title:Al",
        ]
    );
}

#[test]
async fn test_film_query_rejections() {
    let store = Arc::new(MockCatalogStore::default());
    let app = create_test_app(store.clone());
    let token = user_token();

    for uri in [
        "/films?actor=Doe&title=Heat",
        "/films?sortby=budget",
        "/films?asc=maybe",
        "/films?genre=noir",
    ] {
        let response = send(&app, request(Method::GET, uri, Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }

    assert!(store.calls().is_empty());
}

#[test]
async fn test_actor_title_union_keeps_duplicates() {
    let app = create_test_app(Arc::new(MockCatalogStore::default()));
    let admin = admin_token();

    let created = send(
        &app,
        request(
            Method::POST,
            "/actors",
            Some(&admin),
            Some(json!({"name": "Al Pacino", "gender": "male", "birthdate": "1940-04-25"})),
        ),
    )
    .await;
    let al = body_json(created).await;
    send(
        &app,
        request(
            Method::POST,
            "/films",
            Some(&admin),
            Some(json!({"title": "Alibi", "rating": 6.0, "actors": [al]})),
        ),
    )
    .await;

    let response = send(
        &app,
        request(Method::GET, "/films?actor_title=Al", Some(&admin), None),
    )
    .await;

    // Matches once through the actor and once through the title.
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);
}
