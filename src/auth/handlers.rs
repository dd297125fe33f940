use axum::{
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest, WhoAmIResponse},
        extractors::{authenticate, CurrentUser},
        jwt::JwtKeys,
        password,
        repo_types::User,
    },
    db::AppState,
    error::{ApiError, ApiResult},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/auth", post(whoami))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Server Is Working!" }))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let name = payload.name.unwrap_or_default().trim().to_string();
    let email = payload.email.unwrap_or_default().trim().to_lowercase();
    let password = payload.password.unwrap_or_default();

    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::Validation("All Fields Are Required".into()));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid Email".into()));
    }

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::Conflict("User Already Exists".into()));
    }

    // bcrypt is CPU-bound; keep it off the async worker threads.
    let cost = state.config.bcrypt_cost;
    let hash = tokio::task::spawn_blocking(move || password::hash_password(&password, cost))
        .await
        .map_err(anyhow::Error::from)??;

    // The unique index still guards against a concurrent registration that
    // slipped past the lookup above.
    let user = match User::create(&state.db, &name, &email, &hash).await {
        Ok(user) => user,
        Err(err) if is_unique_violation(&err) => {
            warn!(email = %email, "email already registered (insert race)");
            return Err(ApiError::Conflict("User Already Exists".into()));
        }
        Err(err) => return Err(err.into()),
    };

    let token = JwtKeys::from_ref(&state).sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = payload.email.unwrap_or_default().trim().to_lowercase();
    let password = payload.password.unwrap_or_default();

    if email.is_empty() || password.is_empty() {
        return Err(ApiError::Validation("All Fields Are Required".into()));
    }

    // Unknown email and wrong password produce the identical error so the
    // response never reveals which emails are registered.
    let user = match User::find_by_email(&state.db, &email).await? {
        Some(user) => user,
        None => {
            warn!(email = %email, "login with unknown email");
            return Err(ApiError::InvalidCredentials);
        }
    };

    let stored_hash = user.password_hash.clone();
    let matched = tokio::task::spawn_blocking(move || {
        password::verify_password(&password, &stored_hash)
    })
    .await
    .map_err(anyhow::Error::from)?;

    if !matched {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = JwtKeys::from_ref(&state).sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        token,
    }))
}

/// Explicit auth check: runs the same gate routine as protected routes, but
/// keeps this endpoint's historical 404 when the token subject no longer
/// exists in the store.
#[instrument(skip(state, headers))]
async fn whoami(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<WhoAmIResponse>> {
    let user = match authenticate(&state, &headers).await {
        Ok(user) => user,
        Err(ApiError::UnknownSubject) => return Err(ApiError::NotFound("User Not Found".into())),
        Err(err) => return Err(err),
    };

    Ok(Json(WhoAmIResponse {
        message: "Authenticated".into(),
        user: user.into(),
    }))
}

/// Protected-route example: the `CurrentUser` guard has already resolved
/// the live user before this body runs.
async fn me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}


/// Store-backed flow tests; `#[sqlx::test]` provisions a fresh database per
/// test and applies `./migrations`.
#[cfg(test)]
mod store_tests {
    use super::*;
    use crate::config::{AppConfig, JwtConfig};
    use axum::body::Body;
    use axum::http::{header, Request};
    use sqlx::PgPool;
    use std::sync::Arc;
    use tower::util::ServiceExt;
    use uuid::Uuid;

    fn store_app(pool: PgPool) -> Router {
        let config = Arc::new(AppConfig {
            database_url: String::new(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                ttl_days: 15,
            },
            // minimum bcrypt cost keeps these tests fast
            bcrypt_cost: 4,
        });
        auth_routes().with_state(AppState { db: pool, config })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn bearer_get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn register_body(email: &str) -> serde_json::Value {
        serde_json::json!({ "name": "Ada", "email": email, "password": "pw123456" })
    }

    #[sqlx::test]
    async fn duplicate_registration_conflicts_and_keeps_one_record(pool: PgPool) {
        let app = store_app(pool.clone());

        let (status, _) = send(&app, json_post("/register", register_body("ada@example.com"))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) =
            send(&app, json_post("/register", register_body("ada@example.com"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "User Already Exists");

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
                .bind("ada@example.com")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    async fn wrong_password_and_unknown_email_fail_identically(pool: PgPool) {
        let app = store_app(pool);
        let (status, _) = send(&app, json_post("/register", register_body("ada@example.com"))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (wrong_pw_status, wrong_pw_body) = send(
            &app,
            json_post(
                "/login",
                serde_json::json!({ "email": "ada@example.com", "password": "not-the-password" }),
            ),
        )
        .await;
        let (no_user_status, no_user_body) = send(
            &app,
            json_post(
                "/login",
                serde_json::json!({ "email": "nobody@example.com", "password": "pw123456" }),
            ),
        )
        .await;

        // No email-existence oracle: identical status and body.
        assert_eq!(wrong_pw_status, StatusCode::UNAUTHORIZED);
        assert_eq!(no_user_status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_pw_body, no_user_body);
        assert_eq!(wrong_pw_body["message"], "Invalid Credentials");
    }

    #[sqlx::test]
    async fn login_with_correct_password_returns_token(pool: PgPool) {
        let app = store_app(pool);
        send(&app, json_post("/register", register_body("ada@example.com"))).await;

        let (status, body) = send(
            &app,
            json_post(
                "/login",
                serde_json::json!({ "email": "ada@example.com", "password": "pw123456" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "ada@example.com");
        assert!(!body["token"].as_str().unwrap().is_empty());
    }

    #[sqlx::test]
    async fn register_token_grants_protected_access(pool: PgPool) {
        let app = store_app(pool);

        let (status, registered) =
            send(&app, json_post("/register", register_body("ada@example.com"))).await;
        assert_eq!(status, StatusCode::CREATED);
        let token = registered["token"].as_str().unwrap();

        let (status, me) = send(&app, bearer_get("/me", token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["_id"], registered["_id"]);
        assert_eq!(me["name"], "Ada");
        assert_eq!(me["email"], "ada@example.com");
        assert!(me.get("password").is_none());
        assert!(me.get("password_hash").is_none());

        let (status, checked) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/auth")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(checked["message"], "Authenticated");
        assert_eq!(checked["user"]["email"], "ada@example.com");
    }

    #[sqlx::test]
    async fn deleted_subject_fails_closed(pool: PgPool) {
        let app = store_app(pool.clone());

        let (_, registered) =
            send(&app, json_post("/register", register_body("ada@example.com"))).await;
        let token = registered["token"].as_str().unwrap();
        let user_id = Uuid::parse_str(registered["_id"].as_str().unwrap()).unwrap();

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&pool)
            .await
            .unwrap();

        // The token still carries a valid signature; the live re-lookup
        // must reject it anyway.
        let (status, _) = send(&app, bearer_get("/me", token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/auth")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User Not Found");
    }
}
