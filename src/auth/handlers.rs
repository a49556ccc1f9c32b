use axum::{
    extract::{FromRef, State},
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{Credentials, MessageResponse},
        extractors::{cleared_session_cookie, session_cookie, AuthUser},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    error::{ApiJson, AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/auth", get(authenticate))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<Credentials>,
) -> AppResult<Json<MessageResponse>> {
    let hash = hash_password(&payload.password)?;

    match state.users.create_user(&payload.username, &hash).await? {
        Some(user) => {
            info!(user_id = %user.id, "user registered");
            Ok(Json(MessageResponse::success()))
        }
        None => {
            warn!("username is taken");
            Err(AppError::Conflict("username is taken"))
        }
    }
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<Credentials>,
) -> AppResult<(HeaderMap, Json<MessageResponse>)> {
    let Some(user) = state.users.find_user(&payload.username).await? else {
        warn!("login unknown username");
        return Err(AppError::Conflict("incorrect username"));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!("login invalid password");
        return Err(AppError::Conflict("incorrect password"));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&user.username)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&token, keys.ttl(), state.config.cookie_secure)?,
    );

    info!("user logged in");
    Ok((headers, Json(MessageResponse::success())))
}

/// Tokens are stateless: logging out only tells the client to drop its cookie.
#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> (HeaderMap, Json<MessageResponse>) {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        cleared_session_cookie(state.config.cookie_secure),
    );
    (headers, Json(MessageResponse::success()))
}

#[instrument(skip_all, fields(username = %user.0))]
pub async fn authenticate(user: AuthUser) -> Json<MessageResponse> {
    Json(MessageResponse::success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenError;

    fn creds(username: &str, password: &str) -> ApiJson<Credentials> {
        ApiJson(Credentials {
            username: username.into(),
            password: password.into(),
        })
    }

    #[tokio::test]
    async fn register_twice_conflicts() {
        let state = AppState::fake();
        register(State(state.clone()), creds("alice", "pw1")).await.expect("first");

        let err = register(State(state.clone()), creds("alice", "pw2")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict("username is taken")));

        // usernames are case-sensitive
        register(State(state), creds("Alice", "pw2")).await.expect("distinct username");
    }

    #[tokio::test]
    async fn register_never_stores_plaintext() {
        let state = AppState::fake();
        register(State(state.clone()), creds("alice", "pw1")).await.unwrap();
        let user = state.users.find_user("alice").await.unwrap().unwrap();
        assert_ne!(user.password_hash, "pw1");
        assert!(user.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn login_distinguishes_username_and_password() {
        let state = AppState::fake();
        register(State(state.clone()), creds("alice", "pw1")).await.unwrap();

        let err = login(State(state.clone()), creds("bob", "pw1")).await.unwrap_err();
        assert_eq!(err.to_string(), "incorrect username");

        let err = login(State(state.clone()), creds("alice", "nope")).await.unwrap_err();
        assert_eq!(err.to_string(), "incorrect password");
    }

    #[tokio::test]
    async fn login_sets_session_cookie_for_user() {
        let state = AppState::fake();
        register(State(state.clone()), creds("alice", "pw1")).await.unwrap();

        let (headers, Json(body)) = login(State(state.clone()), creds("alice", "pw1"))
            .await
            .expect("login");
        assert_eq!(body, MessageResponse::success());

        let cookie = headers[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("HttpOnly"));
        let token = cookie
            .strip_prefix("jwt=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();

        let keys = JwtKeys::from_ref(&state);
        assert_eq!(keys.validate(Some(token)), Ok("alice".to_string()));
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let state = AppState::fake();
        let (headers, _) = logout(State(state)).await;
        assert!(headers[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));
    }

    #[test]
    fn token_errors_are_unauthorized() {
        let err: AppError = TokenError::BadSignature.into();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
