use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, HeaderValue},
};
use time::Duration;
use tracing::warn;

use super::jwt::JwtKeys;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "jwt";

/// The username a request acts as, resolved from the `jwt` cookie.
///
/// Rejects with 401 before the handler body (and any store access) runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = read_cookie(&parts.headers, SESSION_COOKIE);
        match keys.validate(token) {
            Ok(username) => Ok(AuthUser(username)),
            Err(e) => {
                warn!(reason = %e, "rejected session token");
                Err(e.into())
            }
        }
    }
}

/// First value of cookie `name` across all `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"'))
}

pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> anyhow::Result<HeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        ttl.whole_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

pub fn cleared_session_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("jwt=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax; Secure")
    } else {
        HeaderValue::from_static("jwt=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
    }
}
