use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use anyhow::Context;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{auth::claims::Claims, config::JwtConfig, state::AppState};

/// Why a presented token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("missing token")]
    Missing,
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("outdated token")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// HS256 signing and verification keys with the token policy.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            ttl: Duration::seconds(cfg.ttl_hours.saturating_mul(3600)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sign(&self, username: &str) -> anyhow::Result<String> {
        self.sign_at(username, OffsetDateTime::now_utc())
    }

    /// Signs a token as if issued at `now`.
    pub(crate) fn sign_at(&self, username: &str, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = now
            .checked_add(self.ttl)
            .context("token expiry out of range")?;
        let claims = Claims {
            sub: username.to_string(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(%username, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(username = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }

    /// Resolves the username a request acts as. `None` means no token was sent.
    pub fn validate(&self, token: Option<&str>) -> Result<String, TokenError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(TokenError::Missing)?;
        Ok(self.verify(token)?.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            ttl_hours: 24,
        })
    }

    #[test]
    fn token_resolves_to_its_subject() {
        let keys = make_keys("dev-secret", "todolist");
        let token = keys.sign("alice").expect("sign");
        assert_eq!(keys.validate(Some(token.as_str())), Ok("alice".to_string()));

        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.iss, "todolist");
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn missing_or_empty_token_is_missing() {
        let keys = make_keys("dev-secret", "todolist");
        assert_eq!(keys.validate(None), Err(TokenError::Missing));
        assert_eq!(keys.validate(Some("")), Err(TokenError::Missing));
    }

    #[test]
    fn garbage_is_malformed() {
        let keys = make_keys("dev-secret", "todolist");
        assert_eq!(keys.validate(Some("not.a.jwt")), Err(TokenError::Malformed));
        assert_eq!(keys.validate(Some("abc")), Err(TokenError::Malformed));
    }

    #[test]
    fn foreign_secret_is_bad_signature() {
        let ours = make_keys("dev-secret", "todolist");
        let theirs = make_keys("other-secret", "todolist");
        let token = theirs.sign("mallory").expect("sign");
        assert_eq!(ours.validate(Some(token.as_str())), Err(TokenError::BadSignature));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let ours = make_keys("dev-secret", "todolist");
        let theirs = make_keys("dev-secret", "elsewhere");
        let token = theirs.sign("alice").expect("sign");
        assert_eq!(ours.validate(Some(token.as_str())), Err(TokenError::Malformed));
    }

    #[test]
    fn token_fails_after_expiry() {
        let keys = make_keys("dev-secret", "todolist");
        let issued = OffsetDateTime::now_utc() - Duration::hours(24) - Duration::seconds(5);
        let token = keys.sign_at("alice", issued).expect("sign");
        assert_eq!(keys.validate(Some(token.as_str())), Err(TokenError::Expired));

        let fresh = OffsetDateTime::now_utc() - Duration::hours(23);
        let token = keys.sign_at("alice", fresh).expect("sign");
        assert_eq!(keys.validate(Some(token.as_str())), Ok("alice".to_string()));
    }

    #[test]
    fn oversized_ttl_fails_to_sign_instead_of_panicking() {
        let keys = JwtKeys::new(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: "todolist".into(),
            ttl_hours: i64::MAX / 10,
        });
        assert!(keys.sign("alice").is_err());
    }
}
