//! Password storage for accounts.
//!
//! Registration stores the output of [`hash_password`] in
//! `users.password_hash`; login checks the submitted password against that
//! column with [`verify_password`]. The plain password is never persisted or
//! logged.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// PHC string (`$argon2id$v=19$...`) for a new account, with a fresh salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "could not hash account password");
            anyhow::anyhow!("hash password: {e}")
        })
}

/// Whether `plain` matches a `users.password_hash` value. `Ok(false)` is a
/// wrong password; an error means the stored value is not a PHC string.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is unreadable");
        anyhow::anyhow!("parse stored password hash: {e}")
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}
