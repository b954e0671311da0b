//! Password hashing and verification (Argon2id, default parameters, random salt).

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand_core::OsRng;
use tracing::instrument;

use crate::error::{AppError, Result};

/// Hashes a plain-text password into a PHC string.
#[instrument(name = "password::hash", skip_all, err(Display))]
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(AppError::bad_request("password cannot be empty"));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Checks `password` against a stored PHC string. A malformed stored hash is an internal
/// error; a mismatch is `Ok(false)`.
#[instrument(name = "password::verify", skip_all, err(Display))]
pub fn verify_password(stored_hash: &str, password: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Internal(format!("stored password hash is invalid: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(format!("password verification failed: {e}"))),
    }
}
