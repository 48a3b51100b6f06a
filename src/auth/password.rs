//! Account password policy and Argon2 hashing.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::{
    auth::services::check_length,
    error::{ApiError, ApiResult},
};

pub const PASSWORD_MIN: usize = 8;
/// Argon2 accepts more, but longer inputs are refused to keep hashing cheap.
pub const PASSWORD_MAX: usize = 72;

/// 400 unless the password is 8..=72 characters.
pub fn check_policy(plain: &str) -> ApiResult<()> {
    check_length("password", plain, PASSWORD_MIN, PASSWORD_MAX)
}

/// Validates a password chosen at signup or reset and returns its PHC string.
pub fn hash_new_password(plain: &str) -> ApiResult<String> {
    check_policy(plain)?;
    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash failed");
            ApiError::Internal(anyhow::anyhow!("argon2 hash: {}", e))
        })?;
    Ok(phc.to_string())
}

/// Checks a login attempt against the stored hash. A mismatch is `Ok(false)`;
/// a stored hash that does not parse is an error.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is corrupt");
        anyhow::anyhow!("parse stored hash: {}", e)
    })?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("argon2 verify: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn new_password_is_hashed_and_verifies() {
        let hash = hash_new_password("correct-horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct-horse", &hash).unwrap());
        assert!(!verify_password("correct-hors3", &hash).unwrap());
    }

    #[test]
    fn policy_bounds_are_inclusive() {
        assert!(hash_new_password(&"a".repeat(PASSWORD_MIN)).is_ok());
        assert!(check_policy(&"a".repeat(PASSWORD_MAX)).is_ok());

        let short = hash_new_password(&"a".repeat(PASSWORD_MIN - 1)).unwrap_err();
        assert_eq!(short.status(), StatusCode::BAD_REQUEST);
        assert!(short.to_string().contains("password"));

        let long = hash_new_password(&"a".repeat(PASSWORD_MAX + 1)).unwrap_err();
        assert_eq!(long.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn policy_counts_characters() {
        // 8 Cyrillic letters are 16 bytes
        assert!(check_policy("пароль12").is_ok());
        assert!(check_policy("пароль1").is_err());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_new_password("same-password").unwrap();
        let b = hash_new_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn corrupt_stored_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }
}
