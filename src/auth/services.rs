use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    auth::{dto::TokenResponse, jwt::JwtKeys},
    error::ApiError,
    state::AppState,
    users::{repo_types::User, services::cache_user},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    email.len() <= 150 && EMAIL_RE.is_match(email)
}

/// Character-count bounds check producing a 400 with the field name.
pub(crate) fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ApiError::bad_request(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

/// Signs a fresh access/refresh pair and stores the refresh token as the
/// only one accepted for this user.
pub async fn issue_tokens(state: &AppState, user: &User) -> anyhow::Result<TokenResponse> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(&user.email)?;
    let refresh_token = keys.sign_refresh(&user.email)?;
    let user = User::update_token(&state.db, user.id, Some(&refresh_token)).await?;
    cache_user(state, &user).await;
    Ok(TokenResponse::bearer(access_token, refresh_token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("ann@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("ann@example"));
        assert!(!is_valid_email("ann example@x.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email(&format!("{}@example.com", "a".repeat(150))));
    }

    #[test]
    fn length_counts_chars_not_bytes() {
        assert!(check_length("first_name", "Ів", 2, 150).is_ok());
        assert!(check_length("first_name", "І", 2, 150).is_err());
        let err = check_length("phone", &"1".repeat(31), 0, 30).unwrap_err();
        assert!(err.to_string().contains("phone"));
    }
}
