use serde::{Deserialize, Serialize};

use crate::{
    auth::{
        password::check_policy,
        services::{check_length, is_valid_email},
    },
    error::ApiError,
    users::dto::UserDb,
};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    /// Trims and lowercases the email, then checks every field.
    pub fn normalize(&mut self) -> Result<(), ApiError> {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        check_length("username", &self.username, 2, 150)?;
        if !is_valid_email(&self.email) {
            return Err(ApiError::bad_request("Invalid email"));
        }
        check_policy(&self.password)
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for the email-sending endpoints.
#[derive(Debug, Deserialize)]
pub struct RequestEmail {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct NewPasswordRequest {
    pub password: String,
}

/// Response returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

impl TokenResponse {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user: UserDb,
    pub detail: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

/// Either a confirmation token or a note that nothing needs resetting.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ResetPasswordResponse {
    Confirmation { password_reset_confirmation_token: String },
    Message(MessageResponse),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(username: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn normalize_lowercases_email() {
        let mut req = signup(" ann ", "  Ann@Example.COM ", "longenough");
        req.normalize().unwrap();
        assert_eq!(req.email, "ann@example.com");
        assert_eq!(req.username, "ann");
    }

    #[test]
    fn normalize_rejects_bad_fields() {
        assert!(signup("a", "ann@example.com", "longenough").normalize().is_err());
        assert!(signup("ann", "not-an-email", "longenough").normalize().is_err());
        assert!(signup("ann", "ann@example.com", "short").normalize().is_err());
        assert!(signup("ann", "ann@example.com", &"x".repeat(73)).normalize().is_err());
    }

    #[test]
    fn reset_response_shapes() {
        let token = ResetPasswordResponse::Confirmation {
            password_reset_confirmation_token: "t".into(),
        };
        assert_eq!(
            serde_json::to_string(&token).unwrap(),
            r#"{"password_reset_confirmation_token":"t"}"#
        );
        let msg = ResetPasswordResponse::Message(MessageResponse::new("Your password is valid"));
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"message":"Your password is valid"}"#
        );
    }

    #[test]
    fn token_response_is_bearer() {
        let json = serde_json::to_string(&TokenResponse::bearer("a".into(), "r".into())).unwrap();
        assert!(json.contains(r#""token_type":"bearer""#));
    }
}
