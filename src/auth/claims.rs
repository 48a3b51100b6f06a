use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purpose a JWT was issued for. Tokens of one kind are rejected everywhere else.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    EmailVerification,
    PasswordReset,
    PasswordResetConfirmation,
}

/// JWT payload used for sessions and emailed links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,     // user email
    pub iat: usize,      // issued at (unix timestamp)
    pub exp: usize,      // expires at (unix timestamp)
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub jti: Uuid,       // token id
    pub kind: TokenKind, // token type
}
