use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. Also the cached representation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,        // Argon2 PHC string
    pub avatar: Option<String>,
    pub refresh_token: Option<String>, // last issued refresh token
    pub is_email_confirmed: bool,
    pub is_password_valid: bool,      // false while a reset is pending
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields needed to insert a user.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub avatar: Option<&'a str>,
}

#[cfg(test)]
impl User {
    /// Confirmed user with a valid password, as returned after signup + confirmation.
    pub fn sample(email: &str) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            username: email.split('@').next().unwrap_or("user").to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNo".into(),
            avatar: None,
            refresh_token: None,
            is_email_confirmed: true,
            is_password_valid: true,
            created_at: now,
            updated_at: now,
        }
    }
}
