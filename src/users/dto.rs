use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::User;

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct UserDb {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserDb {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            avatar: u.avatar,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_hides_secrets() {
        let mut user = User::sample("test@example.com");
        user.refresh_token = Some("refresh-secret".into());
        let json = serde_json::to_string(&UserDb::from(user)).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("password"));
        assert!(!json.contains("refresh-secret"));
    }
}
