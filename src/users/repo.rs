use sqlx::PgPool;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, avatar, refresh_token, \
     is_email_confirmed, is_password_valid, created_at, updated_at";

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// True when either the email or the username is already registered.
    pub async fn exists(db: &PgPool, email: &str, username: &str) -> anyhow::Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 OR username = $2)"#,
        )
        .bind(email)
        .bind(username)
        .fetch_one(db)
        .await?;
        Ok(taken)
    }

    /// Create a new user with hashed password.
    pub async fn create(db: &PgPool, new: NewUser<'_>) -> anyhow::Result<User> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, avatar) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(new.username)
            .bind(new.email)
            .bind(new.password_hash)
            .bind(new.avatar)
            .fetch_one(db)
            .await?;
        Ok(user)
    }

    /// Store (or clear) the current refresh token.
    pub async fn update_token(db: &PgPool, id: Uuid, token: Option<&str>) -> anyhow::Result<User> {
        let sql = format!(
            "UPDATE users SET refresh_token = $2, updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(token)
            .fetch_one(db)
            .await?;
        Ok(user)
    }

    pub async fn confirm_email(db: &PgPool, email: &str) -> anyhow::Result<User> {
        let sql = format!(
            "UPDATE users SET is_email_confirmed = TRUE, updated_at = now() \
             WHERE email = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_one(db)
            .await?;
        Ok(user)
    }

    /// Blocks password login until the reset flow completes.
    pub async fn invalidate_password(db: &PgPool, email: &str) -> anyhow::Result<User> {
        let sql = format!(
            "UPDATE users SET is_password_valid = FALSE, updated_at = now() \
             WHERE email = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_one(db)
            .await?;
        Ok(user)
    }

    pub async fn reset_password(db: &PgPool, email: &str, password_hash: &str) -> anyhow::Result<User> {
        let sql = format!(
            "UPDATE users SET password_hash = $2, is_password_valid = TRUE, updated_at = now() \
             WHERE email = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(password_hash)
            .fetch_one(db)
            .await?;
        Ok(user)
    }

    pub async fn update_avatar(db: &PgPool, id: Uuid, url: &str) -> anyhow::Result<User> {
        let sql = format!(
            "UPDATE users SET avatar = $2, updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(url)
            .fetch_one(db)
            .await?;
        Ok(user)
    }
}
