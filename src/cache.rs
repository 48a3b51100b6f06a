//! Write-through cache of user records.
//!
//! Users are stored as JSON under `user:{email}` with a fixed TTL. Every
//! mutation re-populates the entry, so there is no explicit invalidation.

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::users::repo_types::User;

pub const USER_TTL_SECS: u64 = 3600;

#[async_trait]
pub trait UserCache: Send + Sync {
    async fn get(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn set(&self, user: &User) -> anyhow::Result<()>;
}

fn user_key(email: &str) -> String {
    format!("user:{}", email)
}

#[derive(Clone)]
pub struct RedisUserCache {
    conn: ConnectionManager,
}

impl RedisUserCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl UserCache for RedisUserCache {
    async fn get(&self, email: &str) -> anyhow::Result<Option<User>> {
        let mut conn = self.conn.clone();
        let raw = redis::cmd("GET")
            .arg(user_key(email))
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .context("redis GET user")?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json).context("decode cached user")?)),
            None => Ok(None),
        }
    }

    async fn set(&self, user: &User) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(user).context("encode user")?;
        redis::cmd("SET")
            .arg(user_key(&user.email))
            .arg(json)
            .arg("EX")
            .arg(USER_TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await
            .context("redis SET user")?;
        Ok(())
    }
}

/// Process-local cache for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryUserCache {
    users: std::sync::Mutex<std::collections::HashMap<String, User>>,
}

#[cfg(test)]
#[async_trait]
impl UserCache for MemoryUserCache {
    async fn get(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self
            .users
            .lock()
            .map_err(|_| anyhow::anyhow!("user cache poisoned"))?;
        Ok(users.get(&user_key(email)).cloned())
    }

    async fn set(&self, user: &User) -> anyhow::Result<()> {
        let mut users = self
            .users
            .lock()
            .map_err(|_| anyhow::anyhow!("user cache poisoned"))?;
        users.insert(user_key(&user.email), user.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::User;

    #[tokio::test]
    async fn memory_cache_roundtrip_and_overwrite() {
        let cache = MemoryUserCache::default();
        let mut user = User::sample("ann@example.com");
        assert!(cache.get("ann@example.com").await.unwrap().is_none());

        cache.set(&user).await.unwrap();
        assert_eq!(cache.get("ann@example.com").await.unwrap().unwrap().id, user.id);

        user.is_email_confirmed = true;
        cache.set(&user).await.unwrap();
        assert!(cache.get("ann@example.com").await.unwrap().unwrap().is_email_confirmed);
    }

    #[test]
    fn cached_user_json_keeps_password_hash() {
        let user = User::sample("bob@example.com");
        let json = serde_json::to_string(&user).unwrap();
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back.password_hash, user.password_hash);
        assert_eq!(back.created_at, user.created_at);
    }
}
