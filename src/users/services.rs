use tracing::{debug, warn};

use crate::{state::AppState, users::repo_types::User};

/// Resolves a user by email, preferring the cache and filling it on a miss.
pub async fn load_user(state: &AppState, email: &str) -> anyhow::Result<Option<User>> {
    match state.cache.get(email).await {
        Ok(Some(user)) => {
            debug!(%email, "user cache hit");
            return Ok(Some(user));
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, %email, "user cache read failed"),
    }

    let user = User::find_by_email(&state.db, email).await?;
    if let Some(user) = &user {
        cache_user(state, user).await;
    }
    Ok(user)
}

/// Writes the user through to the cache. Failures only get logged.
pub async fn cache_user(state: &AppState, user: &User) {
    if let Err(e) = state.cache.set(user).await {
        warn!(error = %e, user_id = %user.id, "user cache write failed");
    }
}

/// Default avatar for a fresh account.
pub fn gravatar_url(email: &str) -> String {
    let digest = md5::compute(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{:x}?d=identicon", digest)
}
