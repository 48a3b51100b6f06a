use anyhow::Context;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::AppState;

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Object key of a user's avatar. One key per user, so any re-upload
/// replaces the previous image whatever its type.
pub fn avatar_key(user_id: Uuid) -> String {
    format!("avatars/{}", user_id)
}

/// Pushes the avatar to the image host and returns the URL to store.
///
/// The URL carries the upload time as a version so clients and CDNs do not
/// keep serving the previous image.
pub async fn upload_avatar(st: &AppState, user_id: Uuid, img: UploadItem) -> anyhow::Result<String> {
    anyhow::ensure!(!img.body.is_empty(), "empty image");
    anyhow::ensure!(
        ext_from_mime(&img.content_type).is_some(),
        "unsupported image type {}",
        img.content_type
    );

    let key = avatar_key(user_id);
    st.storage
        .put_object(&key, img.body, &img.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    let version = OffsetDateTime::now_utc().unix_timestamp();
    Ok(format!("{}?v={}", st.storage.public_url(&key), version))
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
