use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, patch},
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::{
    auth::extractors::CurrentUser,
    error::{ApiError, ApiResult},
    images::services::{ext_from_mime, upload_avatar, UploadItem, MAX_AVATAR_BYTES},
    rate_limit::{limited, RateLimit},
    state::AppState,
    users::{dto::UserDb, repo_types::User, services::cache_user},
};

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/users/me",
            limited(get(read_me), state, "users:me", RateLimit::ONE_PER_SECOND),
        )
        .route(
            "/users/avatar",
            limited(
                patch(update_avatar),
                state,
                "users:avatar",
                RateLimit::TWO_PER_FIVE_SECONDS,
            )
            .layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 64 * 1024)),
        )
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn read_me(CurrentUser(user): CurrentUser) -> Json<UserDb> {
    Json(user.into())
}

/// PATCH /users/avatar (multipart, field `file`)
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut mp: Multipart,
) -> ApiResult<Json<UserDb>> {
    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let body = field
                .bytes()
                .await
                .map_err(|_| ApiError::bad_request("Could not read file"))?;
            upload = Some(UploadItem { body, content_type });
            break;
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("file is required"))?;
    if ext_from_mime(&upload.content_type).is_none() {
        return Err(ApiError::bad_request("Unsupported image type"));
    }
    if upload.body.len() > MAX_AVATAR_BYTES {
        return Err(ApiError::bad_request("Image is too large"));
    }

    let url = upload_avatar(&state, user.id, upload).await.map_err(|e| {
        error!(error = %e, "avatar upload failed");
        ApiError::bad_request("Avatar upload failed")
    })?;

    let user = User::update_avatar(&state.db, user.id, &url).await?;
    cache_user(&state, &user).await;
    info!(%url, "avatar updated");
    Ok(Json(user.into()))
}
