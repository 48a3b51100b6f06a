use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::TokenKind,
        dto::{
            LoginRequest, MessageResponse, NewPasswordRequest, RequestEmail,
            ResetPasswordResponse, SignupRequest, SignupResponse, TokenResponse,
        },
        extractors::{BearerToken, CREDENTIALS_ERROR},
        jwt::JwtKeys,
        password::{check_policy, hash_new_password, verify_password},
        services::issue_tokens,
    },
    error::{is_unique_violation, ApiError, ApiResult},
    mail::{spawn_account_email, AccountEmail},
    rate_limit::{limited, RateLimit},
    state::AppState,
    users::{
        repo_types::{NewUser, User},
        services::{cache_user, gravatar_url},
    },
};

const ALREADY_CONFIRMED: &str = "Your email is already confirmed";
const PASSWORD_STILL_VALID: &str = "Your password is valid";

pub fn router(state: &AppState) -> Router<AppState> {
    use RateLimit as L;
    Router::new()
        .route(
            "/auth/signup",
            limited(post(signup), state, "auth:signup", L::TWO_PER_FIVE_SECONDS),
        )
        .route(
            "/auth/login",
            limited(post(login), state, "auth:login", L::ONE_PER_SECOND),
        )
        .route(
            "/auth/refresh-token",
            limited(get(refresh_token), state, "auth:refresh", L::ONE_PER_SECOND),
        )
        .route(
            "/auth/request-verification-email",
            limited(
                post(request_verification_email),
                state,
                "auth:request-verification",
                L::ONE_PER_SECOND,
            ),
        )
        .route(
            "/auth/confirm-email/:token",
            limited(get(confirm_email), state, "auth:confirm-email", L::ONE_PER_SECOND),
        )
        .route(
            "/auth/request-password-reset-email",
            limited(
                post(request_password_reset_email),
                state,
                "auth:request-reset",
                L::ONE_PER_SECOND,
            ),
        )
        .route(
            "/auth/reset-password/:token",
            limited(get(reset_password), state, "auth:reset-password", L::ONE_PER_SECOND),
        )
        .route(
            "/auth/reset-password-confirmation/:token",
            limited(
                patch(reset_password_confirmation),
                state,
                "auth:reset-confirmation",
                L::TWO_PER_FIVE_SECONDS,
            ),
        )
}

/// Decodes an emailed token; anything wrong with it is a 400.
fn email_from_link(state: &AppState, token: &str, kind: TokenKind) -> ApiResult<String> {
    JwtKeys::from_ref(state)
        .verify(token, kind)
        .map(|claims| claims.sub)
        .map_err(|e| {
            warn!(error = %e, ?kind, "invalid emailed token");
            ApiError::bad_request("Invalid or expired token")
        })
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    payload.normalize()?;

    if User::exists(&state.db, &payload.email, &payload.username).await? {
        warn!(email = %payload.email, "account already exists");
        return Err(ApiError::conflict("Account already exists"));
    }

    let hash = hash_new_password(&payload.password)?;
    let avatar = gravatar_url(&payload.email);
    let user = User::create(
        &state.db,
        NewUser {
            username: &payload.username,
            email: &payload.email,
            password_hash: &hash,
            avatar: Some(&avatar),
        },
    )
    .await
    .map_err(|e| {
        // lost a race against a concurrent signup
        if is_unique_violation(&e) {
            ApiError::conflict("Account already exists")
        } else {
            ApiError::Internal(e)
        }
    })?;
    cache_user(&state, &user).await;

    spawn_account_email(
        &state,
        AccountEmail::Verification,
        user.email.clone(),
        user.username.clone(),
    );

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user: user.into(),
            detail: "User successfully created. Check your email for confirmation.",
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let email = payload.email.trim().to_lowercase();

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(%email, "login unknown email");
        return Err(ApiError::unauthorized("Invalid email"));
    };
    if !user.is_email_confirmed {
        return Err(ApiError::unauthorized("Email is not confirmed"));
    }
    if !user.is_password_valid {
        return Err(ApiError::unauthorized("Password reset is not confirmed"));
    }
    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid password"));
    }

    let tokens = issue_tokens(&state, &user).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(tokens))
}

/// Rotates the token pair. Presenting a refresh token other than the last one
/// issued revokes the stored token, forcing a fresh login.
#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> ApiResult<Json<TokenResponse>> {
    let claims = JwtKeys::from_ref(&state)
        .verify(&token, TokenKind::Refresh)
        .map_err(|e| {
            warn!(error = %e, "invalid refresh token");
            ApiError::unauthorized(CREDENTIALS_ERROR)
        })?;

    let Some(user) = User::find_by_email(&state.db, &claims.sub).await? else {
        return Err(ApiError::unauthorized("Invalid email"));
    };

    if user.refresh_token.as_deref() != Some(token.as_str()) {
        warn!(user_id = %user.id, "stale refresh token presented; revoking");
        let user = User::update_token(&state.db, user.id, None).await?;
        cache_user(&state, &user).await;
        return Err(ApiError::unauthorized("Invalid refresh token"));
    }

    let tokens = issue_tokens(&state, &user).await?;
    info!(user_id = %user.id, "tokens refreshed");
    Ok(Json(tokens))
}

#[instrument(skip(state, payload))]
pub async fn request_verification_email(
    State(state): State<AppState>,
    Json(payload): Json<RequestEmail>,
) -> ApiResult<Json<MessageResponse>> {
    let email = payload.email.trim().to_lowercase();
    if let Some(user) = User::find_by_email(&state.db, &email).await? {
        if user.is_email_confirmed {
            return Ok(Json(MessageResponse::new(ALREADY_CONFIRMED)));
        }
        spawn_account_email(&state, AccountEmail::Verification, user.email, user.username);
    }
    Ok(Json(MessageResponse::new("Check your email for confirmation")))
}

#[instrument(skip_all)]
pub async fn confirm_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let email = email_from_link(&state, &token, TokenKind::EmailVerification)?;
    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        return Err(ApiError::bad_request("Verification error"));
    };
    if user.is_email_confirmed {
        return Ok(Json(MessageResponse::new(ALREADY_CONFIRMED)));
    }

    let user = User::confirm_email(&state.db, &email).await?;
    cache_user(&state, &user).await;
    info!(user_id = %user.id, "email confirmed");
    Ok(Json(MessageResponse::new("Email confirmed")))
}

#[instrument(skip(state, payload))]
pub async fn request_password_reset_email(
    State(state): State<AppState>,
    Json(payload): Json<RequestEmail>,
) -> ApiResult<Json<MessageResponse>> {
    let email = payload.email.trim().to_lowercase();
    if User::find_by_email(&state.db, &email).await?.is_some() {
        let user = User::invalidate_password(&state.db, &email).await?;
        cache_user(&state, &user).await;
        spawn_account_email(&state, AccountEmail::PasswordReset, user.email, user.username);
        info!(user_id = %user.id, "password reset requested");
    }
    Ok(Json(MessageResponse::new("Check your email for password reset")))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<ResetPasswordResponse>> {
    let email = email_from_link(&state, &token, TokenKind::PasswordReset)?;
    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        return Err(ApiError::bad_request("Password reset error"));
    };
    if user.is_password_valid {
        return Ok(Json(ResetPasswordResponse::Message(MessageResponse::new(
            PASSWORD_STILL_VALID,
        ))));
    }

    let token = JwtKeys::from_ref(&state).sign(&email, TokenKind::PasswordResetConfirmation)?;
    Ok(Json(ResetPasswordResponse::Confirmation {
        password_reset_confirmation_token: token,
    }))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password_confirmation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<NewPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let email = email_from_link(&state, &token, TokenKind::PasswordResetConfirmation)?;
    check_policy(&payload.password)?;

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        return Err(ApiError::bad_request("Password reset confirmation error"));
    };
    if user.is_password_valid {
        return Ok(Json(MessageResponse::new(PASSWORD_STILL_VALID)));
    }

    let hash = hash_new_password(&payload.password)?;
    let user = User::reset_password(&state.db, &email, &hash).await?;
    cache_user(&state, &user).await;
    info!(user_id = %user.id, "password has been reset");
    Ok(Json(MessageResponse::new("Password has been reset")))
}
