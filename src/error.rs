use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests")]
    TooManyRequests { retry_after_secs: u64 },

    /// 500 whose message is safe to show, e.g. a failed dependency check.
    #[error("{0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        let mut res = (status, body).into_response();
        if let ApiError::TooManyRequests { retry_after_secs } = self {
            res.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        if status == StatusCode::UNAUTHORIZED {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}

/// True when the error chain holds a Postgres unique-constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
    })
}

/// Database driver error as Postgres reports a constraint failure.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ConstraintError {
    pub unique: bool,
    pub constraint: &'static str,
}

#[cfg(test)]
impl std::fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "violates constraint \"{}\"", self.constraint)
    }
}

#[cfg(test)]
impl std::error::Error for ConstraintError {}

#[cfg(test)]
impl sqlx::error::DatabaseError for ConstraintError {
    fn message(&self) -> &str {
        "constraint violation"
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        Some(self.constraint)
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        if self.unique {
            sqlx::error::ErrorKind::UniqueViolation
        } else {
            sqlx::error::ErrorKind::ForeignKeyViolation
        }
    }
}

/// The error a repository returns when an insert hits a unique key.
#[cfg(test)]
pub(crate) fn unique_violation(constraint: &'static str) -> anyhow::Error {
    sqlx::Error::Database(Box::new(ConstraintError {
        unique: true,
        constraint,
    }))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_found_through_context() {
        let err = unique_violation("contacts_owner_email_key");
        assert!(is_unique_violation(&err));

        let wrapped = unique_violation("contacts_owner_phone_key").context("insert contact");
        assert!(is_unique_violation(&wrapped));
    }

    #[test]
    fn other_constraint_failures_are_not_unique_violations() {
        let fk: anyhow::Error = sqlx::Error::Database(Box::new(ConstraintError {
            unique: false,
            constraint: "contacts_user_id_fkey",
        }))
        .into();
        assert!(!is_unique_violation(&fk));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound.into()));
    }

    #[test]
    fn statuses_match_variants() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let res = ApiError::Internal(anyhow::anyhow!("password=hunter2")).into_response();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("Internal server error"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn too_many_requests_sets_retry_after() {
        let res = ApiError::TooManyRequests { retry_after_secs: 4 }.into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers().get(header::RETRY_AFTER).unwrap(), "4");
    }

    #[tokio::test]
    async fn database_errors_keep_their_message() {
        let res = ApiError::Database("Error connecting to the database".into()).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Error connecting to the database");
        assert_eq!(json["status"], 500);
    }

    #[test]
    fn plain_anyhow_is_not_unique_violation() {
        assert!(!is_unique_violation(&anyhow::anyhow!("nope")));
    }
}
