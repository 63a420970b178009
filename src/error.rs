use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::schema::ValidationError;

/// Error surfaced to the HTTP caller for the current request.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(ValidationError::Field { .. }) => StatusCode::BAD_REQUEST,
            AppError::Validation(ValidationError::DuplicateKey { .. }) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(err @ ValidationError::Field { message, .. }) => ErrorResponse {
                error: "validation_error",
                field: Some(err.field_name().to_string()),
                details: Some(message.clone()),
            },
            AppError::Validation(err @ ValidationError::DuplicateKey { .. }) => ErrorResponse {
                error: "duplicate_key",
                field: Some(err.field_name().to_string()),
                details: Some(err.to_string()),
            },
            AppError::Unauthorized(msg) => ErrorResponse {
                error: "unauthorized",
                field: None,
                details: Some(msg.clone()),
            },
            AppError::Forbidden => ErrorResponse {
                error: "forbidden",
                field: None,
                details: Some("insufficient role for this route".into()),
            },
            AppError::BadRequest(msg) => ErrorResponse {
                error: "bad_request",
                field: None,
                details: Some(msg.clone()),
            },
            AppError::NotFound(msg) => ErrorResponse {
                error: "not_found",
                field: None,
                details: Some(msg.clone()),
            },
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "internal error");
                ErrorResponse {
                    error: "internal_error",
                    field: None,
                    details: None,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(
            AppError::from(ValidationError::field("email", "bad")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(ValidationError::duplicate("email")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("course").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(anyhow::anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn internal_details_are_not_exposed() {
        let res = AppError::from(anyhow::anyhow!("password=hunter2")).into_response();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!body.contains("hunter2"));
        assert!(body.contains("internal_error"));
    }
}
