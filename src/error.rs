use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::auth::jwt::TokenError;

pub type AppResult<T> = Result<T, AppError>;

/// Every failure a request can end with. Bodies are single plain-text messages.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed JSON or path parameters.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Unauthorized(#[from] TokenError),

    /// Authenticated, but not the owner of the resource.
    #[error("forbidden resource")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Duplicate username, wrong credentials, list/task mismatch.
    #[error("{0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Storage(e) => {
                // details stay in the logs
                error!(error = %format!("{e:#}"), "storage failure");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// `axum::Json` with every decoding failure reported as a 400.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);
