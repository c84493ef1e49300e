use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced to REST clients as `{"title": .., "message": ..}`
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{title}: {message}")]
    BadRequest { title: String, message: String },

    #[error("{title}: {message}")]
    Forbidden { title: String, message: String },

    #[error("{title}: {message}")]
    NotFound { title: String, message: String },

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(title: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::BadRequest { title: title.into(), message: message.into() }
    }

    pub fn forbidden(title: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Forbidden { title: title.into(), message: message.into() }
    }

    pub fn not_found(title: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::NotFound { title: title.into(), message: message.into() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::BadRequest { title, message }
            | AppError::Forbidden { title, message }
            | AppError::NotFound { title, message } => json!({ "title": title, "message": message }),
            AppError::Internal(e) => {
                error!("Request failed: {:#}", e);
                json!({ "title": "Internal Server Error", "message": e.to_string() })
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
