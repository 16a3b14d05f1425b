use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use serde_json::json;

use crate::remote::RemoteError;
use crate::validate::FieldErrors;

pub const AUTH_FAILED: &str = "Auth Failed";

#[derive(Debug)]
pub enum AppError {
    Database(String),
    Unauthorized,
    AuthFailed,
    NotFound,
    BadRequest(&'static str),
    Validation(FieldErrors),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::AuthFailed => (StatusCode::UNAUTHORIZED, AUTH_FAILED.to_string()),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            AppError::Validation(errors) => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "errors": errors })),
                )
                    .into_response();
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unauthenticated => AppError::Unauthorized,
            RemoteError::InvalidCredentials | RemoteError::EmailTaken => AppError::AuthFailed,
            RemoteError::UnsupportedProvider(_) => AppError::BadRequest("Unsupported provider"),
            RemoteError::NotFound => AppError::NotFound,
            RemoteError::Database(err) => err.into(),
            RemoteError::Hashing(msg) | RemoteError::Unavailable(msg) => AppError::Database(msg),
        }
    }
}
