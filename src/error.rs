use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Doğrulama hataları")]
    Validation(Vec<FieldError>),

    #[error("Erişim reddedildi. Token bulunamadı.")]
    Unauthenticated,

    #[error("{0}")]
    InvalidToken(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Sunucu hatası")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: &str) -> Self {
        ApiError::NotFound(message.to_string())
    }

    pub fn bad_request(message: &str) -> Self {
        ApiError::BadRequest(message.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated | ApiError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "success": false,
            "message": self.to_string(),
        });

        match self {
            ApiError::Validation(errors) => {
                body["errors"] = json!(errors);
            }
            ApiError::Internal(detail) => {
                log::error!("Internal error: {detail}");
                // Detail leaves the process only in debug builds.
                if cfg!(debug_assertions) {
                    body["error"] = json!(detail);
                }
            }
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
