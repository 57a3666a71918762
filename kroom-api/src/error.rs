use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kroom_core::BookingError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    GoneError(String),
    UnprocessableError(String),
    PaymentRequiredError(String),
    InternalServerError(String),
}

impl AppError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation", msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AppError::GoneError(msg) => (StatusCode::GONE, "expired", msg),
            AppError::UnprocessableError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "extension_limit", msg),
            AppError::PaymentRequiredError(msg) => (StatusCode::PAYMENT_REQUIRED, "payment_declined", msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", "Internal Server Error".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = self.parts();

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let msg = err.to_string();
        match err {
            BookingError::Conflict { .. } | BookingError::InvalidState { .. } => AppError::ConflictError(msg),
            BookingError::Expired { .. } => AppError::GoneError(msg),
            BookingError::ExtensionLimit { .. } => AppError::UnprocessableError(msg),
            BookingError::NotFound(_) => AppError::NotFoundError(msg),
            BookingError::Validation(_) => AppError::ValidationError(msg),
            BookingError::PaymentDeclined(_) => AppError::PaymentRequiredError(msg),
            BookingError::Store(_) => AppError::InternalServerError(msg),
        }
    }
}
