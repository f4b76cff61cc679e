use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use seatline_core::{SeatError, SeatId};

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    PartialFailure { seat_id: SeatId, reason: String },
    ServiceUnavailable(String),
    InternalServerError(String),
}

impl From<SeatError> for AppError {
    fn from(err: SeatError) -> Self {
        match err {
            SeatError::NotFound(what) => AppError::NotFoundError(format!("{} not found", what)),
            SeatError::Conflict(reason) => AppError::ConflictError(reason.to_string()),
            SeatError::PartialFailure { seat_id, reason } => AppError::PartialFailure { seat_id, reason },
            SeatError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
            SeatError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::PartialFailure { seat_id, reason } => {
                tracing::error!(seat_id, "Partial purchase failure: {}", reason);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("purchase of seat {} was recorded but the seat could not be marked sold", seat_id),
                )
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Store unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
