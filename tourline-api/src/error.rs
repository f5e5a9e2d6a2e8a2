use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tourline_booking::BookingError;

#[derive(Debug)]
pub enum AppError {
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

fn booking_status(err: &BookingError) -> StatusCode {
    match err {
        BookingError::NotFound(_) => StatusCode::NOT_FOUND,
        BookingError::InsufficientCapacity { .. }
        | BookingError::AlreadyCancelled(_)
        | BookingError::InvalidStateTransition { .. }
        | BookingError::Contention { .. } => StatusCode::CONFLICT,
        BookingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        BookingError::Payment(_) => StatusCode::BAD_GATEWAY,
        BookingError::CorruptedLedger(_) | BookingError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
            AppError::Anyhow(err) => match err.downcast_ref::<BookingError>() {
                Some(booking_err) => {
                    let status = booking_status(booking_err);
                    if status.is_server_error() {
                        tracing::error!("Booking failure: {}", booking_err);
                    }
                    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                        "Internal Server Error".to_string()
                    } else {
                        booking_err.to_string()
                    };
                    (status, message)
                }
                None => {
                    tracing::error!("Internal Server Error: {}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
                }
            },
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
