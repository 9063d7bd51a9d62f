use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skyhold_core::{BookingError, ErrorKind};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    Booking(BookingError),
    Anyhow(anyhow::Error),
}

impl AppError {
    fn booking_status(err: &BookingError) -> StatusCode {
        match (err.kind(), err) {
            (ErrorKind::Validation, _) => StatusCode::BAD_REQUEST,
            (ErrorKind::NotFound, _) => StatusCode::NOT_FOUND,
            (ErrorKind::Conflict, _) => StatusCode::CONFLICT,
            (ErrorKind::Expired, _) => StatusCode::GONE,
            (ErrorKind::Payment, BookingError::PaymentDeclined(_)) => StatusCode::PAYMENT_REQUIRED,
            (ErrorKind::Payment, _) => StatusCode::BAD_GATEWAY,
            (ErrorKind::Integrity, _) | (ErrorKind::Internal, _) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Booking(err) => {
                let status = Self::booking_status(&err);
                if status.is_server_error() {
                    tracing::error!("Booking operation failed: {}", err);
                }
                let body = match &err {
                    BookingError::Integrity(_) | BookingError::Storage(_) => {
                        json!({ "error": "Internal Server Error" })
                    }
                    BookingError::Contention(_) => {
                        json!({ "error": "Concurrent update conflict, please retry" })
                    }
                    BookingError::SeatUnavailable { seats } => {
                        json!({ "error": err.to_string(), "seats": seats })
                    }
                    _ => json!({ "error": err.to_string() }),
                };
                (status, body)
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        Self::Booking(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let status = |err: BookingError| AppError::from(err).into_response().status();

        assert_eq!(status(BookingError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(BookingError::BookingNotFound("ABC".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(BookingError::SeatUnavailable { seats: vec!["12B".into()] }), StatusCode::CONFLICT);
        assert_eq!(status(BookingError::HoldExpired(Uuid::nil())), StatusCode::GONE);
        assert_eq!(status(BookingError::PaymentDeclined("no".into())), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(status(BookingError::PaymentGateway("down".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status(BookingError::Integrity("cascade".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(BookingError::Contention("deadlock detected".into())), StatusCode::CONFLICT);
    }
}
