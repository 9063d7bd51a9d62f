use uuid::Uuid;

/// Coarse classification used by callers to decide how to surface a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any storage access.
    Validation,
    NotFound,
    /// Expected under concurrent load: the caller should re-read and retry.
    Conflict,
    /// A hold lapsed before payment; the customer restarts seat selection.
    Expired,
    Payment,
    /// Partial cascade or commit failure. Logged as a system fault.
    Integrity,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Flight not found: {0}")]
    FlightNotFound(Uuid),

    #[error("Seat not found: {0}")]
    SeatNotFound(String),

    #[error("Passenger not found: {0}")]
    PassengerNotFound(Uuid),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Flight {flight_id} needs {expected} seats for the party, got {actual}")]
    InvalidPassengerCount {
        flight_id: Uuid,
        expected: u32,
        actual: usize,
    },

    #[error("Seats no longer available: {}", seats.join(", "))]
    SeatUnavailable { seats: Vec<String> },

    #[error("Flight is cancelled: {0}")]
    FlightCancelled(Uuid),

    #[error("Booking is cancelled: {0}")]
    BookingCancelled(Uuid),

    #[error("Seat hold expired for booking {0}")]
    HoldExpired(Uuid),

    #[error("Could not generate a unique booking reference after {attempts} attempts")]
    ReferenceGenerationExhausted { attempts: u32 },

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Integrity failure: {0}")]
    Integrity(String),

    /// The database aborted the transaction to break a lock cycle or a
    /// serialization conflict. Nothing was written; the same call can be retried.
    #[error("Concurrent update conflict: {0}")]
    Contention(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::Validation(_) | BookingError::InvalidPassengerCount { .. } => {
                ErrorKind::Validation
            }
            BookingError::FlightNotFound(_)
            | BookingError::SeatNotFound(_)
            | BookingError::PassengerNotFound(_)
            | BookingError::BookingNotFound(_) => ErrorKind::NotFound,
            BookingError::SeatUnavailable { .. }
            | BookingError::FlightCancelled(_)
            | BookingError::BookingCancelled(_)
            | BookingError::ReferenceGenerationExhausted { .. }
            | BookingError::Contention(_) => ErrorKind::Conflict,
            BookingError::HoldExpired(_) => ErrorKind::Expired,
            BookingError::PaymentDeclined(_) | BookingError::PaymentGateway(_) => {
                ErrorKind::Payment
            }
            BookingError::Integrity(_) => ErrorKind::Integrity,
            BookingError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Whether repeating the same call may succeed without user input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::Integrity(_)
                | BookingError::Contention(_)
                | BookingError::Storage(_)
                | BookingError::ReferenceGenerationExhausted { .. }
        )
    }
}

pub type BookingResult<T> = Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_unavailable_names_every_seat() {
        let err = BookingError::SeatUnavailable {
            seats: vec!["12A".to_string(), "12B".to_string()],
        };
        assert_eq!(err.to_string(), "Seats no longer available: 12A, 12B");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(BookingError::HoldExpired(Uuid::nil()).kind(), ErrorKind::Expired);
        assert_eq!(
            BookingError::BookingNotFound("ABC".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(BookingError::Integrity("x".into()).kind(), ErrorKind::Integrity);
        assert!(BookingError::Integrity("x".into()).is_retryable());

        let contention = BookingError::Contention("deadlock detected".into());
        assert_eq!(contention.kind(), ErrorKind::Conflict);
        assert!(contention.is_retryable());
    }
}
