use skyhold_core::{BookingDetails, BookingError, BookingResult, CancellationSummary, ReferenceGenerator};
use tracing::warn;
use uuid::Uuid;

use crate::engine::ReservationEngine;

fn proves_access(details: &BookingDetails, last_name_or_email: &str) -> bool {
    details.passengers.iter().any(|p| p.matches_identity(last_name_or_email))
}

impl ReservationEngine {
    /// Customer self-service lookup: the reference must exist and at least one
    /// linked passenger's last name or email must match. A mismatch reads
    /// exactly like an unknown reference.
    pub async fn verify_booking_access(&self, reference: &str, last_name_or_email: &str) -> BookingResult<BookingDetails> {
        let normalized = ReferenceGenerator::normalize(reference);
        if normalized.is_empty() || last_name_or_email.trim().is_empty() {
            return Err(BookingError::Validation("booking reference and last name or email are required".into()));
        }

        match self.store.find_booking_by_reference(&normalized).await? {
            Some(details) if proves_access(&details, last_name_or_email) => Ok(details),
            Some(_) => {
                warn!("Booking access denied for reference {}", normalized);
                Err(BookingError::BookingNotFound(normalized))
            }
            None => Err(BookingError::BookingNotFound(normalized)),
        }
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> BookingResult<BookingDetails> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))
    }

    /// Customer-initiated cancellation, gated on the same proof as
    /// `verify_booking_access`.
    pub async fn cancel_booking_with_proof(
        &self,
        booking_id: Uuid,
        last_name_or_email: &str,
    ) -> BookingResult<CancellationSummary> {
        let details = self.get_booking(booking_id).await?;
        if !proves_access(&details, last_name_or_email) {
            warn!("Cancellation denied for booking {}", booking_id);
            return Err(BookingError::BookingNotFound(booking_id.to_string()));
        }
        self.cancel_booking(booking_id).await
    }
}
