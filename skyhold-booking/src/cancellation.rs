use skyhold_core::{BookingError, BookingResult, CancellationSummary};
use std::future::Future;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::ReservationEngine;

impl ReservationEngine {
    /// Cancels the flight and every active booking on it in one transaction,
    /// then refunds paid bookings. Cancelling twice is a no-op.
    pub async fn cancel_flight(&self, flight_id: Uuid) -> BookingResult<CancellationSummary> {
        let now = self.now();
        let summary = self
            .with_cascade_retries("cancel_flight", || self.store.cancel_flight(flight_id, now))
            .await?;

        if summary.already_cancelled {
            info!("Flight {} was already cancelled", flight_id);
            return Ok(summary);
        }

        info!(
            "Flight {} cancelled: {} bookings, {} seats released, {} refunds",
            flight_id,
            summary.cancelled_bookings.len(),
            summary.released_seats.len(),
            summary.refunds.len()
        );
        self.after_cascade(&summary, now).await;
        Ok(summary)
    }

    pub async fn cancel_booking(&self, booking_id: Uuid) -> BookingResult<CancellationSummary> {
        let now = self.now();
        let summary = self
            .with_cascade_retries("cancel_booking", || self.store.cancel_booking(booking_id, now))
            .await?;

        if !summary.already_cancelled {
            info!("Booking {} cancelled, {} seats released", booking_id, summary.released_seats.len());
            self.after_cascade(&summary, now).await;
        }
        Ok(summary)
    }

    /// The cascade is idempotent, so an integrity failure or a transaction the
    /// database aborted for contention is simply re-run.
    async fn with_cascade_retries<F, Fut>(&self, operation: &str, mut attempt: F) -> BookingResult<CancellationSummary>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BookingResult<CancellationSummary>>,
    {
        let mut failures = 0;
        loop {
            match attempt().await {
                Err(err @ (BookingError::Integrity(_) | BookingError::Contention(_))) => {
                    failures += 1;
                    error!("{} failed (attempt {}): {}", operation, failures, err);
                    if failures > self.settings.cancellation_retries {
                        return Err(err);
                    }
                }
                other => return other,
            }
        }
    }

    async fn after_cascade(&self, summary: &CancellationSummary, now: chrono::DateTime<chrono::Utc>) {
        self.publish_released(&summary.released_seats, now);

        for refund in &summary.refunds {
            match self.payments.refund(refund.booking_id, refund.amount).await {
                Ok(receipt) => info!(
                    "Refunded {} for booking {} ({})",
                    receipt.amount, refund.booking_reference, receipt.charge_id
                ),
                Err(err) => error!("Refund for booking {} failed: {}", refund.booking_reference, err),
            }
        }
    }
}
