use serde::Serialize;
use skyhold_core::validation::normalize_payment_method;
use skyhold_core::{Booking, BookingError, BookingResult, ChargeReceipt, PaymentStatus, Seat, SettlementOutcome};
use skyhold_shared::SeatEvent;
use std::collections::BTreeMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::ReservationEngine;

const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid { booking: Booking, receipt: ChargeReceipt },
    /// Nothing was charged or changed; `booking.payment_method` is the
    /// originally recorded one.
    AlreadyPaid { booking: Booking },
}

impl PaymentOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            PaymentOutcome::Paid { booking, .. } | PaymentOutcome::AlreadyPaid { booking } => booking,
        }
    }

    pub fn already_paid(&self) -> bool {
        matches!(self, PaymentOutcome::AlreadyPaid { .. })
    }
}

impl ReservationEngine {
    pub async fn process_payment(&self, booking_id: Uuid, payment_method: &str) -> BookingResult<PaymentOutcome> {
        let method = normalize_payment_method(payment_method)?;
        let now = self.now();

        let details = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))?;
        let booking = &details.booking;

        if booking.payment_status == PaymentStatus::Paid {
            info!("Booking {} already paid, nothing to charge", booking.booking_reference);
            return Ok(PaymentOutcome::AlreadyPaid { booking: details.booking });
        }
        if !booking.status.is_active() {
            return Err(BookingError::BookingCancelled(booking_id));
        }
        let lapsed = details.lapsed_seats(now);
        if details.seats.is_empty() || !lapsed.is_empty() {
            warn!("Hold lapsed for booking {} on seats [{}]", booking.booking_reference, lapsed.join(", "));
            return Err(BookingError::HoldExpired(booking_id));
        }

        let currency = self
            .store
            .get_flight(booking.departing_flight_id)
            .await?
            .map(|flight| flight.price_currency)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let receipt = self.payments.charge_booking(booking, &method, &currency).await?;

        // The charge can take a while; settle against a fresh reading so a hold
        // that lapsed meanwhile is caught.
        let settled_at = self.now();
        match self.store.settle_payment(booking_id, &method, settled_at).await {
            Ok(SettlementOutcome::Settled { booking, seats }) => {
                info!(
                    "Booking {} confirmed, {} seats booked via {}",
                    booking.booking_reference,
                    seats.len(),
                    method
                );
                self.publish_booked(booking_id, seats);
                Ok(PaymentOutcome::Paid { booking, receipt })
            }
            // A concurrent payer settled first; the shared idempotency key means
            // the provider captured only once.
            Ok(SettlementOutcome::AlreadyPaid { booking }) => Ok(PaymentOutcome::AlreadyPaid { booking }),
            Err(err @ (BookingError::HoldExpired(_) | BookingError::BookingCancelled(_))) => {
                warn!("Booking {} could not settle after charge: {}; refunding", booking_id, err);
                if let Err(refund_err) = self.payments.refund(booking_id, receipt.amount).await {
                    error!("Refund of charge {} failed: {}", receipt.charge_id, refund_err);
                }
                Err(err)
            }
            Err(err) => {
                error!("Charge {} captured but settlement failed: {}", receipt.charge_id, err);
                self.reconcile_unsettled(booking_id, receipt, err).await
            }
        }
    }

    /// Resolves a captured charge whose settlement call errored, going by what
    /// the store actually holds: a paid booking keeps the charge, an unpaid one
    /// is refunded and cancelled.
    async fn reconcile_unsettled(
        &self,
        booking_id: Uuid,
        receipt: ChargeReceipt,
        err: BookingError,
    ) -> BookingResult<PaymentOutcome> {
        match self.store.get_booking(booking_id).await {
            Ok(Some(details)) if details.booking.payment_status == PaymentStatus::Paid => {
                info!("Booking {} was settled before the error surfaced", details.booking.booking_reference);
                self.publish_booked(booking_id, details.seats);
                Ok(PaymentOutcome::Paid { booking: details.booking, receipt })
            }
            Ok(_) => {
                warn!("Booking {} is still unpaid; refunding charge {}", booking_id, receipt.charge_id);
                if let Err(refund_err) = self.payments.refund(booking_id, receipt.amount).await {
                    // The captured charge stays behind the booking's idempotency
                    // key, so paying again settles it without a second capture.
                    error!("Refund of charge {} failed: {}", receipt.charge_id, refund_err);
                    return Err(err);
                }
                // A refunded key cannot capture again; retire the booking.
                if let Err(cancel_err) = self.cancel_booking(booking_id).await {
                    error!("Could not cancel booking {} after refund: {}", booking_id, cancel_err);
                }
                Err(err)
            }
            // Outcome unknown. Paying again reuses the booking id as the
            // idempotency key, so the provider will not capture twice.
            Err(read_err) => {
                error!(
                    "Could not read booking {} after charge {}: {}",
                    booking_id, receipt.charge_id, read_err
                );
                Err(err)
            }
        }
    }

    fn publish_booked(&self, booking_id: Uuid, seats: Vec<Seat>) {
        let mut by_flight: BTreeMap<Uuid, Vec<String>> = BTreeMap::new();
        for seat in seats {
            by_flight.entry(seat.flight_id).or_default().push(seat.seat_number);
        }
        for (flight_id, seat_numbers) in by_flight {
            self.publish(SeatEvent::SeatsBooked { flight_id, booking_id, seat_numbers });
        }
    }
}
