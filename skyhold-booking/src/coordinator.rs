use skyhold_core::validation::validate_seat_request;
use skyhold_core::{BookingError, BookingHandle, BookingResult, NewBooking, SeatRequest};
use skyhold_shared::SeatEvent;
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::ReservationEngine;

/// Reruns of a hold transaction the database aborted for lock contention.
const CONTENTION_RETRIES: u32 = 3;

impl ReservationEngine {
    /// Holds every requested seat and creates a pending booking, or changes
    /// nothing. Of overlapping concurrent requests exactly one succeeds; the
    /// others get `SeatUnavailable` naming the contested seats.
    pub async fn lock_seats_and_create_booking(&self, request: SeatRequest) -> BookingResult<BookingHandle> {
        validate_seat_request(&request, self.settings.max_passengers)?;

        let now = self.now();
        let new = NewBooking {
            id: Uuid::new_v4(),
            request,
            created_at: now,
            hold_expires_at: now + self.settings.hold_ttl,
        };

        let mut contended = 0;
        let handle = loop {
            match self.store.lock_seats_and_create_booking(&new, &self.settings.references).await {
                Ok(handle) => break handle,
                Err(BookingError::Contention(reason)) if contended < CONTENTION_RETRIES => {
                    contended += 1;
                    warn!("Hold for booking {} aborted by contention (attempt {}): {}", new.id, contended, reason);
                }
                Err(err @ BookingError::SeatUnavailable { .. }) => {
                    warn!("Hold rejected for booking {}: {}", new.id, err);
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        };

        info!(
            "Booking {} ({}) holds {} seats until {}",
            handle.booking_reference,
            handle.booking_id,
            new.request.seat_ids.len(),
            new.hold_expires_at
        );
        self.publish_held(&new, handle.booking_id).await;

        Ok(handle)
    }

    async fn publish_held(&self, new: &NewBooking, booking_id: Uuid) {
        let details = match self.store.get_booking(booking_id).await {
            Ok(Some(details)) => details,
            Ok(None) => return,
            Err(err) => {
                warn!("Could not read booking {} for seat events: {}", booking_id, err);
                return;
            }
        };

        let mut by_flight: BTreeMap<Uuid, Vec<String>> = BTreeMap::new();
        for seat in details.seats {
            by_flight.entry(seat.flight_id).or_default().push(seat.seat_number);
        }
        for (flight_id, seat_numbers) in by_flight {
            self.publish(SeatEvent::SeatsHeld {
                flight_id,
                booking_id,
                seat_numbers,
                held_until: new.hold_expires_at,
            });
        }
    }
}
