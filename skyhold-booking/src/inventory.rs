use serde::Serialize;
use skyhold_core::{BookingError, BookingResult, CabinAvailability, CabinClass, Seat, SeatStatus};
use uuid::Uuid;

use crate::engine::ReservationEngine;

/// One cell of a seat map, with an expired hold already shown as available.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SeatMapEntry {
    pub seat_id: Uuid,
    pub seat_number: String,
    pub cabin_class: CabinClass,
    pub status: SeatStatus,
}

impl ReservationEngine {
    /// Seats open for selection right now. Empty, never an error, when
    /// nothing matches.
    pub async fn list_available_seats(
        &self,
        flight_id: Uuid,
        cabin_class: Option<CabinClass>,
    ) -> BookingResult<Vec<Seat>> {
        self.store.list_available_seats(flight_id, cabin_class, self.now()).await
    }

    pub async fn cabin_availability(&self, flight_id: Uuid) -> BookingResult<Vec<CabinAvailability>> {
        self.store.cabin_availability(flight_id, self.now()).await
    }

    pub async fn seat_map(&self, flight_id: Uuid) -> BookingResult<Vec<SeatMapEntry>> {
        let now = self.now();
        if self.store.get_flight(flight_id).await?.is_none() {
            return Err(BookingError::FlightNotFound(flight_id));
        }

        let seats = self.store.list_seats(flight_id).await?;
        Ok(seats
            .into_iter()
            .map(|seat| SeatMapEntry {
                status: seat.effective_status(now),
                seat_id: seat.id,
                seat_number: seat.seat_number,
                cabin_class: seat.cabin_class,
            })
            .collect())
    }
}
