use chrono::NaiveTime;
use skyhold_core::validation::{validate_new_flight, validate_new_passenger};
use skyhold_core::{BookingError, BookingResult, Flight, FlightStatus, NewFlight, NewPassenger, Passenger, SeatLayout};
use tracing::info;
use uuid::Uuid;

use crate::engine::ReservationEngine;

impl ReservationEngine {
    /// Creates the flight with every seat of `layout` available.
    pub async fn create_flight(&self, new: NewFlight, layout: Option<SeatLayout>) -> BookingResult<Flight> {
        validate_new_flight(&new)?;
        let seats = layout.unwrap_or_default().expand()?;
        self.store.create_flight(new, seats, self.now()).await
    }

    pub async fn get_flight(&self, flight_id: Uuid) -> BookingResult<Flight> {
        self.store
            .get_flight(flight_id)
            .await?
            .ok_or(BookingError::FlightNotFound(flight_id))
    }

    pub async fn update_flight_status(
        &self,
        flight_id: Uuid,
        status: FlightStatus,
        departure_time: Option<NaiveTime>,
        arrival_time: Option<NaiveTime>,
    ) -> BookingResult<Flight> {
        let flight = self
            .store
            .update_flight_schedule(flight_id, status, departure_time, arrival_time, self.now())
            .await?;
        info!("Flight {} is now {}", flight.flight_number, flight.status);
        Ok(flight)
    }

    pub async fn create_passenger(&self, new: NewPassenger) -> BookingResult<Passenger> {
        let now = self.now();
        validate_new_passenger(&new, now.date_naive())?;
        let passenger = self.store.create_passenger(new, now).await?;
        info!("Passenger {} registered ({})", passenger.id, passenger.email);
        Ok(passenger)
    }
}
