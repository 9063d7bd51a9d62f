use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::booking::{BookingDetails, BookingHandle, CancellationSummary, NewBooking, SettlementOutcome};
use crate::error::BookingResult;
use crate::flight::{Flight, FlightStatus, NewFlight};
use crate::passenger::{NewPassenger, Passenger};
use crate::reference::ReferenceGenerator;
use crate::seat::{CabinAvailability, CabinClass, NewSeat, Seat};

/// Shared reservation storage. Every method is one atomic unit: implementations
/// must guarantee that two concurrent `lock_seats_and_create_booking` calls with
/// overlapping seats never both succeed, and that seat state is only mutated
/// through these methods.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn create_flight(&self, flight: NewFlight, seats: Vec<NewSeat>, now: DateTime<Utc>) -> BookingResult<Flight>;

    async fn get_flight(&self, flight_id: Uuid) -> BookingResult<Option<Flight>>;

    /// Sets `active`/`delayed` and optionally new times. Cancelled flights are
    /// final and are rejected with `FlightCancelled`.
    async fn update_flight_schedule(
        &self,
        flight_id: Uuid,
        status: FlightStatus,
        departure_time: Option<NaiveTime>,
        arrival_time: Option<NaiveTime>,
        now: DateTime<Utc>,
    ) -> BookingResult<Flight>;

    /// Every seat of the flight, raw stored status, ordered by seat number.
    async fn list_seats(&self, flight_id: Uuid) -> BookingResult<Vec<Seat>>;

    /// Seats available at `now` under the lazy-expiry rule.
    async fn list_available_seats(
        &self,
        flight_id: Uuid,
        cabin_class: Option<CabinClass>,
        now: DateTime<Utc>,
    ) -> BookingResult<Vec<Seat>>;

    async fn cabin_availability(&self, flight_id: Uuid, now: DateTime<Utc>) -> BookingResult<Vec<CabinAvailability>>;

    async fn create_passenger(&self, passenger: NewPassenger, now: DateTime<Utc>) -> BookingResult<Passenger>;

    async fn lock_seats_and_create_booking(
        &self,
        booking: &NewBooking,
        references: &ReferenceGenerator,
    ) -> BookingResult<BookingHandle>;

    async fn get_booking(&self, booking_id: Uuid) -> BookingResult<Option<BookingDetails>>;

    async fn find_booking_by_reference(&self, reference: &str) -> BookingResult<Option<BookingDetails>>;

    /// Moves a pending booking to confirmed/paid and its held seats to booked.
    async fn settle_payment(
        &self,
        booking_id: Uuid,
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> BookingResult<SettlementOutcome>;

    async fn cancel_flight(&self, flight_id: Uuid, now: DateTime<Utc>) -> BookingResult<CancellationSummary>;

    async fn cancel_booking(&self, booking_id: Uuid, now: DateTime<Utc>) -> BookingResult<CancellationSummary>;

    /// Proactively flips expired holds back to `available`. Returns the released seats.
    async fn release_expired_holds(&self, now: DateTime<Utc>) -> BookingResult<Vec<Seat>>;
}
