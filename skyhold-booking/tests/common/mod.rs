#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use skyhold_booking::{EngineSettings, MockPaymentAdapter, ReservationEngine};
use skyhold_core::{
    BookingDetails, BookingError, BookingHandle, BookingResult, CabinAvailability, CabinClass, CancellationSummary,
    Flight, FlightStatus, ManualClock, NewBooking, NewFlight, NewPassenger, NewSeat, Passenger, PassengerType,
    PaymentAdapter, ReferenceGenerator, ReservationStore, Seat, SeatRequest, SettlementOutcome, Sex,
};
use skyhold_store::MemoryReservationStore;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
    pub engine: ReservationEngine,
    pub clock: Arc<ManualClock>,
    pub payments: Arc<MockPaymentAdapter>,
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap()
}

pub fn harness() -> Harness {
    harness_with(EngineSettings::default())
}

pub fn harness_with(settings: EngineSettings) -> Harness {
    let clock = Arc::new(ManualClock::new(start()));
    let payments = Arc::new(MockPaymentAdapter::new());
    let engine = ReservationEngine::new(
        Arc::new(MemoryReservationStore::new()),
        payments.clone(),
        clock.clone(),
        settings,
    );
    Harness { engine, clock, payments }
}

/// Engine wired to a caller-supplied gateway, sharing the given clock.
pub fn engine_with_adapter(adapter: Arc<dyn PaymentAdapter>, clock: Arc<ManualClock>) -> ReservationEngine {
    ReservationEngine::new(
        Arc::new(MemoryReservationStore::new()),
        adapter,
        clock,
        EngineSettings::default(),
    )
}

pub fn new_flight(number: &str, origin: &str, destination: &str) -> NewFlight {
    NewFlight {
        flight_number: number.into(),
        origin: origin.into(),
        destination: destination.into(),
        departure_date: NaiveDate::from_ymd_opt(2026, 12, 24).unwrap(),
        departure_time: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
        arrival_time: NaiveTime::from_hms_opt(9, 45, 0).unwrap(),
        price_amount: 350_000,
        price_currency: "PHP".into(),
    }
}

pub async fn seat_ids(engine: &ReservationEngine, flight_id: Uuid, numbers: &[&str]) -> Vec<Uuid> {
    let map = engine.seat_map(flight_id).await.unwrap();
    numbers
        .iter()
        .map(|number| map.iter().find(|entry| entry.seat_number == *number).unwrap().seat_id)
        .collect()
}

pub fn adult(first: &str, last: &str, email: &str) -> NewPassenger {
    NewPassenger {
        first_name: first.into(),
        last_name: last.into(),
        email: email.into(),
        phone: Some("+63 917 555 0101".into()),
        sex: Sex::Unspecified,
        date_of_birth: NaiveDate::from_ymd_opt(1988, 3, 14).unwrap(),
        passenger_type: PassengerType::Adult,
    }
}

pub fn one_way(flight_id: Uuid, seat_ids: Vec<Uuid>) -> SeatRequest {
    SeatRequest {
        adults_count: seat_ids.len() as u32,
        seat_ids,
        departing_flight_id: flight_id,
        returning_flight_id: None,
        children_count: 0,
        total_amount: 700_000,
        passenger_ids: None,
    }
}

/// In-memory store that fails chosen operations a set number of times before
/// delegating.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryReservationStore,
    /// Hold transactions to abort as if the database broke a lock cycle.
    pub lock_contention: AtomicU32,
    /// Cascades to fail, with `Integrity` unless `cascade_contention` is set.
    pub cascade_failures: AtomicU32,
    pub cascade_contention: bool,
    /// Settlements to fail; with `settle_commits_first` the write lands and
    /// only the reply is lost.
    pub settle_failures: AtomicU32,
    pub settle_commits_first: bool,
}

fn take(counter: &AtomicU32) -> bool {
    counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1)).is_ok()
}

#[async_trait]
impl ReservationStore for FlakyStore {
    async fn create_flight(&self, flight: NewFlight, seats: Vec<NewSeat>, now: DateTime<Utc>) -> BookingResult<Flight> {
        self.inner.create_flight(flight, seats, now).await
    }

    async fn get_flight(&self, flight_id: Uuid) -> BookingResult<Option<Flight>> {
        self.inner.get_flight(flight_id).await
    }

    async fn update_flight_schedule(
        &self,
        flight_id: Uuid,
        status: FlightStatus,
        departure_time: Option<NaiveTime>,
        arrival_time: Option<NaiveTime>,
        now: DateTime<Utc>,
    ) -> BookingResult<Flight> {
        self.inner.update_flight_schedule(flight_id, status, departure_time, arrival_time, now).await
    }

    async fn list_seats(&self, flight_id: Uuid) -> BookingResult<Vec<Seat>> {
        self.inner.list_seats(flight_id).await
    }

    async fn list_available_seats(
        &self,
        flight_id: Uuid,
        cabin_class: Option<CabinClass>,
        now: DateTime<Utc>,
    ) -> BookingResult<Vec<Seat>> {
        self.inner.list_available_seats(flight_id, cabin_class, now).await
    }

    async fn cabin_availability(&self, flight_id: Uuid, now: DateTime<Utc>) -> BookingResult<Vec<CabinAvailability>> {
        self.inner.cabin_availability(flight_id, now).await
    }

    async fn create_passenger(&self, passenger: NewPassenger, now: DateTime<Utc>) -> BookingResult<Passenger> {
        self.inner.create_passenger(passenger, now).await
    }

    async fn lock_seats_and_create_booking(
        &self,
        booking: &NewBooking,
        references: &ReferenceGenerator,
    ) -> BookingResult<BookingHandle> {
        if take(&self.lock_contention) {
            return Err(BookingError::Contention("deadlock detected".into()));
        }
        self.inner.lock_seats_and_create_booking(booking, references).await
    }

    async fn get_booking(&self, booking_id: Uuid) -> BookingResult<Option<BookingDetails>> {
        self.inner.get_booking(booking_id).await
    }

    async fn find_booking_by_reference(&self, reference: &str) -> BookingResult<Option<BookingDetails>> {
        self.inner.find_booking_by_reference(reference).await
    }

    async fn settle_payment(
        &self,
        booking_id: Uuid,
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> BookingResult<SettlementOutcome> {
        if take(&self.settle_failures) {
            if self.settle_commits_first {
                self.inner.settle_payment(booking_id, payment_method, now).await?;
            }
            return Err(BookingError::Storage("connection closed".into()));
        }
        self.inner.settle_payment(booking_id, payment_method, now).await
    }

    async fn cancel_flight(&self, flight_id: Uuid, now: DateTime<Utc>) -> BookingResult<CancellationSummary> {
        if take(&self.cascade_failures) {
            if self.cascade_contention {
                return Err(BookingError::Contention("deadlock detected".into()));
            }
            return Err(BookingError::Integrity("connection reset during cascade".into()));
        }
        self.inner.cancel_flight(flight_id, now).await
    }

    async fn cancel_booking(&self, booking_id: Uuid, now: DateTime<Utc>) -> BookingResult<CancellationSummary> {
        self.inner.cancel_booking(booking_id, now).await
    }

    async fn release_expired_holds(&self, now: DateTime<Utc>) -> BookingResult<Vec<Seat>> {
        self.inner.release_expired_holds(now).await
    }
}

pub fn flaky_engine(store: FlakyStore, cancellation_retries: u32) -> (ReservationEngine, Arc<MockPaymentAdapter>) {
    let payments = Arc::new(MockPaymentAdapter::new());
    let engine = ReservationEngine::new(
        Arc::new(store),
        payments.clone(),
        Arc::new(ManualClock::new(start())),
        EngineSettings { cancellation_retries, ..EngineSettings::default() },
    );
    (engine, payments)
}
