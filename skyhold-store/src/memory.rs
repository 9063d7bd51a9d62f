use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use skyhold_core::seat::seat_order;
use skyhold_core::{
    Booking, BookingDetails, BookingError, BookingHandle, BookingResult, CabinAvailability, CabinClass,
    CancellationSummary, Flight, FlightStatus, NewBooking, NewFlight, NewPassenger, NewSeat, Passenger,
    PaymentStatus, ReferenceGenerator, ReservationStore, Seat, SeatStatus, SettlementOutcome,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    flights: HashMap<Uuid, Flight>,
    seats: HashMap<Uuid, Seat>,
    passengers: HashMap<Uuid, Passenger>,
    bookings: HashMap<Uuid, Booking>,
    booking_seats: HashMap<Uuid, Vec<Uuid>>,
    booking_passengers: HashMap<Uuid, Vec<Uuid>>,
    references: HashMap<String, Uuid>,
}

impl MemoryState {
    fn sorted(mut seats: Vec<Seat>) -> Vec<Seat> {
        seats.sort_by_key(|seat| seat_order(&seat.seat_number));
        seats
    }

    fn flight_seats(&self, flight_id: Uuid) -> impl Iterator<Item = &Seat> {
        self.seats.values().filter(move |seat| seat.flight_id == flight_id)
    }

    fn details(&self, booking: &Booking) -> BookingDetails {
        let passengers = self
            .booking_passengers
            .get(&booking.id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.passengers.get(id).cloned())
            .collect();
        let seats = self
            .booking_seats
            .get(&booking.id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.seats.get(id).cloned())
            .collect();

        BookingDetails { booking: booking.clone(), passengers, seats: Self::sorted(seats) }
    }

    /// Cancels every listed booking and releases the seats each still owns.
    fn cascade_cancel(&mut self, booking_ids: &[Uuid], now: DateTime<Utc>) -> CancellationSummary {
        let mut summary = CancellationSummary::default();

        for booking_id in booking_ids {
            let Some(booking) = self.bookings.get_mut(booking_id) else { continue };
            if let Some(refund) = booking.cancel(now) {
                summary.refunds.push(refund);
            }
            summary.cancelled_bookings.push(*booking_id);

            for seat in self.seats.values_mut() {
                if seat.booking_id == Some(*booking_id) {
                    seat.release();
                    summary.released_seats.push(seat.clone());
                }
            }
        }

        summary.released_seats = Self::sorted(summary.released_seats);
        summary
    }
}

/// In-process reservation store. One async mutex guards the whole state and is
/// held for the full duration of each operation, which gives every method the
/// same all-or-nothing behaviour as a database transaction.
#[derive(Clone, Default)]
pub struct MemoryReservationStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn create_flight(&self, new: NewFlight, seats: Vec<NewSeat>, now: DateTime<Utc>) -> BookingResult<Flight> {
        let flight = Flight::from_new(new, now);
        let mut state = self.state.lock().await;

        let mut numbers = HashSet::new();
        if let Some(dup) = seats.iter().find(|s| !numbers.insert(s.seat_number.as_str())) {
            return Err(BookingError::Validation(format!("duplicate seat number {}", dup.seat_number)));
        }

        for new_seat in &seats {
            let seat = Seat::new(flight.id, new_seat.seat_number.clone(), new_seat.cabin_class);
            state.seats.insert(seat.id, seat);
        }
        state.flights.insert(flight.id, flight.clone());

        info!("Flight {} provisioned with {} seats", flight.flight_number, seats.len());
        Ok(flight)
    }

    async fn get_flight(&self, flight_id: Uuid) -> BookingResult<Option<Flight>> {
        Ok(self.state.lock().await.flights.get(&flight_id).cloned())
    }

    async fn update_flight_schedule(
        &self,
        flight_id: Uuid,
        status: FlightStatus,
        departure_time: Option<NaiveTime>,
        arrival_time: Option<NaiveTime>,
        now: DateTime<Utc>,
    ) -> BookingResult<Flight> {
        if status == FlightStatus::Cancelled {
            return Err(BookingError::Validation("flights are cancelled through cancel_flight".into()));
        }

        let mut state = self.state.lock().await;
        let flight = state
            .flights
            .get_mut(&flight_id)
            .ok_or(BookingError::FlightNotFound(flight_id))?;
        if flight.status == FlightStatus::Cancelled {
            return Err(BookingError::FlightCancelled(flight_id));
        }

        flight.status = status;
        if let Some(departure) = departure_time {
            flight.departure_time = departure;
        }
        if let Some(arrival) = arrival_time {
            flight.arrival_time = arrival;
        }
        flight.updated_at = now;
        Ok(flight.clone())
    }

    async fn list_seats(&self, flight_id: Uuid) -> BookingResult<Vec<Seat>> {
        let state = self.state.lock().await;
        Ok(MemoryState::sorted(state.flight_seats(flight_id).cloned().collect()))
    }

    async fn list_available_seats(
        &self,
        flight_id: Uuid,
        cabin_class: Option<CabinClass>,
        now: DateTime<Utc>,
    ) -> BookingResult<Vec<Seat>> {
        let state = self.state.lock().await;
        let seats = state
            .flight_seats(flight_id)
            .filter(|seat| cabin_class.map_or(true, |cabin| seat.cabin_class == cabin))
            .filter(|seat| seat.is_available_at(now))
            .cloned()
            .collect();
        Ok(MemoryState::sorted(seats))
    }

    async fn cabin_availability(&self, flight_id: Uuid, now: DateTime<Utc>) -> BookingResult<Vec<CabinAvailability>> {
        let state = self.state.lock().await;
        let mut cabins: BTreeMap<CabinClass, CabinAvailability> = BTreeMap::new();

        for seat in state.flight_seats(flight_id) {
            let entry = cabins.entry(seat.cabin_class).or_insert(CabinAvailability {
                cabin_class: seat.cabin_class,
                total: 0,
                available: 0,
            });
            entry.total += 1;
            if seat.is_available_at(now) {
                entry.available += 1;
            }
        }

        Ok(cabins.into_values().collect())
    }

    async fn create_passenger(&self, new: NewPassenger, now: DateTime<Utc>) -> BookingResult<Passenger> {
        let passenger = Passenger::from_new(new, now);
        self.state.lock().await.passengers.insert(passenger.id, passenger.clone());
        Ok(passenger)
    }

    async fn lock_seats_and_create_booking(
        &self,
        new: &NewBooking,
        references: &ReferenceGenerator,
    ) -> BookingResult<BookingHandle> {
        let request = &new.request;
        let now = new.created_at;
        let mut state = self.state.lock().await;

        for flight_id in request.flight_ids() {
            let flight = state
                .flights
                .get(&flight_id)
                .ok_or(BookingError::FlightNotFound(flight_id))?;
            if !flight.is_bookable() {
                return Err(BookingError::FlightCancelled(flight_id));
            }
        }

        let seats: Vec<Seat> = request
            .seat_ids
            .iter()
            .filter_map(|id| state.seats.get(id).cloned())
            .collect();
        request.verify_locked_seats(&seats, now)?;

        let passenger_ids = request.passenger_ids.clone().unwrap_or_default();
        if let Some(missing) = passenger_ids.iter().find(|id| !state.passengers.contains_key(id)) {
            return Err(BookingError::PassengerNotFound(*missing));
        }

        let mut attempts = 0;
        let reference = loop {
            attempts += 1;
            let candidate = references.generate();
            if !state.references.contains_key(&candidate) {
                break candidate;
            }
            if attempts >= references.max_attempts() {
                return Err(BookingError::ReferenceGenerationExhausted { attempts });
            }
            warn!("Booking reference collision on attempt {}, retrying", attempts);
        };

        // Everything below is infallible, so the booking lands whole or not at all.
        let booking = Booking::from_new(new, reference.clone());
        state.references.insert(reference.clone(), booking.id);
        state.bookings.insert(booking.id, booking);
        state.booking_seats.insert(new.id, request.seat_ids.clone());
        state.booking_passengers.insert(new.id, passenger_ids);
        for seat_id in &request.seat_ids {
            if let Some(seat) = state.seats.get_mut(seat_id) {
                seat.hold(new.id, new.hold_expires_at);
            }
        }

        Ok(BookingHandle { booking_id: new.id, booking_reference: reference })
    }

    async fn get_booking(&self, booking_id: Uuid) -> BookingResult<Option<BookingDetails>> {
        let state = self.state.lock().await;
        Ok(state.bookings.get(&booking_id).map(|booking| state.details(booking)))
    }

    async fn find_booking_by_reference(&self, reference: &str) -> BookingResult<Option<BookingDetails>> {
        let state = self.state.lock().await;
        let Some(id) = state.references.get(&ReferenceGenerator::normalize(reference)) else {
            return Ok(None);
        };
        Ok(state.bookings.get(id).map(|booking| state.details(booking)))
    }

    async fn settle_payment(
        &self,
        booking_id: Uuid,
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> BookingResult<SettlementOutcome> {
        let mut state = self.state.lock().await;
        let booking = state
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))?;

        if booking.payment_status == PaymentStatus::Paid {
            return Ok(SettlementOutcome::AlreadyPaid { booking });
        }
        if !booking.status.is_active() {
            return Err(BookingError::BookingCancelled(booking_id));
        }

        let seat_ids = state.booking_seats.get(&booking_id).cloned().unwrap_or_default();
        let live = !seat_ids.is_empty()
            && seat_ids
                .iter()
                .all(|id| state.seats.get(id).is_some_and(|seat| seat.is_held_by(booking_id, now)));
        if !live {
            return Err(BookingError::HoldExpired(booking_id));
        }

        let mut seats = Vec::with_capacity(seat_ids.len());
        for id in &seat_ids {
            if let Some(seat) = state.seats.get_mut(id) {
                seat.book();
                seats.push(seat.clone());
            }
        }

        let booking = match state.bookings.get_mut(&booking_id) {
            Some(booking) => {
                booking.confirm_payment(payment_method, now);
                booking.clone()
            }
            None => return Err(BookingError::BookingNotFound(booking_id.to_string())),
        };

        Ok(SettlementOutcome::Settled { booking, seats: MemoryState::sorted(seats) })
    }

    async fn cancel_flight(&self, flight_id: Uuid, now: DateTime<Utc>) -> BookingResult<CancellationSummary> {
        let mut state = self.state.lock().await;
        let flight = state
            .flights
            .get(&flight_id)
            .ok_or(BookingError::FlightNotFound(flight_id))?;

        if flight.status == FlightStatus::Cancelled {
            return Ok(CancellationSummary {
                flight_id: Some(flight_id),
                already_cancelled: true,
                ..CancellationSummary::default()
            });
        }

        let mut affected: Vec<Uuid> = state
            .bookings
            .values()
            .filter(|b| b.status.is_active() && b.involves_flight(flight_id))
            .map(|b| b.id)
            .collect();
        affected.sort();

        let mut summary = state.cascade_cancel(&affected, now);
        if let Some(flight) = state.flights.get_mut(&flight_id) {
            flight.status = FlightStatus::Cancelled;
            flight.updated_at = now;
        }

        summary.flight_id = Some(flight_id);
        Ok(summary)
    }

    async fn cancel_booking(&self, booking_id: Uuid, now: DateTime<Utc>) -> BookingResult<CancellationSummary> {
        let mut state = self.state.lock().await;
        let booking = state
            .bookings
            .get(&booking_id)
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))?;

        if !booking.status.is_active() {
            return Ok(CancellationSummary { already_cancelled: true, ..CancellationSummary::default() });
        }

        Ok(state.cascade_cancel(&[booking_id], now))
    }

    async fn release_expired_holds(&self, now: DateTime<Utc>) -> BookingResult<Vec<Seat>> {
        let mut state = self.state.lock().await;
        let mut released = Vec::new();

        for seat in state.seats.values_mut() {
            if seat.status == SeatStatus::Held && seat.is_available_at(now) {
                seat.release();
                released.push(seat.clone());
            }
        }

        Ok(MemoryState::sorted(released))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use skyhold_core::{BookingStatus, PassengerType, SeatLayout, SeatRequest, Sex};

    fn new_flight() -> NewFlight {
        NewFlight {
            flight_number: "SH101".into(),
            origin: "MNL".into(),
            destination: "CEB".into(),
            departure_date: NaiveDate::from_ymd_opt(2026, 12, 24).unwrap(),
            departure_time: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            arrival_time: NaiveTime::from_hms_opt(9, 45, 0).unwrap(),
            price_amount: 350_000,
            price_currency: "PHP".into(),
        }
    }

    async fn seeded(now: DateTime<Utc>) -> (MemoryReservationStore, Flight, Vec<Seat>) {
        let store = MemoryReservationStore::new();
        let seats = SeatLayout::default().expand().unwrap();
        let flight = store.create_flight(new_flight(), seats, now).await.unwrap();
        let seats = store.list_seats(flight.id).await.unwrap();
        (store, flight, seats)
    }

    fn seat_id(seats: &[Seat], number: &str) -> Uuid {
        seats.iter().find(|s| s.seat_number == number).unwrap().id
    }

    fn hold_request(flight: &Flight, seat_ids: Vec<Uuid>, now: DateTime<Utc>) -> NewBooking {
        let adults = seat_ids.len() as u32;
        NewBooking {
            id: Uuid::new_v4(),
            request: SeatRequest {
                seat_ids,
                departing_flight_id: flight.id,
                returning_flight_id: None,
                adults_count: adults,
                children_count: 0,
                total_amount: 700_000,
                passenger_ids: None,
            },
            created_at: now,
            hold_expires_at: now + Duration::minutes(15),
        }
    }

    #[tokio::test]
    async fn test_seat_map_is_ordered_and_counted() {
        let now = Utc::now();
        let (store, flight, seats) = seeded(now).await;

        assert_eq!(seats.len(), 168);
        assert_eq!(seats[0].seat_number, "1A");
        assert_eq!(seats.last().unwrap().seat_number, "30F");

        let cabins = store.cabin_availability(flight.id, now).await.unwrap();
        assert_eq!(cabins.len(), 3);
        assert_eq!(cabins[0].cabin_class, CabinClass::First);
        assert_eq!(cabins[0].total, 8);
        assert_eq!(cabins[2].available, 144);
    }

    #[tokio::test]
    async fn test_hold_blocks_then_lapses() {
        let now = Utc::now();
        let (store, flight, seats) = seeded(now).await;
        let seat = seat_id(&seats, "12A");

        store
            .lock_seats_and_create_booking(&hold_request(&flight, vec![seat], now), &ReferenceGenerator::default())
            .await
            .unwrap();

        let economy = store.list_available_seats(flight.id, Some(CabinClass::Economy), now).await.unwrap();
        assert!(economy.iter().all(|s| s.id != seat));

        // Still held at exactly the expiry instant.
        let at_expiry = now + Duration::minutes(15);
        let second = hold_request(&flight, vec![seat], at_expiry);
        let err = store
            .lock_seats_and_create_booking(&second, &ReferenceGenerator::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SeatUnavailable { ref seats } if seats == &["12A".to_string()]));

        let later = at_expiry + Duration::seconds(1);
        let economy = store.list_available_seats(flight.id, Some(CabinClass::Economy), later).await.unwrap();
        assert!(economy.iter().any(|s| s.id == seat));

        let third = hold_request(&flight, vec![seat], later);
        assert!(store.lock_seats_and_create_booking(&third, &ReferenceGenerator::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_overlapping_requests_have_one_winner() {
        let now = Utc::now();
        let (store, flight, seats) = seeded(now).await;
        let a = seat_id(&seats, "12A");
        let b = seat_id(&seats, "12B");
        let c = seat_id(&seats, "12C");

        let first = hold_request(&flight, vec![a, b], now);
        let second = hold_request(&flight, vec![b, c], now);
        let references = ReferenceGenerator::default();

        let (r1, r2) = tokio::join!(
            store.lock_seats_and_create_booking(&first, &references),
            store.lock_seats_and_create_booking(&second, &references),
        );
        assert!(r1.is_ok() ^ r2.is_ok());

        let loser = if r1.is_ok() { r2 } else { r1 };
        assert!(matches!(loser, Err(BookingError::SeatUnavailable { ref seats }) if seats == &["12B".to_string()]));

        // The loser left nothing behind.
        let held = store
            .list_seats(flight.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|s| s.status == SeatStatus::Held)
            .count();
        assert_eq!(held, 2);
    }

    #[tokio::test]
    async fn test_reference_exhaustion_rolls_back() {
        let now = Utc::now();
        let (store, flight, seats) = seeded(now).await;
        let references = ReferenceGenerator::scripted(vec!["K7PQ2MZX".into()], 3);

        store
            .lock_seats_and_create_booking(&hold_request(&flight, vec![seat_id(&seats, "7A")], now), &references)
            .await
            .unwrap();

        let err = store
            .lock_seats_and_create_booking(&hold_request(&flight, vec![seat_id(&seats, "7B")], now), &references)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::ReferenceGenerationExhausted { attempts: 3 }));

        let available = store.list_available_seats(flight.id, None, now).await.unwrap();
        assert!(available.iter().any(|s| s.seat_number == "7B"));
    }

    #[tokio::test]
    async fn test_settle_then_cancel_flight_refunds() {
        let now = Utc::now();
        let (store, flight, seats) = seeded(now).await;
        let passenger = store
            .create_passenger(
                NewPassenger {
                    first_name: "Ana".into(),
                    last_name: "Reyes".into(),
                    email: "ana@example.com".into(),
                    phone: None,
                    sex: Sex::Female,
                    date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
                    passenger_type: PassengerType::Adult,
                },
                now,
            )
            .await
            .unwrap();

        let mut new = hold_request(&flight, vec![seat_id(&seats, "3A")], now);
        new.request.passenger_ids = Some(vec![passenger.id]);
        let handle = store.lock_seats_and_create_booking(&new, &ReferenceGenerator::default()).await.unwrap();

        let outcome = store.settle_payment(handle.booking_id, "credit_card", now).await.unwrap();
        assert!(matches!(outcome, SettlementOutcome::Settled { ref seats, .. } if seats[0].status == SeatStatus::Booked));
        let again = store.settle_payment(handle.booking_id, "credit_card", now).await.unwrap();
        assert!(matches!(again, SettlementOutcome::AlreadyPaid { .. }));

        let details = store
            .find_booking_by_reference(&handle.booking_reference.to_lowercase())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.passengers.len(), 1);
        assert_eq!(details.booking.status, BookingStatus::Confirmed);

        let summary = store.cancel_flight(flight.id, now).await.unwrap();
        assert_eq!(summary.cancelled_bookings, vec![handle.booking_id]);
        assert_eq!(summary.refunds.len(), 1);
        assert_eq!(summary.released_seats.len(), 1);

        let booking = store.get_booking(handle.booking_id).await.unwrap().unwrap().booking;
        assert_eq!(booking.payment_status, PaymentStatus::Refunded);

        let repeat = store.cancel_flight(flight.id, now).await.unwrap();
        assert!(repeat.already_cancelled);
    }

    #[tokio::test]
    async fn test_cancel_does_not_release_reclaimed_seat() {
        let now = Utc::now();
        let (store, flight, seats) = seeded(now).await;
        let seat = seat_id(&seats, "20F");
        let references = ReferenceGenerator::default();

        let stale = store
            .lock_seats_and_create_booking(&hold_request(&flight, vec![seat], now), &references)
            .await
            .unwrap();
        let later = now + Duration::minutes(20);
        let fresh = store
            .lock_seats_and_create_booking(&hold_request(&flight, vec![seat], later), &references)
            .await
            .unwrap();

        let summary = store.cancel_booking(stale.booking_id, later).await.unwrap();
        assert!(summary.released_seats.is_empty());

        let details = store.get_booking(fresh.booking_id).await.unwrap().unwrap();
        assert!(details.lapsed_seats(later).is_empty());
        assert!(matches!(
            store.settle_payment(stale.booking_id, "credit_card", later).await,
            Err(BookingError::BookingCancelled(_))
        ));
    }

    #[tokio::test]
    async fn test_reaper_releases_only_expired_holds() {
        let now = Utc::now();
        let (store, flight, seats) = seeded(now).await;
        let references = ReferenceGenerator::default();

        store
            .lock_seats_and_create_booking(&hold_request(&flight, vec![seat_id(&seats, "8A")], now), &references)
            .await
            .unwrap();
        let later = now + Duration::minutes(10);
        store
            .lock_seats_and_create_booking(&hold_request(&flight, vec![seat_id(&seats, "8B")], later), &references)
            .await
            .unwrap();

        let released = store.release_expired_holds(now + Duration::minutes(16)).await.unwrap();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].seat_number, "8A");
        assert!(released[0].booking_id.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_flight_is_final() {
        let now = Utc::now();
        let (store, flight, _) = seeded(now).await;

        let delayed = store
            .update_flight_schedule(flight.id, FlightStatus::Delayed, NaiveTime::from_hms_opt(10, 0, 0), None, now)
            .await
            .unwrap();
        assert_eq!(delayed.status, FlightStatus::Delayed);
        assert_eq!(delayed.departure_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());

        store.cancel_flight(flight.id, now).await.unwrap();
        let err = store
            .update_flight_schedule(flight.id, FlightStatus::Active, None, None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::FlightCancelled(_)));
    }
}
