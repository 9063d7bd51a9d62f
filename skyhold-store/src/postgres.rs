use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use skyhold_core::{
    Booking, BookingDetails, BookingError, BookingHandle, BookingResult, CabinAvailability, CabinClass,
    CancellationSummary, Flight, FlightStatus, NewBooking, NewFlight, NewPassenger, NewSeat, Passenger,
    PaymentStatus, RefundDue, ReferenceGenerator, ReservationStore, Seat, SettlementOutcome,
};
use skyhold_core::seat::seat_order;
use sqlx::{Acquire, PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::DbClient;
use crate::rows::{
    convert_all, BookingRow, CabinCountRow, FlightRow, PassengerRow, SeatRow, BOOKING_COLUMNS,
    FLIGHT_COLUMNS, PASSENGER_COLUMNS, SEAT_COLUMNS,
};

const REFERENCE_CONSTRAINT: &str = "bookings_booking_reference_key";

/// SQLSTATEs for which Postgres rolled the transaction back and a rerun is safe:
/// `serialization_failure` and `deadlock_detected`.
const RETRYABLE_SQLSTATES: &[&str] = &["40001", "40P01"];

/// Lazy-expiry rule in SQL; `$n` binds "now". Must agree with `Seat::is_available_at`.
fn available_predicate(now_param: usize) -> String {
    format!(
        "(s.status = 'available' OR (s.status = 'held' AND s.hold_expires_at < ${}))",
        now_param
    )
}

fn is_contention(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref()))
}

fn storage(err: sqlx::Error) -> BookingError {
    if is_contention(&err) {
        return BookingError::Contention(err.to_string());
    }
    BookingError::Storage(err.to_string())
}

fn integrity(err: sqlx::Error) -> BookingError {
    if is_contention(&err) {
        return BookingError::Contention(err.to_string());
    }
    BookingError::Integrity(err.to_string())
}

fn is_reference_collision(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation() && db.constraint() == Some(REFERENCE_CONSTRAINT))
}

/// Reservation store backed by Postgres. Seat rows are locked `FOR UPDATE` in
/// id order inside each write transaction, so overlapping lockers serialize
/// and the loser re-reads the winner's holds. Every path that writes seats
/// takes its row locks in that same order, bookings before seats.
#[derive(Clone)]
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn from_client(db: &DbClient) -> Self {
        Self::new(db.pool.clone())
    }

    async fn fetch_flight(conn: &mut PgConnection, flight_id: Uuid, lock: &str) -> BookingResult<Option<Flight>> {
        let sql = format!("SELECT {} FROM flights WHERE id = $1 {}", FLIGHT_COLUMNS, lock);
        sqlx::query_as::<_, FlightRow>(&sql)
            .bind(flight_id)
            .fetch_optional(conn)
            .await
            .map_err(storage)?
            .map(Flight::try_from)
            .transpose()
    }

    async fn fetch_booking(conn: &mut PgConnection, booking_id: Uuid, lock: &str) -> BookingResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1 {}", BOOKING_COLUMNS, lock);
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(booking_id)
            .fetch_optional(conn)
            .await
            .map_err(storage)?
            .map(Booking::try_from)
            .transpose()
    }

    async fn fetch_booking_seats(conn: &mut PgConnection, booking_id: Uuid, lock: &str) -> BookingResult<Vec<Seat>> {
        let sql = format!(
            "SELECT {} FROM seats s JOIN booking_seats bs ON bs.seat_id = s.id \
             WHERE bs.booking_id = $1 ORDER BY s.id {}",
            SEAT_COLUMNS, lock
        );
        let rows = sqlx::query_as::<_, SeatRow>(&sql)
            .bind(booking_id)
            .fetch_all(conn)
            .await
            .map_err(storage)?;
        let mut seats: Vec<Seat> = convert_all(rows)?;
        seats.sort_by_key(|seat| seat_order(&seat.seat_number));
        Ok(seats)
    }

    async fn load_details(conn: &mut PgConnection, booking: Booking) -> BookingResult<BookingDetails> {
        let sql = format!(
            "SELECT {} FROM passengers p JOIN booking_passengers bp ON bp.passenger_id = p.id \
             WHERE bp.booking_id = $1 ORDER BY p.created_at, p.id",
            PASSENGER_COLUMNS
        );
        let rows = sqlx::query_as::<_, PassengerRow>(&sql)
            .bind(booking.id)
            .fetch_all(&mut *conn)
            .await
            .map_err(storage)?;
        let passengers = convert_all(rows)?;
        let seats = Self::fetch_booking_seats(conn, booking.id, "").await?;

        Ok(BookingDetails { booking, passengers, seats })
    }

    /// Cancels the given bookings and releases every seat they still own.
    /// Runs inside the caller's transaction; any failure is an integrity fault.
    async fn cascade_cancel(
        conn: &mut PgConnection,
        mut bookings: Vec<Booking>,
        now: DateTime<Utc>,
    ) -> BookingResult<(Vec<Uuid>, Vec<RefundDue>, Vec<Seat>)> {
        let refunds: Vec<RefundDue> = bookings.iter_mut().filter_map(|b| b.cancel(now)).collect();
        let ids: Vec<Uuid> = bookings.iter().map(|b| b.id).collect();
        if ids.is_empty() {
            return Ok((ids, refunds, Vec::new()));
        }

        sqlx::query(
            "UPDATE bookings SET status = 'cancelled', \
             payment_status = CASE WHEN payment_status = 'paid' THEN 'refunded' ELSE payment_status END, \
             updated_at = $2 WHERE id = ANY($1)",
        )
        .bind(ids.clone())
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(integrity)?;

        let owned: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM seats WHERE booking_id = ANY($1) ORDER BY id FOR UPDATE")
                .bind(ids.clone())
                .fetch_all(&mut *conn)
                .await
                .map_err(integrity)?;

        // A seat reclaimed by another booking while we waited drops out of the
        // re-checked WHERE clause and stays with its new owner.
        let sql = format!(
            "UPDATE seats s SET status = 'available', hold_expires_at = NULL, booking_id = NULL \
             WHERE s.id = ANY($1) AND s.booking_id = ANY($2) RETURNING {}",
            SEAT_COLUMNS
        );
        let rows = sqlx::query_as::<_, SeatRow>(&sql)
            .bind(owned)
            .bind(ids.clone())
            .fetch_all(&mut *conn)
            .await
            .map_err(integrity)?;
        let released = convert_all(rows)?;

        Ok((ids, refunds, released))
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn create_flight(&self, new: NewFlight, seats: Vec<NewSeat>, now: DateTime<Utc>) -> BookingResult<Flight> {
        let flight = Flight::from_new(new, now);
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            "INSERT INTO flights (id, flight_number, origin, destination, departure_date, departure_time, \
             arrival_time, price_amount, price_currency, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(flight.id)
        .bind(&flight.flight_number)
        .bind(&flight.origin)
        .bind(&flight.destination)
        .bind(flight.departure_date)
        .bind(flight.departure_time)
        .bind(flight.arrival_time)
        .bind(flight.price_amount)
        .bind(&flight.price_currency)
        .bind(flight.status.as_str())
        .bind(flight.created_at)
        .bind(flight.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        for new_seat in &seats {
            let seat = Seat::new(flight.id, new_seat.seat_number.clone(), new_seat.cabin_class);
            sqlx::query(
                "INSERT INTO seats (id, flight_id, seat_number, cabin_class, status) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(seat.id)
            .bind(seat.flight_id)
            .bind(&seat.seat_number)
            .bind(seat.cabin_class.as_str())
            .bind(seat.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        info!("Flight {} provisioned with {} seats", flight.flight_number, seats.len());
        Ok(flight)
    }

    async fn get_flight(&self, flight_id: Uuid) -> BookingResult<Option<Flight>> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        Self::fetch_flight(&mut conn, flight_id, "").await
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

        let mut tx = self.pool.begin().await.map_err(storage)?;
        let current = Self::fetch_flight(&mut tx, flight_id, "FOR UPDATE")
            .await?
            .ok_or(BookingError::FlightNotFound(flight_id))?;
        if current.status == FlightStatus::Cancelled {
            return Err(BookingError::FlightCancelled(flight_id));
        }

        let sql = format!(
            "UPDATE flights SET status = $2, departure_time = COALESCE($3, departure_time), \
             arrival_time = COALESCE($4, arrival_time), updated_at = $5 WHERE id = $1 RETURNING {}",
            FLIGHT_COLUMNS
        );
        let row = sqlx::query_as::<_, FlightRow>(&sql)
            .bind(flight_id)
            .bind(status.as_str())
            .bind(departure_time)
            .bind(arrival_time)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Flight::try_from(row)
    }

    async fn list_seats(&self, flight_id: Uuid) -> BookingResult<Vec<Seat>> {
        let sql = format!("SELECT {} FROM seats s WHERE s.flight_id = $1", SEAT_COLUMNS);
        let rows = sqlx::query_as::<_, SeatRow>(&sql)
            .bind(flight_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        let mut seats: Vec<Seat> = convert_all(rows)?;
        seats.sort_by_key(|seat| seat_order(&seat.seat_number));
        Ok(seats)
    }

    async fn list_available_seats(
        &self,
        flight_id: Uuid,
        cabin_class: Option<CabinClass>,
        now: DateTime<Utc>,
    ) -> BookingResult<Vec<Seat>> {
        let sql = format!(
            "SELECT {} FROM seats s WHERE s.flight_id = $1 \
             AND ($2::TEXT IS NULL OR s.cabin_class = $2) AND {}",
            SEAT_COLUMNS,
            available_predicate(3)
        );
        let rows = sqlx::query_as::<_, SeatRow>(&sql)
            .bind(flight_id)
            .bind(cabin_class.map(|c| c.as_str()))
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        let mut seats: Vec<Seat> = convert_all(rows)?;
        seats.sort_by_key(|seat| seat_order(&seat.seat_number));
        Ok(seats)
    }

    async fn cabin_availability(&self, flight_id: Uuid, now: DateTime<Utc>) -> BookingResult<Vec<CabinAvailability>> {
        let sql = format!(
            "SELECT s.cabin_class, COUNT(*) AS total, COUNT(*) FILTER (WHERE {}) AS available \
             FROM seats s WHERE s.flight_id = $1 GROUP BY s.cabin_class",
            available_predicate(2)
        );
        let rows = sqlx::query_as::<_, CabinCountRow>(&sql)
            .bind(flight_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        let mut cabins: Vec<CabinAvailability> = convert_all(rows)?;
        cabins.sort_by_key(|c| c.cabin_class);
        Ok(cabins)
    }

    async fn create_passenger(&self, new: NewPassenger, now: DateTime<Utc>) -> BookingResult<Passenger> {
        let passenger = Passenger::from_new(new, now);
        sqlx::query(
            "INSERT INTO passengers (id, first_name, last_name, email, phone, sex, date_of_birth, passenger_type, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(passenger.id)
        .bind(&passenger.first_name)
        .bind(&passenger.last_name)
        .bind(passenger.email.expose())
        .bind(passenger.phone.as_ref().map(|p| p.expose().clone()))
        .bind(passenger.sex.as_str())
        .bind(passenger.date_of_birth)
        .bind(passenger.passenger_type.as_str())
        .bind(passenger.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(passenger)
    }

    async fn lock_seats_and_create_booking(
        &self,
        new: &NewBooking,
        references: &ReferenceGenerator,
    ) -> BookingResult<BookingHandle> {
        let request = &new.request;
        let now = new.created_at;
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // FOR SHARE blocks a concurrent cancel_flight until this booking commits,
        // so the cascade sees it.
        let flight_ids = request.flight_ids();
        let sql = format!("SELECT {} FROM flights WHERE id = ANY($1) ORDER BY id FOR SHARE", FLIGHT_COLUMNS);
        let rows = sqlx::query_as::<_, FlightRow>(&sql)
            .bind(flight_ids.clone())
            .fetch_all(&mut *tx)
            .await
            .map_err(storage)?;
        let flights: Vec<Flight> = convert_all(rows)?;
        for flight_id in &flight_ids {
            let flight = flights
                .iter()
                .find(|f| f.id == *flight_id)
                .ok_or(BookingError::FlightNotFound(*flight_id))?;
            if !flight.is_bookable() {
                return Err(BookingError::FlightCancelled(*flight_id));
            }
        }

        let sql = format!("SELECT {} FROM seats s WHERE s.id = ANY($1) ORDER BY s.id FOR UPDATE", SEAT_COLUMNS);
        let rows = sqlx::query_as::<_, SeatRow>(&sql)
            .bind(request.seat_ids.clone())
            .fetch_all(&mut *tx)
            .await
            .map_err(storage)?;
        let seats: Vec<Seat> = convert_all(rows)?;
        request.verify_locked_seats(&seats, now)?;

        let passenger_ids = request.passenger_ids.clone().unwrap_or_default();
        if !passenger_ids.is_empty() {
            let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM passengers WHERE id = ANY($1)")
                .bind(passenger_ids.clone())
                .fetch_all(&mut *tx)
                .await
                .map_err(storage)?;
            if let Some(missing) = passenger_ids.iter().find(|id| !found.contains(id)) {
                return Err(BookingError::PassengerNotFound(*missing));
            }
        }

        let mut attempts = 0;
        let reference = loop {
            attempts += 1;
            let candidate = references.generate();
            let booking = Booking::from_new(new, candidate.clone());

            let mut savepoint = tx.begin().await.map_err(storage)?;
            let inserted = sqlx::query(
                "INSERT INTO bookings (id, booking_reference, departing_flight_id, returning_flight_id, \
                 adults_count, children_count, total_amount, status, payment_status, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(booking.id)
            .bind(&booking.booking_reference)
            .bind(booking.departing_flight_id)
            .bind(booking.returning_flight_id)
            .bind(booking.adults_count as i32)
            .bind(booking.children_count as i32)
            .bind(booking.total_amount)
            .bind(booking.status.as_str())
            .bind(booking.payment_status.as_str())
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .execute(&mut *savepoint)
            .await;

            match inserted {
                Ok(_) => {
                    savepoint.commit().await.map_err(storage)?;
                    break candidate;
                }
                Err(err) if is_reference_collision(&err) => {
                    savepoint.rollback().await.map_err(storage)?;
                    if attempts >= references.max_attempts() {
                        return Err(BookingError::ReferenceGenerationExhausted { attempts });
                    }
                    warn!("Booking reference collision on attempt {}, retrying", attempts);
                }
                Err(err) => return Err(storage(err)),
            }
        };

        sqlx::query("UPDATE seats SET status = 'held', hold_expires_at = $2, booking_id = $3 WHERE id = ANY($1)")
            .bind(request.seat_ids.clone())
            .bind(new.hold_expires_at)
            .bind(new.id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        for seat_id in &request.seat_ids {
            sqlx::query("INSERT INTO booking_seats (booking_id, seat_id) VALUES ($1, $2)")
                .bind(new.id)
                .bind(seat_id)
                .execute(&mut *tx)
                .await
                .map_err(storage)?;
        }
        for passenger_id in &passenger_ids {
            sqlx::query("INSERT INTO booking_passengers (booking_id, passenger_id) VALUES ($1, $2)")
                .bind(new.id)
                .bind(passenger_id)
                .execute(&mut *tx)
                .await
                .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;

        Ok(BookingHandle { booking_id: new.id, booking_reference: reference })
    }

    async fn get_booking(&self, booking_id: Uuid) -> BookingResult<Option<BookingDetails>> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        match Self::fetch_booking(&mut conn, booking_id, "").await? {
            Some(booking) => Ok(Some(Self::load_details(&mut conn, booking).await?)),
            None => Ok(None),
        }
    }

    async fn find_booking_by_reference(&self, reference: &str) -> BookingResult<Option<BookingDetails>> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        let sql = format!("SELECT {} FROM bookings WHERE booking_reference = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(ReferenceGenerator::normalize(reference))
            .fetch_optional(&mut *conn)
            .await
            .map_err(storage)?;

        match row {
            Some(row) => {
                let booking = Booking::try_from(row)?;
                Ok(Some(Self::load_details(&mut conn, booking).await?))
            }
            None => Ok(None),
        }
    }

    async fn settle_payment(
        &self,
        booking_id: Uuid,
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> BookingResult<SettlementOutcome> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let mut booking = Self::fetch_booking(&mut tx, booking_id, "FOR UPDATE")
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))?;

        if booking.payment_status == PaymentStatus::Paid {
            tx.commit().await.map_err(storage)?;
            return Ok(SettlementOutcome::AlreadyPaid { booking });
        }
        if !booking.status.is_active() {
            return Err(BookingError::BookingCancelled(booking_id));
        }

        let mut seats = Self::fetch_booking_seats(&mut tx, booking_id, "FOR UPDATE OF s").await?;
        if seats.is_empty() || seats.iter().any(|seat| !seat.is_held_by(booking_id, now)) {
            return Err(BookingError::HoldExpired(booking_id));
        }

        let seat_ids: Vec<Uuid> = seats.iter().map(|seat| seat.id).collect();
        sqlx::query("UPDATE seats SET status = 'booked', hold_expires_at = NULL WHERE id = ANY($1)")
            .bind(seat_ids)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        booking.confirm_payment(payment_method, now);
        sqlx::query(
            "UPDATE bookings SET status = $2, payment_status = $3, payment_method = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(booking.id)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(&booking.payment_method)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        seats.iter_mut().for_each(Seat::book);
        Ok(SettlementOutcome::Settled { booking, seats })
    }

    async fn cancel_flight(&self, flight_id: Uuid, now: DateTime<Utc>) -> BookingResult<CancellationSummary> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let flight = Self::fetch_flight(&mut tx, flight_id, "FOR UPDATE")
            .await?
            .ok_or(BookingError::FlightNotFound(flight_id))?;

        if flight.status == FlightStatus::Cancelled {
            tx.commit().await.map_err(storage)?;
            return Ok(CancellationSummary {
                flight_id: Some(flight_id),
                already_cancelled: true,
                ..CancellationSummary::default()
            });
        }

        let sql = format!(
            "SELECT {} FROM bookings WHERE (departing_flight_id = $1 OR returning_flight_id = $1) \
             AND status IN ('pending', 'confirmed') ORDER BY id FOR UPDATE",
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(flight_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(integrity)?;
        let bookings: Vec<Booking> = convert_all(rows)?;

        let (cancelled_bookings, refunds, released_seats) = Self::cascade_cancel(&mut tx, bookings, now).await?;

        sqlx::query("UPDATE flights SET status = 'cancelled', updated_at = $2 WHERE id = $1")
            .bind(flight_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(integrity)?;

        tx.commit().await.map_err(integrity)?;

        Ok(CancellationSummary {
            flight_id: Some(flight_id),
            cancelled_bookings,
            refunds,
            released_seats,
            already_cancelled: false,
        })
    }

    async fn cancel_booking(&self, booking_id: Uuid, now: DateTime<Utc>) -> BookingResult<CancellationSummary> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let booking = Self::fetch_booking(&mut tx, booking_id, "FOR UPDATE")
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))?;

        if !booking.status.is_active() {
            tx.commit().await.map_err(storage)?;
            return Ok(CancellationSummary { already_cancelled: true, ..CancellationSummary::default() });
        }

        let (cancelled_bookings, refunds, released_seats) =
            Self::cascade_cancel(&mut tx, vec![booking], now).await?;
        tx.commit().await.map_err(integrity)?;

        Ok(CancellationSummary {
            flight_id: None,
            cancelled_bookings,
            refunds,
            released_seats,
            already_cancelled: false,
        })
    }

    async fn release_expired_holds(&self, now: DateTime<Utc>) -> BookingResult<Vec<Seat>> {
        // Rows a booking transaction has locked are skipped; that transaction
        // is reclaiming or settling them and the next sweep sees the outcome.
        let sql = format!(
            "UPDATE seats s SET status = 'available', hold_expires_at = NULL, booking_id = NULL \
             WHERE s.id IN ( \
                 SELECT id FROM seats WHERE status = 'held' AND hold_expires_at < $1 \
                 ORDER BY id FOR UPDATE SKIP LOCKED \
             ) AND s.status = 'held' AND s.hold_expires_at < $1 RETURNING {}",
            SEAT_COLUMNS
        );
        let rows = sqlx::query_as::<_, SeatRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        convert_all(rows)
    }
}
