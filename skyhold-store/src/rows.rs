//! Row shapes read back from Postgres and their conversion into domain types.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use skyhold_core::{
    Booking, BookingError, CabinAvailability, Flight, Passenger, Seat,
};
use skyhold_shared::Masked;
use uuid::Uuid;

pub(crate) const FLIGHT_COLUMNS: &str = "id, flight_number, origin, destination, departure_date, \
     departure_time, arrival_time, price_amount, price_currency, status, created_at, updated_at";

pub(crate) const SEAT_COLUMNS: &str =
    "s.id, s.flight_id, s.seat_number, s.cabin_class, s.status, s.hold_expires_at, s.booking_id";

pub(crate) const BOOKING_COLUMNS: &str = "id, booking_reference, departing_flight_id, returning_flight_id, \
     adults_count, children_count, total_amount, status, payment_status, payment_method, created_at, updated_at";

pub(crate) const PASSENGER_COLUMNS: &str = "p.id, p.first_name, p.last_name, p.email, p.phone, p.sex, \
     p.date_of_birth, p.passenger_type, p.created_at";

/// A row holding a value the schema should never allow.
fn corrupt(table: &str, err: BookingError) -> BookingError {
    BookingError::Storage(format!("corrupt {} row: {}", table, err))
}

#[derive(sqlx::FromRow)]
pub(crate) struct FlightRow {
    id: Uuid,
    flight_number: String,
    origin: String,
    destination: String,
    departure_date: NaiveDate,
    departure_time: NaiveTime,
    arrival_time: NaiveTime,
    price_amount: i32,
    price_currency: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FlightRow> for Flight {
    type Error = BookingError;

    fn try_from(row: FlightRow) -> Result<Self, Self::Error> {
        Ok(Flight {
            id: row.id,
            flight_number: row.flight_number,
            origin: row.origin,
            destination: row.destination,
            departure_date: row.departure_date,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            price_amount: row.price_amount,
            price_currency: row.price_currency,
            status: row.status.parse().map_err(|e| corrupt("flight", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SeatRow {
    id: Uuid,
    flight_id: Uuid,
    seat_number: String,
    cabin_class: String,
    status: String,
    hold_expires_at: Option<DateTime<Utc>>,
    booking_id: Option<Uuid>,
}

impl TryFrom<SeatRow> for Seat {
    type Error = BookingError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        Ok(Seat {
            id: row.id,
            flight_id: row.flight_id,
            seat_number: row.seat_number,
            cabin_class: row.cabin_class.parse().map_err(|e| corrupt("seat", e))?,
            status: row.status.parse().map_err(|e| corrupt("seat", e))?,
            hold_expires_at: row.hold_expires_at,
            booking_id: row.booking_id,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: Uuid,
    booking_reference: String,
    departing_flight_id: Uuid,
    returning_flight_id: Option<Uuid>,
    adults_count: i32,
    children_count: i32,
    total_amount: i64,
    status: String,
    payment_status: String,
    payment_method: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = BookingError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let count = |value: i32| {
            u32::try_from(value)
                .map_err(|_| BookingError::Storage(format!("corrupt booking row: negative count {}", value)))
        };
        Ok(Booking {
            id: row.id,
            booking_reference: row.booking_reference,
            departing_flight_id: row.departing_flight_id,
            returning_flight_id: row.returning_flight_id,
            adults_count: count(row.adults_count)?,
            children_count: count(row.children_count)?,
            total_amount: row.total_amount,
            status: row.status.parse().map_err(|e| corrupt("booking", e))?,
            payment_status: row.payment_status.parse().map_err(|e| corrupt("booking", e))?,
            payment_method: row.payment_method,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PassengerRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    sex: String,
    date_of_birth: NaiveDate,
    passenger_type: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PassengerRow> for Passenger {
    type Error = BookingError;

    fn try_from(row: PassengerRow) -> Result<Self, Self::Error> {
        Ok(Passenger {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: Masked::new(row.email),
            phone: row.phone.map(Masked::new),
            sex: row.sex.parse().map_err(|e| corrupt("passenger", e))?,
            date_of_birth: row.date_of_birth,
            passenger_type: row.passenger_type.parse().map_err(|e| corrupt("passenger", e))?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CabinCountRow {
    cabin_class: String,
    total: i64,
    available: i64,
}

impl TryFrom<CabinCountRow> for CabinAvailability {
    type Error = BookingError;

    fn try_from(row: CabinCountRow) -> Result<Self, Self::Error> {
        Ok(CabinAvailability {
            cabin_class: row.cabin_class.parse().map_err(|e| corrupt("seat", e))?,
            total: u32::try_from(row.total).unwrap_or(u32::MAX),
            available: u32::try_from(row.available).unwrap_or(u32::MAX),
        })
    }
}

/// Converts a batch of rows, failing on the first corrupt one.
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, BookingError>
where
    T: TryFrom<R, Error = BookingError>,
{
    rows.into_iter().map(T::try_from).collect()
}
