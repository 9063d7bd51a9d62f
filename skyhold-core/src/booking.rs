use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::BookingError;
use crate::passenger::Passenger;
use crate::seat::{seat_order, Seat};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Pending and confirmed bookings still own seats.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(BookingError::Validation(format!("unknown booking status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Status a booking's payment moves to when the booking is cancelled.
    pub fn on_cancel(self) -> Self {
        match self {
            PaymentStatus::Paid => PaymentStatus::Refunded,
            other => other,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(BookingError::Validation(format!("unknown payment status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub booking_reference: String,
    pub departing_flight_id: Uuid,
    pub returning_flight_id: Option<Uuid>,
    pub adults_count: u32,
    pub children_count: u32,
    pub total_amount: i64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// The row inserted by the coordinator: pending and unpaid.
    pub fn from_new(new: &NewBooking, booking_reference: String) -> Self {
        Self {
            id: new.id,
            booking_reference,
            departing_flight_id: new.request.departing_flight_id,
            returning_flight_id: new.request.returning_flight_id,
            adults_count: new.request.adults_count,
            children_count: new.request.children_count,
            total_amount: new.request.total_amount,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
            created_at: new.created_at,
            updated_at: new.created_at,
        }
    }

    pub fn party_size(&self) -> u32 {
        self.adults_count + self.children_count
    }

    pub fn flight_ids(&self) -> Vec<Uuid> {
        std::iter::once(self.departing_flight_id)
            .chain(self.returning_flight_id)
            .collect()
    }

    pub fn involves_flight(&self, flight_id: Uuid) -> bool {
        self.departing_flight_id == flight_id || self.returning_flight_id == Some(flight_id)
    }

    /// Applies the cancellation transition; returns the refund owed, if any.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Option<RefundDue> {
        let refund = (self.payment_status == PaymentStatus::Paid).then(|| RefundDue {
            booking_id: self.id,
            booking_reference: self.booking_reference.clone(),
            amount: self.total_amount,
            payment_method: self.payment_method.clone(),
        });
        self.status = BookingStatus::Cancelled;
        self.payment_status = self.payment_status.on_cancel();
        self.updated_at = now;
        refund
    }

    pub fn confirm_payment(&mut self, payment_method: &str, now: DateTime<Utc>) {
        self.status = BookingStatus::Confirmed;
        self.payment_status = PaymentStatus::Paid;
        self.payment_method = Some(payment_method.to_string());
        self.updated_at = now;
    }
}

/// Input of `lock_seats_and_create_booking`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatRequest {
    pub seat_ids: Vec<Uuid>,
    pub departing_flight_id: Uuid,
    pub returning_flight_id: Option<Uuid>,
    pub adults_count: u32,
    #[serde(default)]
    pub children_count: u32,
    pub total_amount: i64,
    #[serde(default)]
    pub passenger_ids: Option<Vec<Uuid>>,
}

impl SeatRequest {
    pub fn party_size(&self) -> u32 {
        self.adults_count + self.children_count
    }

    pub fn flight_ids(&self) -> Vec<Uuid> {
        std::iter::once(self.departing_flight_id)
            .chain(self.returning_flight_id)
            .collect()
    }

    /// Checks the seat rows read under lock against the request: every id
    /// exists, sits on one of the booking's flights, fills the party exactly
    /// on each flight, and is available at `now`.
    pub fn verify_locked_seats(&self, seats: &[Seat], now: DateTime<Utc>) -> Result<(), BookingError> {
        let missing: Vec<String> = self
            .seat_ids
            .iter()
            .filter(|id| !seats.iter().any(|seat| seat.id == **id))
            .map(Uuid::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(BookingError::SeatNotFound(missing.join(", ")));
        }

        let flights = self.flight_ids();
        if let Some(stray) = seats.iter().find(|seat| !flights.contains(&seat.flight_id)) {
            return Err(BookingError::SeatNotFound(format!(
                "{} is not on the booked flights",
                stray.seat_number
            )));
        }

        for flight_id in flights {
            let on_flight = seats.iter().filter(|seat| seat.flight_id == flight_id).count();
            if on_flight != self.party_size() as usize {
                return Err(BookingError::InvalidPassengerCount {
                    flight_id,
                    expected: self.party_size(),
                    actual: on_flight,
                });
            }
        }

        let mut unavailable: Vec<&Seat> = seats.iter().filter(|seat| !seat.is_available_at(now)).collect();
        if !unavailable.is_empty() {
            unavailable.sort_by_key(|seat| seat_order(&seat.seat_number));
            return Err(BookingError::SeatUnavailable {
                seats: unavailable.iter().map(|seat| seat.seat_number.clone()).collect(),
            });
        }

        Ok(())
    }
}

/// A validated request plus everything the store needs to persist it.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub id: Uuid,
    pub request: SeatRequest,
    pub created_at: DateTime<Utc>,
    pub hold_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingHandle {
    pub booking_id: Uuid,
    pub booking_reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingDetails {
    pub booking: Booking,
    pub passengers: Vec<Passenger>,
    pub seats: Vec<Seat>,
}

impl BookingDetails {
    /// Seats linked to the booking whose hold is no longer owned and live.
    pub fn lapsed_seats(&self, now: DateTime<Utc>) -> Vec<String> {
        self.seats
            .iter()
            .filter(|seat| !seat.is_held_by(self.booking.id, now))
            .map(|seat| seat.seat_number.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SettlementOutcome {
    Settled { booking: Booking, seats: Vec<Seat> },
    /// Nothing changed: the booking had already been paid.
    AlreadyPaid { booking: Booking },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundDue {
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub amount: i64,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CancellationSummary {
    pub flight_id: Option<Uuid>,
    pub cancelled_bookings: Vec<Uuid>,
    pub refunds: Vec<RefundDue>,
    pub released_seats: Vec<Seat>,
    pub already_cancelled: bool,
}
