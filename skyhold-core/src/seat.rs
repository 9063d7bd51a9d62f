use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::BookingError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum CabinClass {
    First,
    Business,
    Economy,
}

impl CabinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::First => "first",
            CabinClass::Business => "business",
            CabinClass::Economy => "economy",
        }
    }
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CabinClass {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(CabinClass::First),
            "business" => Ok(CabinClass::Business),
            "economy" => Ok(CabinClass::Economy),
            other => Err(BookingError::Validation(format!("unknown cabin class '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Held,
    Booked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Held => "held",
            SeatStatus::Booked => "booked",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SeatStatus::Available),
            "held" => Ok(SeatStatus::Held),
            "booked" => Ok(SeatStatus::Booked),
            other => Err(BookingError::Validation(format!("unknown seat status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seat {
    pub id: Uuid,
    pub flight_id: Uuid,
    pub seat_number: String,
    pub cabin_class: CabinClass,
    pub status: SeatStatus,
    pub hold_expires_at: Option<DateTime<Utc>>,
    /// Booking currently holding or owning the seat.
    pub booking_id: Option<Uuid>,
}

impl Seat {
    pub fn new(flight_id: Uuid, seat_number: impl Into<String>, cabin_class: CabinClass) -> Self {
        Self {
            id: Uuid::new_v4(),
            flight_id,
            seat_number: seat_number.into(),
            cabin_class,
            status: SeatStatus::Available,
            hold_expires_at: None,
            booking_id: None,
        }
    }

    /// The lazy-expiry rule: `available`, or `held` with `hold_expires_at < now`.
    /// Must agree with `available_predicate` in the Postgres store.
    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SeatStatus::Available => true,
            SeatStatus::Held => self.hold_expires_at.is_some_and(|expires| expires < now),
            SeatStatus::Booked => false,
        }
    }

    /// Status as a reader should see it: an expired hold reads as available.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SeatStatus {
        if self.status == SeatStatus::Held && self.is_available_at(now) {
            SeatStatus::Available
        } else {
            self.status
        }
    }

    /// Whether `booking_id` still owns a live hold on this seat.
    pub fn is_held_by(&self, booking_id: Uuid, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Held
            && self.booking_id == Some(booking_id)
            && !self.is_available_at(now)
    }

    pub fn hold(&mut self, booking_id: Uuid, until: DateTime<Utc>) {
        self.status = SeatStatus::Held;
        self.hold_expires_at = Some(until);
        self.booking_id = Some(booking_id);
    }

    pub fn book(&mut self) {
        self.status = SeatStatus::Booked;
        self.hold_expires_at = None;
    }

    pub fn release(&mut self) {
        self.status = SeatStatus::Available;
        self.hold_expires_at = None;
        self.booking_id = None;
    }
}

/// Sort key putting `2C` before `10A`.
pub fn seat_order(seat_number: &str) -> (u32, String) {
    let split = seat_number
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(seat_number.len());
    let (row, letter) = seat_number.split_at(split);
    (row.parse().unwrap_or(u32::MAX), letter.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewSeat {
    pub seat_number: String,
    pub cabin_class: CabinClass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CabinSection {
    pub cabin_class: CabinClass,
    pub first_row: u32,
    pub last_row: u32,
    /// Seat letters in the row, e.g. "ABCDEF".
    pub letters: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatLayout {
    pub sections: Vec<CabinSection>,
}

impl SeatLayout {
    /// Expands the layout into concrete seats, rejecting overlapping rows and
    /// malformed letter sets.
    pub fn expand(&self) -> Result<Vec<NewSeat>, BookingError> {
        if self.sections.is_empty() {
            return Err(BookingError::Validation("seat layout has no cabin sections".into()));
        }

        let mut rows_seen = HashSet::new();
        let mut seats = Vec::new();

        for section in &self.sections {
            if section.first_row == 0 || section.first_row > section.last_row {
                return Err(BookingError::Validation(format!(
                    "invalid row range {}-{} for {} cabin",
                    section.first_row, section.last_row, section.cabin_class
                )));
            }

            let letters: Vec<char> = section.letters.chars().collect();
            let unique: HashSet<char> = letters.iter().copied().collect();
            if letters.is_empty()
                || unique.len() != letters.len()
                || !letters.iter().all(|c| c.is_ascii_uppercase())
            {
                return Err(BookingError::Validation(format!(
                    "invalid seat letters '{}' for {} cabin",
                    section.letters, section.cabin_class
                )));
            }

            for row in section.first_row..=section.last_row {
                if !rows_seen.insert(row) {
                    return Err(BookingError::Validation(format!("row {} appears in two cabins", row)));
                }
                for letter in &letters {
                    seats.push(NewSeat {
                        seat_number: format!("{}{}", row, letter),
                        cabin_class: section.cabin_class,
                    });
                }
            }
        }

        Ok(seats)
    }
}

impl Default for SeatLayout {
    /// Narrow-body layout: 8 first, 16 business, 144 economy seats.
    fn default() -> Self {
        Self {
            sections: vec![
                CabinSection { cabin_class: CabinClass::First, first_row: 1, last_row: 2, letters: "ACDF".into() },
                CabinSection { cabin_class: CabinClass::Business, first_row: 3, last_row: 6, letters: "ACDF".into() },
                CabinSection { cabin_class: CabinClass::Economy, first_row: 7, last_row: 30, letters: "ABCDEF".into() },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CabinAvailability {
    pub cabin_class: CabinClass,
    pub total: u32,
    pub available: u32,
}
