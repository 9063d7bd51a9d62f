use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seat-state change fanned out to seat-map subscribers after a commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeatEvent {
    SeatsHeld {
        flight_id: Uuid,
        booking_id: Uuid,
        seat_numbers: Vec<String>,
        held_until: DateTime<Utc>,
    },
    SeatsBooked {
        flight_id: Uuid,
        booking_id: Uuid,
        seat_numbers: Vec<String>,
    },
    SeatsReleased {
        flight_id: Uuid,
        seat_numbers: Vec<String>,
        timestamp: i64,
    },
}

impl SeatEvent {
    pub fn flight_id(&self) -> Uuid {
        match self {
            SeatEvent::SeatsHeld { flight_id, .. }
            | SeatEvent::SeatsBooked { flight_id, .. }
            | SeatEvent::SeatsReleased { flight_id, .. } => *flight_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SeatEvent::SeatsHeld { .. } => "seats_held",
            SeatEvent::SeatsBooked { .. } => "seats_booked",
            SeatEvent::SeatsReleased { .. } => "seats_released",
        }
    }
}
