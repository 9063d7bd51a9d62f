use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::BookingError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FlightStatus {
    Active,
    Delayed,
    Cancelled,
}

impl FlightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightStatus::Active => "active",
            FlightStatus::Delayed => "delayed",
            FlightStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlightStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(FlightStatus::Active),
            "delayed" => Ok(FlightStatus::Delayed),
            "cancelled" => Ok(FlightStatus::Cancelled),
            other => Err(BookingError::Validation(format!("unknown flight status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    /// Per-passenger base fare in minor units.
    pub price_amount: i32,
    pub price_currency: String,
    pub status: FlightStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flight {
    pub fn from_new(new: NewFlight, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            flight_number: new.flight_number,
            origin: new.origin,
            destination: new.destination,
            departure_date: new.departure_date,
            departure_time: new.departure_time,
            arrival_time: new.arrival_time,
            price_amount: new.price_amount,
            price_currency: new.price_currency,
            status: FlightStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Delayed flights still sell seats; cancelled ones never do.
    pub fn is_bookable(&self) -> bool {
        self.status != FlightStatus::Cancelled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFlight {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    pub price_amount: i32,
    #[serde(default = "default_currency")]
    pub price_currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}
