use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use skyhold_shared::Masked;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::BookingError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PassengerType {
    Adult,
    Child,
}

impl PassengerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassengerType::Adult => "adult",
            PassengerType::Child => "child",
        }
    }
}

impl fmt::Display for PassengerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassengerType {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adult" => Ok(PassengerType::Adult),
            "child" => Ok(PassengerType::Child),
            other => Err(BookingError::Validation(format!("unknown passenger type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
    Unspecified,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Female => "female",
            Sex::Male => "male",
            Sex::Unspecified => "unspecified",
        }
    }
}

impl FromStr for Sex {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "female" => Ok(Sex::Female),
            "male" => Ok(Sex::Male),
            "unspecified" => Ok(Sex::Unspecified),
            other => Err(BookingError::Validation(format!("unknown sex '{}'", other))),
        }
    }
}

/// A traveller record. Created before the booking and linked through a join;
/// repeat travellers get a fresh record every time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passenger {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Masked<String>,
    pub phone: Option<Masked<String>>,
    pub sex: Sex,
    pub date_of_birth: NaiveDate,
    pub passenger_type: PassengerType,
    pub created_at: DateTime<Utc>,
}

impl Passenger {
    pub fn from_new(new: NewPassenger, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            email: Masked::new(new.email.trim().to_string()),
            phone: new.phone.map(|p| Masked::new(p.trim().to_string())),
            sex: new.sex,
            date_of_birth: new.date_of_birth,
            passenger_type: new.passenger_type,
            created_at: now,
        }
    }

    /// Case-insensitive match on last name or email, ignoring surrounding whitespace.
    pub fn matches_identity(&self, last_name_or_email: &str) -> bool {
        let needle = last_name_or_email.trim();
        if needle.is_empty() {
            return false;
        }
        self.last_name.trim().eq_ignore_ascii_case(needle)
            || self.email.expose().trim().eq_ignore_ascii_case(needle)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPassenger {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub sex: Sex,
    pub date_of_birth: NaiveDate,
    pub passenger_type: PassengerType,
}
