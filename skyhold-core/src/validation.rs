//! Input checks that run before any storage round-trip.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::booking::SeatRequest;
use crate::error::{BookingError, BookingResult};
use crate::flight::NewFlight;
use crate::passenger::{NewPassenger, PassengerType};

pub const PAYMENT_METHODS: &[&str] = &["credit_card", "debit_card", "e_wallet", "bank_transfer"];

pub fn validate_seat_request(request: &SeatRequest, max_passengers: u32) -> BookingResult<()> {
    if request.adults_count == 0 {
        return Err(BookingError::Validation("at least one adult is required".into()));
    }
    let party = request.adults_count.saturating_add(request.children_count);
    if party > max_passengers {
        return Err(BookingError::Validation(format!(
            "party of {} exceeds the maximum of {} passengers",
            party, max_passengers
        )));
    }
    if request.total_amount < 0 {
        return Err(BookingError::Validation("total amount cannot be negative".into()));
    }
    if request.seat_ids.is_empty() {
        return Err(BookingError::Validation("no seats selected".into()));
    }
    let unique: HashSet<_> = request.seat_ids.iter().collect();
    if unique.len() != request.seat_ids.len() {
        return Err(BookingError::Validation("the same seat was selected twice".into()));
    }
    if request.returning_flight_id == Some(request.departing_flight_id) {
        return Err(BookingError::Validation(
            "returning flight must differ from the departing flight".into(),
        ));
    }

    let flights = if request.returning_flight_id.is_some() { 2 } else { 1 };
    let expected_seats = party as usize * flights;
    if request.seat_ids.len() != expected_seats {
        return Err(BookingError::InvalidPassengerCount {
            flight_id: request.departing_flight_id,
            expected: party,
            actual: request.seat_ids.len(),
        });
    }

    if let Some(passenger_ids) = &request.passenger_ids {
        let unique: HashSet<_> = passenger_ids.iter().collect();
        if unique.len() != passenger_ids.len() {
            return Err(BookingError::Validation("the same passenger was listed twice".into()));
        }
        if passenger_ids.len() != party as usize {
            return Err(BookingError::Validation(format!(
                "{} passengers given for a party of {}",
                passenger_ids.len(),
                party
            )));
        }
    }

    Ok(())
}

pub fn validate_new_passenger(passenger: &NewPassenger, today: NaiveDate) -> BookingResult<()> {
    for (field, value) in [("first name", &passenger.first_name), ("last name", &passenger.last_name)] {
        let value = value.trim();
        if value.is_empty() || value.chars().count() > 100 {
            return Err(BookingError::Validation(format!("{} must be 1-100 characters", field)));
        }
    }
    if !looks_like_email(passenger.email.trim()) {
        return Err(BookingError::Validation("email address is malformed".into()));
    }
    if let Some(phone) = &passenger.phone {
        let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
        let allowed = phone.chars().all(|c| c.is_ascii_digit() || "+-() ".contains(c));
        if !allowed || !(7..=15).contains(&digits) {
            return Err(BookingError::Validation("phone number is malformed".into()));
        }
    }
    if passenger.date_of_birth > today {
        return Err(BookingError::Validation("date of birth is in the future".into()));
    }

    let age = years_between(passenger.date_of_birth, today);
    match passenger.passenger_type {
        PassengerType::Child if age >= 12 => Err(BookingError::Validation(
            "child passengers must be under 12".into(),
        )),
        PassengerType::Adult if age < 12 => Err(BookingError::Validation(
            "adult passengers must be 12 or older".into(),
        )),
        _ => Ok(()),
    }
}

pub fn validate_new_flight(flight: &NewFlight) -> BookingResult<()> {
    let number = flight.flight_number.trim();
    if number.len() < 3 || number.len() > 8 || !number.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(BookingError::Validation(format!("invalid flight number '{}'", flight.flight_number)));
    }
    validate_airport_code(&flight.origin)?;
    validate_airport_code(&flight.destination)?;
    if flight.origin.eq_ignore_ascii_case(&flight.destination) {
        return Err(BookingError::Validation("origin and destination are the same".into()));
    }
    if flight.price_amount < 0 {
        return Err(BookingError::Validation("price cannot be negative".into()));
    }
    if flight.price_currency.len() != 3 || !flight.price_currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(BookingError::Validation(format!("invalid currency '{}'", flight.price_currency)));
    }
    Ok(())
}

pub fn validate_airport_code(code: &str) -> BookingResult<()> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(BookingError::Validation(format!("invalid airport code '{}'", code)))
    }
}

/// Canonical form of a payment method name: `"Credit Card"` → `"credit_card"`.
pub fn normalize_payment_method(method: &str) -> BookingResult<String> {
    let normalized: String = method
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();

    if PAYMENT_METHODS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(BookingError::Validation(format!("unsupported payment method '{}'", method.trim())))
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
                && email.len() <= 254
        }
        None => false,
    }
}

fn years_between(born: NaiveDate, today: NaiveDate) -> i32 {
    use chrono::Datelike;
    let mut years = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        years -= 1;
    }
    years
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passenger::Sex;
    use uuid::Uuid;

    fn request(seats: usize, adults: u32, children: u32) -> SeatRequest {
        SeatRequest {
            seat_ids: (0..seats).map(|_| Uuid::new_v4()).collect(),
            departing_flight_id: Uuid::new_v4(),
            returning_flight_id: None,
            adults_count: adults,
            children_count: children,
            total_amount: 100,
            passenger_ids: None,
        }
    }

    #[test]
    fn test_seat_count_must_match_party() {
        assert!(validate_seat_request(&request(2, 1, 1), 9).is_ok());
        let short = request(1, 1, 1);
        assert!(matches!(
            validate_seat_request(&short, 9),
            Err(BookingError::InvalidPassengerCount { flight_id, expected: 2, actual: 1 })
                if flight_id == short.departing_flight_id
        ));
        assert!(matches!(validate_seat_request(&request(0, 0, 0), 9), Err(BookingError::Validation(_))));
    }

    #[test]
    fn test_round_trip_needs_seats_on_both_flights() {
        let mut req = request(3, 2, 0);
        req.returning_flight_id = Some(Uuid::new_v4());
        assert!(matches!(
            validate_seat_request(&req, 9),
            Err(BookingError::InvalidPassengerCount { expected: 2, actual: 3, .. })
        ));

        let mut req = request(4, 2, 0);
        req.returning_flight_id = Some(Uuid::new_v4());
        assert!(validate_seat_request(&req, 9).is_ok());

        req.returning_flight_id = Some(req.departing_flight_id);
        assert!(validate_seat_request(&req, 9).is_err());
    }

    #[test]
    fn test_duplicate_seats_and_party_limit() {
        let mut req = request(2, 2, 0);
        req.seat_ids[1] = req.seat_ids[0];
        assert!(validate_seat_request(&req, 9).is_err());
        assert!(validate_seat_request(&request(10, 10, 0), 9).is_err());
    }

    #[test]
    fn test_passenger_ids_must_cover_party() {
        let mut req = request(2, 2, 0);
        req.passenger_ids = Some(vec![Uuid::new_v4()]);
        assert!(validate_seat_request(&req, 9).is_err());
        req.passenger_ids = Some(vec![Uuid::new_v4(), Uuid::new_v4()]);
        assert!(validate_seat_request(&req, 9).is_ok());
    }

    #[test]
    fn test_passenger_age_matches_type() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let mut pax = NewPassenger {
            first_name: "Lea".into(),
            last_name: "Santos".into(),
            email: "lea@example.ph".into(),
            phone: Some("+63 917 555 0101".into()),
            sex: Sex::Female,
            date_of_birth: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            passenger_type: PassengerType::Child,
        };
        assert!(validate_new_passenger(&pax, today).is_ok());

        pax.passenger_type = PassengerType::Adult;
        assert!(validate_new_passenger(&pax, today).is_err());

        pax.passenger_type = PassengerType::Child;
        pax.email = "not-an-email".into();
        assert!(validate_new_passenger(&pax, today).is_err());
    }

    #[test]
    fn test_payment_method_normalization() {
        assert_eq!(normalize_payment_method(" Credit Card ").unwrap(), "credit_card");
        assert_eq!(normalize_payment_method("e-wallet").unwrap(), "e_wallet");
        assert!(normalize_payment_method("").is_err());
        assert!(normalize_payment_method("barter").is_err());
    }
}
