mod common;

use chrono::NaiveTime;
use common::{adult, flaky_engine, harness, new_flight, one_way, seat_ids, FlakyStore};
use skyhold_core::{BookingError, BookingStatus, FlightStatus, PaymentStatus, SeatStatus};
use std::sync::atomic::AtomicU32;
use uuid::Uuid;

#[tokio::test]
async fn test_flight_cancellation_cascades() {
    let h = harness();
    let out = h.engine.create_flight(new_flight("SH401", "MNL", "CEB"), None).await.unwrap();
    let back = h.engine.create_flight(new_flight("SH402", "CEB", "MNL"), None).await.unwrap();

    let paid_seats = seat_ids(&h.engine, out.id, &["12A", "12B"]).await;
    let paid = h.engine.lock_seats_and_create_booking(one_way(out.id, paid_seats)).await.unwrap();
    h.engine.process_payment(paid.booking_id, "credit_card").await.unwrap();

    // Round trip whose return leg is on the cancelled flight's partner.
    let mut round = one_way(out.id, seat_ids(&h.engine, out.id, &["13A"]).await);
    round.returning_flight_id = Some(back.id);
    round.seat_ids.extend(seat_ids(&h.engine, back.id, &["13A"]).await);
    let unpaid = h.engine.lock_seats_and_create_booking(round).await.unwrap();

    let bystander_seats = seat_ids(&h.engine, back.id, &["14A"]).await;
    let bystander = h.engine.lock_seats_and_create_booking(one_way(back.id, bystander_seats)).await.unwrap();

    let summary = h.engine.cancel_flight(out.id).await.unwrap();
    assert!(!summary.already_cancelled);
    assert_eq!(summary.cancelled_bookings.len(), 2);
    assert_eq!(summary.released_seats.len(), 4);
    assert_eq!(summary.refunds.len(), 1);
    assert_eq!(summary.refunds[0].booking_id, paid.booking_id);
    assert_eq!(h.payments.refunds().len(), 1);

    let paid = h.engine.get_booking(paid.booking_id).await.unwrap().booking;
    assert_eq!(paid.status, BookingStatus::Cancelled);
    assert_eq!(paid.payment_status, PaymentStatus::Refunded);

    let unpaid = h.engine.get_booking(unpaid.booking_id).await.unwrap().booking;
    assert_eq!(unpaid.status, BookingStatus::Cancelled);
    assert_eq!(unpaid.payment_status, PaymentStatus::Unpaid);

    // Both legs of the round trip come back, including the one on the other flight.
    let back_open = h.engine.list_available_seats(back.id, None).await.unwrap();
    assert!(back_open.iter().any(|s| s.seat_number == "13A"));
    assert!(back_open.iter().all(|s| s.seat_number != "14A"));
    let bystander = h.engine.get_booking(bystander.booking_id).await.unwrap().booking;
    assert_eq!(bystander.status, BookingStatus::Pending);

    let map = h.engine.seat_map(out.id).await.unwrap();
    assert!(map.iter().all(|entry| entry.status == SeatStatus::Available));
    assert_eq!(h.engine.get_flight(out.id).await.unwrap().status, FlightStatus::Cancelled);
}

#[tokio::test]
async fn test_cancelling_twice_is_a_no_op() {
    let h = harness();
    let flight = h.engine.create_flight(new_flight("SH403", "MNL", "ILO"), None).await.unwrap();
    let seats = seat_ids(&h.engine, flight.id, &["9F"]).await;
    let handle = h.engine.lock_seats_and_create_booking(one_way(flight.id, seats)).await.unwrap();
    h.engine.process_payment(handle.booking_id, "e_wallet").await.unwrap();

    h.engine.cancel_flight(flight.id).await.unwrap();
    let again = h.engine.cancel_flight(flight.id).await.unwrap();
    assert!(again.already_cancelled);
    assert!(again.cancelled_bookings.is_empty());
    assert_eq!(h.payments.refunds().len(), 1);

    let again = h.engine.cancel_booking(handle.booking_id).await.unwrap();
    assert!(again.already_cancelled);
}

#[tokio::test]
async fn test_schedule_changes() {
    let h = harness();
    let flight = h.engine.create_flight(new_flight("SH404", "MNL", "CEB"), None).await.unwrap();

    let delayed = h
        .engine
        .update_flight_status(flight.id, FlightStatus::Delayed, NaiveTime::from_hms_opt(11, 0, 0), NaiveTime::from_hms_opt(12, 15, 0))
        .await
        .unwrap();
    assert_eq!(delayed.status, FlightStatus::Delayed);
    assert_eq!(delayed.arrival_time, NaiveTime::from_hms_opt(12, 15, 0).unwrap());

    // Delayed flights still sell seats.
    let seats = seat_ids(&h.engine, flight.id, &["2A"]).await;
    assert!(h.engine.lock_seats_and_create_booking(one_way(flight.id, seats)).await.is_ok());

    let err = h
        .engine
        .update_flight_status(flight.id, FlightStatus::Cancelled, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    let err = h
        .engine
        .update_flight_status(Uuid::new_v4(), FlightStatus::Active, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::FlightNotFound(_)));
}

#[tokio::test]
async fn test_cancel_unknown_flight() {
    let h = harness();
    let err = h.engine.cancel_flight(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, BookingError::FlightNotFound(_)));
}

#[tokio::test]
async fn test_customer_cancellation_needs_proof() {
    let h = harness();
    let flight = h.engine.create_flight(new_flight("SH405", "MNL", "TAG"), None).await.unwrap();
    let passenger = h.engine.create_passenger(adult("Paolo", "Cruz", "paolo@example.com")).await.unwrap();
    let mut request = one_way(flight.id, seat_ids(&h.engine, flight.id, &["18B"]).await);
    request.passenger_ids = Some(vec![passenger.id]);
    let handle = h.engine.lock_seats_and_create_booking(request).await.unwrap();

    let err = h.engine.cancel_booking_with_proof(handle.booking_id, "Reyes").await.unwrap_err();
    assert!(matches!(err, BookingError::BookingNotFound(_)));

    let summary = h.engine.cancel_booking_with_proof(handle.booking_id, " cruz ").await.unwrap();
    assert_eq!(summary.released_seats.len(), 1);
    assert!(summary.flight_id.is_none());
}

#[tokio::test]
async fn test_integrity_failures_are_retried() {
    let (engine, _) = flaky_engine(FlakyStore { cascade_failures: AtomicU32::new(2), ..FlakyStore::default() }, 3);
    let flight = engine.create_flight(new_flight("SH406", "MNL", "CEB"), None).await.unwrap();
    let summary = engine.cancel_flight(flight.id).await.unwrap();
    assert!(!summary.already_cancelled);
    assert_eq!(engine.get_flight(flight.id).await.unwrap().status, FlightStatus::Cancelled);
}

#[tokio::test]
async fn test_integrity_failure_surfaces_after_retries() {
    let (engine, _) = flaky_engine(FlakyStore { cascade_failures: AtomicU32::new(5), ..FlakyStore::default() }, 2);
    let flight = engine.create_flight(new_flight("SH407", "MNL", "CEB"), None).await.unwrap();
    let err = engine.cancel_flight(flight.id).await.unwrap_err();
    assert!(matches!(err, BookingError::Integrity(_)));
    assert_eq!(engine.get_flight(flight.id).await.unwrap().status, FlightStatus::Active);
}

#[tokio::test]
async fn test_cascade_aborted_by_contention_is_rerun() {
    let store = FlakyStore { cascade_failures: AtomicU32::new(2), cascade_contention: true, ..FlakyStore::default() };
    let (engine, payments) = flaky_engine(store, 3);
    let flight = engine.create_flight(new_flight("SH408", "MNL", "CEB"), None).await.unwrap();
    let seats = seat_ids(&engine, flight.id, &["4C"]).await;
    let handle = engine.lock_seats_and_create_booking(one_way(flight.id, seats)).await.unwrap();
    engine.process_payment(handle.booking_id, "credit_card").await.unwrap();

    let summary = engine.cancel_flight(flight.id).await.unwrap();
    assert_eq!(summary.cancelled_bookings, vec![handle.booking_id]);
    assert_eq!(payments.refunds().len(), 1);
    let booking = engine.get_booking(handle.booking_id).await.unwrap().booking;
    assert_eq!(booking.payment_status, PaymentStatus::Refunded);
}
