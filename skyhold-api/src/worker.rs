use skyhold_booking::ReservationEngine;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Periodically flips lapsed holds back to available. Availability reads
/// never depend on it; it only keeps stored rows and seat streams tidy.
pub fn start_hold_reaper(engine: ReservationEngine, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Hold reaper started, sweeping every {:?}", period);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = engine.release_expired_holds().await {
                error!("Hold reaper sweep failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skyhold_booking::{EngineSettings, MockPaymentAdapter};
    use skyhold_core::{ManualClock, NewFlight, SeatRequest};
    use skyhold_shared::SeatEvent;
    use skyhold_store::MemoryReservationStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reaper_releases_lapsed_holds() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap()));
        let engine = ReservationEngine::new(
            Arc::new(MemoryReservationStore::new()),
            Arc::new(MockPaymentAdapter::new()),
            clock.clone(),
            EngineSettings::default(),
        );

        let flight = engine
            .create_flight(
                NewFlight {
                    flight_number: "SH900".into(),
                    origin: "MNL".into(),
                    destination: "CEB".into(),
                    departure_date: chrono::NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
                    departure_time: chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                    arrival_time: chrono::NaiveTime::from_hms_opt(7, 20, 0).unwrap(),
                    price_amount: 250_000,
                    price_currency: "PHP".into(),
                },
                None,
            )
            .await
            .unwrap();
        let seat = engine.list_available_seats(flight.id, None).await.unwrap()[0].clone();
        engine
            .lock_seats_and_create_booking(SeatRequest {
                seat_ids: vec![seat.id],
                departing_flight_id: flight.id,
                returning_flight_id: None,
                adults_count: 1,
                children_count: 0,
                total_amount: 250_000,
                passenger_ids: None,
            })
            .await
            .unwrap();

        let mut events = engine.subscribe();
        clock.advance(chrono::Duration::minutes(20));
        let reaper = start_hold_reaper(engine.clone(), Duration::from_millis(10));

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("reaper should publish within the timeout")
            .unwrap();
        reaper.abort();

        match event {
            SeatEvent::SeatsReleased { flight_id, seat_numbers, .. } => {
                assert_eq!(flight_id, flight.id);
                assert_eq!(seat_numbers, vec![seat.seat_number]);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
