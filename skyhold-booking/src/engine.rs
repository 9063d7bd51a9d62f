use chrono::{DateTime, Duration, Utc};
use skyhold_core::{BookingResult, Clock, PaymentAdapter, ReferenceGenerator, ReservationStore, Seat};
use skyhold_shared::SeatEvent;
use skyhold_store::app_config::ReservationRules;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::orchestrator::PaymentOrchestrator;

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub hold_ttl: Duration,
    pub max_passengers: u32,
    pub references: ReferenceGenerator,
    /// Extra attempts after an integrity failure in a cancellation cascade.
    pub cancellation_retries: u32,
}

impl EngineSettings {
    pub fn from_rules(rules: &ReservationRules) -> BookingResult<Self> {
        Ok(Self {
            hold_ttl: Duration::seconds(rules.seat_hold_seconds as i64),
            max_passengers: rules.max_passengers,
            references: ReferenceGenerator::new(rules.reference_length, rules.reference_attempts)?,
            cancellation_retries: rules.cancellation_retries,
        })
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            hold_ttl: Duration::minutes(15),
            max_passengers: 9,
            references: ReferenceGenerator::default(),
            cancellation_retries: 3,
        }
    }
}

/// Entry point for every reservation operation. Cheap to clone; handlers
/// share one instance through the API state.
#[derive(Clone)]
pub struct ReservationEngine {
    pub(crate) store: Arc<dyn ReservationStore>,
    pub(crate) payments: PaymentOrchestrator,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) settings: Arc<EngineSettings>,
    events: broadcast::Sender<SeatEvent>,
}

impl ReservationEngine {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        adapter: Arc<dyn PaymentAdapter>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store,
            payments: PaymentOrchestrator::new(adapter),
            clock,
            settings: Arc::new(settings),
            events,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Seat events published after each committed hold, payment or release.
    pub fn subscribe(&self) -> broadcast::Receiver<SeatEvent> {
        self.events.subscribe()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn publish(&self, event: SeatEvent) {
        let name = event.name();
        if self.events.send(event).is_err() {
            debug!("No seat event subscribers for {}", name);
        }
    }

    /// One `SeatsReleased` per flight touched.
    pub(crate) fn publish_released(&self, seats: &[Seat], at: DateTime<Utc>) {
        let mut by_flight: BTreeMap<Uuid, Vec<String>> = BTreeMap::new();
        for seat in seats {
            by_flight.entry(seat.flight_id).or_default().push(seat.seat_number.clone());
        }
        for (flight_id, seat_numbers) in by_flight {
            self.publish(SeatEvent::SeatsReleased { flight_id, seat_numbers, timestamp: at.timestamp() });
        }
    }
}
