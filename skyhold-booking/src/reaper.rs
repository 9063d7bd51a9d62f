use skyhold_core::{BookingResult, Seat};
use tracing::info;

use crate::engine::ReservationEngine;

impl ReservationEngine {
    /// Flips expired holds back to available. Availability is already correct
    /// without this; it only keeps stored state tidy for reporting.
    pub async fn release_expired_holds(&self) -> BookingResult<Vec<Seat>> {
        let now = self.now();
        let released = self.store.release_expired_holds(now).await?;

        if !released.is_empty() {
            info!("Reaper released {} expired holds", released.len());
            self.publish_released(&released, now);
        }
        Ok(released)
    }
}
