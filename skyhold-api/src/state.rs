use skyhold_booking::ReservationEngine;
use std::sync::Arc;

use crate::middleware::resiliency::Resiliency;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: ReservationEngine,
    pub auth: AuthConfig,
    pub resiliency: Arc<Resiliency>,
}

impl AppState {
    pub fn new(engine: ReservationEngine, auth: AuthConfig) -> Self {
        Self { engine, auth, resiliency: Arc::new(Resiliency::default()) }
    }
}
