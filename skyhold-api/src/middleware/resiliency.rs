use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    /// Failing fast until `reset_timeout` has passed.
    Open,
    /// One trial request decides between Closed and Open.
    HalfOpen,
}

pub struct CircuitBreaker {
    pub name: String,
    pub state: RwLock<CircuitState>,
    pub failure_count: AtomicUsize,
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
    pub last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold,
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
        }
    }

    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        match state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let last_fail = *self.last_failure.read().await;
                match last_fail {
                    Some(instant) if instant.elapsed() > self.reset_timeout => {
                        *self.state.write().await = CircuitState::HalfOpen;
                        tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        }
        *state = CircuitState::Closed;
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            *self.last_failure.write().await = Some(Instant::now());
            tracing::error!("Circuit Breaker [{}] TRIPPED to Open. Failures: {}", self.name, count);
        }
    }

    pub async fn current(&self) -> CircuitState {
        *self.state.read().await
    }
}

pub struct Resiliency {
    pub payment_cb: CircuitBreaker,
}

impl Resiliency {
    pub fn new(payment_threshold: usize, reset_timeout: Duration) -> Self {
        Self { payment_cb: CircuitBreaker::new("payment", payment_threshold, reset_timeout) }
    }
}

impl Default for Resiliency {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}

fn is_payment_route(path: &str) -> bool {
    path.starts_with("/v1/bookings/") && path.ends_with("/pay")
}

pub async fn circuit_breaker_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if !is_payment_route(req.uri().path()) {
        return next.run(req).await;
    }

    let cb = &state.resiliency.payment_cb;
    if !cb.check().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Circuit Breaker [{}] is OPEN", cb.name),
        )
            .into_response();
    }

    let response = next.run(req).await;
    if response.status().is_server_error() {
        cb.record_failure().await;
    } else {
        cb.record_success().await;
    }
    response
}
