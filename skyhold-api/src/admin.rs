use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::NaiveTime;
use serde::Deserialize;
use skyhold_core::{BookingDetails, CancellationSummary, Flight, FlightStatus, NewFlight, SeatLayout};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::AdminClaims;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateFlightRequest {
    #[serde(flatten)]
    pub flight: NewFlight,
    /// Falls back to the standard narrow-body layout.
    pub seat_layout: Option<SeatLayout>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: FlightStatus,
    pub departure_time: Option<NaiveTime>,
    pub arrival_time: Option<NaiveTime>,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/flights", post(create_flight))
        .route("/v1/admin/flights/{id}/status", patch(update_flight_status))
        .route("/v1/admin/flights/{id}/cancel", post(cancel_flight))
        .route("/v1/admin/bookings/{id}", get(get_booking))
}

async fn create_flight(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Json(req): Json<CreateFlightRequest>,
) -> Result<(StatusCode, Json<Flight>), AppError> {
    let flight = state.engine.create_flight(req.flight, req.seat_layout).await?;
    info!("Flight {} created by {}", flight.flight_number, claims.sub);
    Ok((StatusCode::CREATED, Json(flight)))
}

async fn update_flight_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Flight>, AppError> {
    if req.status == FlightStatus::Cancelled {
        return Err(AppError::ValidationError(format!(
            "use POST /v1/admin/flights/{}/cancel to cancel a flight",
            id
        )));
    }
    let flight = state
        .engine
        .update_flight_status(id, req.status, req.departure_time, req.arrival_time)
        .await?;
    Ok(Json(flight))
}

async fn cancel_flight(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancellationSummary>, AppError> {
    let summary = state.engine.cancel_flight(id).await?;
    info!(
        "Flight {} cancellation requested by {}: {} bookings cancelled",
        id,
        claims.sub,
        summary.cancelled_bookings.len()
    );
    Ok(Json(summary))
}

async fn get_booking(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<BookingDetails>, AppError> {
    Ok(Json(state.engine.get_booking(id).await?))
}
