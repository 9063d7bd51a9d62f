use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use skyhold_booking::SeatMapEntry;
use skyhold_core::{CabinAvailability, CabinClass, Flight, Seat};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::stream;

#[derive(Debug, Deserialize)]
pub struct SeatQuery {
    pub cabin: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/flights/{id}", get(get_flight))
        .route("/v1/flights/{id}/seats", get(list_available_seats))
        .route("/v1/flights/{id}/seat-map", get(seat_map))
        .route("/v1/flights/{id}/availability", get(cabin_availability))
        .route("/v1/flights/{id}/stream", get(stream::seat_events))
}

async fn get_flight(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Flight>, AppError> {
    Ok(Json(state.engine.get_flight(id).await?))
}

async fn list_available_seats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SeatQuery>,
) -> Result<Json<Vec<Seat>>, AppError> {
    let cabin = query
        .cabin
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|c| c.trim().parse::<CabinClass>())
        .transpose()?;
    Ok(Json(state.engine.list_available_seats(id, cabin).await?))
}

async fn seat_map(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<SeatMapEntry>>, AppError> {
    Ok(Json(state.engine.seat_map(id).await?))
}

async fn cabin_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CabinAvailability>>, AppError> {
    Ok(Json(state.engine.cabin_availability(id).await?))
}
