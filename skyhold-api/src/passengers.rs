use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use skyhold_core::{NewPassenger, Passenger};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/passengers", post(create_passenger))
}

async fn create_passenger(
    State(state): State<AppState>,
    Json(req): Json<NewPassenger>,
) -> Result<(StatusCode, Json<Passenger>), AppError> {
    let passenger = state.engine.create_passenger(req).await?;
    Ok((StatusCode::CREATED, Json(passenger)))
}
