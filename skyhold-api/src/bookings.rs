use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use skyhold_booking::PaymentOutcome;
use skyhold_core::{Booking, BookingDetails, BookingHandle, CancellationSummary, ChargeReceipt, SeatRequest};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    pub payment_method: String,
}

#[derive(Debug, Serialize)]
pub struct PayResponse {
    pub already_paid: bool,
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<ChargeReceipt>,
}

impl From<PaymentOutcome> for PayResponse {
    fn from(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Paid { booking, receipt } => {
                Self { already_paid: false, booking, receipt: Some(receipt) }
            }
            PaymentOutcome::AlreadyPaid { booking } => Self { already_paid: true, booking, receipt: None },
        }
    }
}

/// Proof of ownership: the last name or email of any passenger on the booking.
#[derive(Debug, Deserialize)]
pub struct AccessProof {
    pub last_name_or_email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub booking_reference: String,
    pub last_name_or_email: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/verify", post(verify_booking))
        .route("/v1/bookings/{id}/pay", post(pay_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<SeatRequest>,
) -> Result<(StatusCode, Json<BookingHandle>), AppError> {
    let handle = state.engine.lock_seats_and_create_booking(req).await?;
    Ok((StatusCode::CREATED, Json(handle)))
}

async fn pay_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PayRequest>,
) -> Result<Json<PayResponse>, AppError> {
    let outcome = state.engine.process_payment(id, &req.payment_method).await?;
    if outcome.already_paid() {
        info!("Payment for booking {} was already settled", id);
    }
    Ok(Json(outcome.into()))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AccessProof>,
) -> Result<Json<CancellationSummary>, AppError> {
    Ok(Json(state.engine.cancel_booking_with_proof(id, &req.last_name_or_email).await?))
}

async fn verify_booking(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<BookingDetails>, AppError> {
    let details = state
        .engine
        .verify_booking_access(&req.booking_reference, &req.last_name_or_email)
        .await?;
    Ok(Json(details))
}
