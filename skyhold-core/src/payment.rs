use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BookingError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeStatus {
    Succeeded,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Providers deduplicate on this key, so a retried settlement never charges twice.
    pub idempotency_key: String,
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub amount: i64,
    pub currency: String,
    pub payment_method: String,
}

impl ChargeRequest {
    pub fn idempotency_key_for(booking_id: Uuid) -> String {
        format!("booking-{}", booking_id.simple())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeReceipt {
    pub charge_id: String,
    pub booking_id: Uuid,
    pub amount: i64,
    pub status: ChargeStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("declined: {0}")]
    Declined(String),
    #[error("gateway failure: {0}")]
    Gateway(String),
}

impl From<PaymentError> for BookingError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Declined(reason) => BookingError::PaymentDeclined(reason),
            PaymentError::Gateway(reason) => BookingError::PaymentGateway(reason),
        }
    }
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Capture funds for a booking. Must be idempotent on `idempotency_key`.
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, PaymentError>;

    /// Return funds previously captured for the booking.
    async fn refund(&self, booking_id: Uuid, amount: i64) -> Result<ChargeReceipt, PaymentError>;
}
