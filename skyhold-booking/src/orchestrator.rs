use async_trait::async_trait;
use chrono::Utc;
use skyhold_core::{
    Booking, BookingError, BookingResult, ChargeReceipt, ChargeRequest, ChargeStatus, PaymentAdapter, PaymentError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::error;
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentOrchestrator {
    adapter: Arc<dyn PaymentAdapter>,
}

impl PaymentOrchestrator {
    pub fn new(adapter: Arc<dyn PaymentAdapter>) -> Self {
        Self { adapter }
    }

    /// Charges the booking total, keyed on the booking id so a retried
    /// settlement reuses the original charge.
    pub async fn charge_booking(
        &self,
        booking: &Booking,
        payment_method: &str,
        currency: &str,
    ) -> BookingResult<ChargeReceipt> {
        let request = ChargeRequest {
            idempotency_key: ChargeRequest::idempotency_key_for(booking.id),
            booking_id: booking.id,
            booking_reference: booking.booking_reference.clone(),
            amount: booking.total_amount,
            currency: currency.to_string(),
            payment_method: payment_method.to_string(),
        };

        self.adapter.charge(&request).await.map_err(|err| {
            if let PaymentError::Gateway(reason) = &err {
                error!("Payment gateway failed for booking {}: {}", booking.id, reason);
            }
            BookingError::from(err)
        })
    }

    pub async fn refund(&self, booking_id: Uuid, amount: i64) -> BookingResult<ChargeReceipt> {
        self.adapter.refund(booking_id, amount).await.map_err(BookingError::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMode {
    #[default]
    Approve,
    Decline,
    GatewayDown,
}

#[derive(Default)]
struct MockLedger {
    mode: MockMode,
    charges: HashMap<String, ChargeReceipt>,
    refunds: Vec<ChargeReceipt>,
}

/// In-process gateway for development and tests. Deduplicates charges on the
/// idempotency key like a real provider.
#[derive(Default)]
pub struct MockPaymentAdapter {
    ledger: Mutex<MockLedger>,
}

impl MockPaymentAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&self, mode: MockMode) {
        self.ledger().mode = mode;
    }

    /// Distinct charges captured so far.
    pub fn charge_count(&self) -> usize {
        self.ledger().charges.len()
    }

    pub fn refunds(&self) -> Vec<ChargeReceipt> {
        self.ledger().refunds.clone()
    }

    fn ledger(&self) -> MutexGuard<'_, MockLedger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, PaymentError> {
        let mut ledger = self.ledger();
        match ledger.mode {
            MockMode::Decline => return Err(PaymentError::Declined("card declined by issuer".into())),
            MockMode::GatewayDown => return Err(PaymentError::Gateway("simulated gateway outage".into())),
            MockMode::Approve => {}
        }

        let receipt = ledger
            .charges
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| ChargeReceipt {
                charge_id: format!("mock_ch_{}", request.booking_id.simple()),
                booking_id: request.booking_id,
                amount: request.amount,
                status: ChargeStatus::Succeeded,
                created_at: Utc::now(),
            });
        Ok(receipt.clone())
    }

    async fn refund(&self, booking_id: Uuid, amount: i64) -> Result<ChargeReceipt, PaymentError> {
        let mut ledger = self.ledger();
        if ledger.mode == MockMode::GatewayDown {
            return Err(PaymentError::Gateway("simulated gateway outage".into()));
        }

        let receipt = ChargeReceipt {
            charge_id: format!("mock_re_{}", booking_id.simple()),
            booking_id,
            amount,
            status: ChargeStatus::Refunded,
            created_at: Utc::now(),
        };
        ledger.refunds.push(receipt.clone());
        Ok(receipt)
    }
}
