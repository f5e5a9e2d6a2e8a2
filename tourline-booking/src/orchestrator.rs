use tourline_core::payment::{PaymentAdapter, PaymentIntent};
use std::sync::Arc;
use crate::error::BookingError;
use crate::models::Booking;

/// Thin front for the payment provider. Failures are passed through unchanged;
/// nothing here compensates for a failed charge.
pub struct PaymentOrchestrator {
    adapter: Arc<dyn PaymentAdapter>,
}

impl PaymentOrchestrator {
    pub fn new(adapter: Arc<dyn PaymentAdapter>) -> Self {
        Self { adapter }
    }

    /// Initialize a payment intent for a freshly created booking
    pub async fn initialize_payment(&self, booking: &Booking) -> Result<PaymentIntent, BookingError> {
        self.adapter
            .create_intent(
                booking.id,
                booking.total_amount,
                &booking.currency,
                &booking.customer_id,
                booking.customer_email.as_ref().map(|e| e.inner().as_str()),
            )
            .await
            .map_err(|e| BookingError::Payment(e.to_string()))
    }

    /// Fetch the authoritative status of an intent (e.g., after a webhook)
    pub async fn process_status_update(&self, intent_id: &str) -> Result<PaymentIntent, BookingError> {
        self.adapter
            .get_intent(intent_id)
            .await
            .map_err(|e| BookingError::Payment(e.to_string()))
    }
}
