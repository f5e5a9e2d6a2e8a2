use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use tourline_shared::Masked;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

/// Opaque handle returned by the payment provider for one booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String, // Provider's ID (e.g., pi_123)
    pub booking_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub customer_id: String,
    pub customer_email: Option<Masked<String>>,
    pub status: PaymentStatus,
    pub client_secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Create a payment intent with the provider
    async fn create_intent(
        &self,
        booking_id: Uuid,
        amount: i64,
        currency: &str,
        customer_id: &str,
        customer_email: Option<&str>,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>>;

    /// Retrieve intent status
    async fn get_intent(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>>;
}

/// Adapter for local runs and tests. Intent ids embed the booking id so a webhook
/// for `mock_pi_<booking>` can be resolved without any provider state.
pub struct MockPaymentAdapter;

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn create_intent(
        &self,
        booking_id: Uuid,
        amount: i64,
        currency: &str,
        customer_id: &str,
        customer_email: Option<&str>,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
        Ok(PaymentIntent {
            id: format!("mock_pi_{}", booking_id.simple()),
            booking_id,
            amount,
            currency: currency.to_string(),
            customer_id: customer_id.to_string(),
            customer_email: customer_email.map(|e| Masked(e.to_string())),
            status: PaymentStatus::RequiresPaymentMethod,
            client_secret: Some(format!("mock_secret_{}", booking_id.simple())),
            created_at: Utc::now(),
        })
    }

    async fn get_intent(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
        let booking_part = intent_id
            .strip_prefix("mock_pi_")
            .ok_or_else(|| format!("Unknown intent id: {}", intent_id))?;

        // A "_fail" suffix marks an intent whose payment never comes through.
        let (booking_part, status) = match booking_part.strip_suffix("_fail") {
            Some(rest) => (rest, PaymentStatus::Failed),
            None => (booking_part, PaymentStatus::Succeeded),
        };
        let booking_id = Uuid::parse_str(booking_part)?;

        Ok(PaymentIntent {
            id: intent_id.to_string(),
            booking_id,
            amount: 0,
            currency: String::new(),
            customer_id: String::new(),
            customer_email: None,
            status,
            client_secret: None,
            created_at: Utc::now(),
        })
    }
}
