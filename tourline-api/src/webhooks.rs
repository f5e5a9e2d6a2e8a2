use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use crate::{error::AppError, state::AppState};

const HANDLED_EVENTS: [&str; 3] = [
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
    "payment_intent.canceled",
];

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: PaymentIntentObject,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
    pub status: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

/// POST /v1/webhooks/payments
/// The payload is only a hint: the intent status is re-read from the provider
/// before the booking is confirmed or released.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<StatusCode, AppError> {
    tracing::info!(
        "Received webhook {}: {} for intent {} ({})",
        payload.id, payload.type_, payload.data.object.id, payload.data.object.status
    );

    if !HANDLED_EVENTS.contains(&payload.type_.as_str()) {
        return Ok(StatusCode::OK);
    }

    match state.workflow.handle_payment_update(&payload.data.object.id).await? {
        Some(booking) => tracing::info!(
            "Booking {} is {} after payment update",
            booking.id, booking.status
        ),
        None => tracing::debug!("Intent {} still in flight", payload.data.object.id),
    }

    Ok(StatusCode::OK)
}
