use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use kroom_core::payment::PaymentOutcome;
use kroom_core::Booking;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub booking_id: Uuid,
    pub succeeded: bool,
    pub provider_reference: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payment", post(payment_callback))
}

/// POST /v1/webhooks/payment
///
/// Providers retry on anything but 2xx, so a repeated success for an
/// already confirmed booking answers 200 with the booking unchanged.
async fn payment_callback(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<Json<Booking>, AppError> {
    info!(
        "Payment callback for booking {}: succeeded={}",
        payload.booking_id, payload.succeeded
    );

    let outcome = PaymentOutcome {
        booking_id: payload.booking_id,
        succeeded: payload.succeeded,
        provider_reference: payload.provider_reference,
    };

    Ok(Json(state.engine.lifecycle.apply_payment(outcome).await?))
}
