use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use kroom_booking::HoldRequest;
use kroom_core::{Actor, Booking, TimeSlot};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    pub room_id: Uuid,
    pub customer_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub hold_seconds: Option<u64>,
    /// Staff placing a hold for a walk-in. Defaults to the customer.
    pub actor: Option<Actor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExtendHoldRequest {
    pub extension_seconds: Option<u64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/holds", post(create_hold))
        .route("/v1/holds/{id}/extend", post(extend_hold))
}

/// POST /v1/holds
async fn create_hold(
    State(state): State<AppState>,
    Json(req): Json<CreateHoldRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let slot = TimeSlot::new(req.start_time, req.end_time)?;
    let actor = req.actor.unwrap_or(Actor::Customer(req.customer_id));

    let booking = state
        .engine
        .holds
        .create_hold(
            HoldRequest {
                room_id: req.room_id,
                customer_id: req.customer_id,
                slot,
                hold_seconds: req.hold_seconds,
            },
            actor,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// POST /v1/holds/{id}/extend
async fn extend_hold(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ExtendHoldRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.engine.holds.extend_hold(id, req.extension_seconds).await?;
    Ok(Json(booking))
}
