use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kroom_core::{BookingError, TimeSlot};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub room_id: Uuid,
    pub window: TimeSlot,
    pub occupied: Vec<TimeSlot>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/rooms/{id}/availability", get(get_availability))
}

/// GET /v1/rooms/{id}/availability?from=..&to=..
async fn get_availability(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let window = TimeSlot::new(query.from, query.to)?;
    state
        .engine
        .store()
        .get_room(room_id)
        .await
        .map_err(BookingError::from)?
        .ok_or_else(|| AppError::NotFoundError(format!("room {}", room_id)))?;

    let occupied = state.engine.conflicts.occupied_slots(room_id, &window).await?;

    Ok(Json(AvailabilityResponse { room_id, window, occupied }))
}
