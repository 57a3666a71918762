use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use kroom_core::{Actor, Booking, BookingTransition};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub actor: Actor,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub actor: Actor,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub staff_id: Uuid,
    pub reason: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/history", get(get_history))
        .route("/v1/bookings/{id}/confirm", post(confirm_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/reject", post(reject_booking))
}

/// GET /v1/bookings/{id}
async fn get_booking(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.engine.booking(id).await?))
}

/// GET /v1/bookings/{id}/history
async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BookingTransition>>, AppError> {
    Ok(Json(state.engine.history(id).await?))
}

/// Transition: Pending → Confirmed, without a payment callback (staff override, free sessions).
async fn confirm_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.engine.lifecycle.confirm(id, req.actor).await?))
}

/// Transition: Pending → Cancelled
async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.engine.lifecycle.cancel(id, req.actor, req.reason).await?))
}

/// Transition: Pending → Rejected
async fn reject_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Booking>, AppError> {
    if req.reason.trim().is_empty() {
        return Err(AppError::ValidationError("rejection reason is required".to_string()));
    }
    Ok(Json(state.engine.lifecycle.reject(id, req.staff_id, req.reason).await?))
}
