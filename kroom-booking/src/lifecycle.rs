use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use kroom_core::events::AuditSink;
use kroom_core::payment::PaymentOutcome;
use kroom_core::repository::{BookingStore, BookingTx};
use kroom_core::{Actor, Booking, BookingError, BookingResult, BookingStatus, BookingTransition};
use kroom_shared::Clock;

use crate::conflict::ensure_slot_free;
use crate::txn::{load_for_update, overlap_as_conflict};

/// Drives bookings through `PENDING -> {CONFIRMED, CANCELLED, REJECTED}`.
pub struct LifecycleManager {
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn BookingStore>, clock: Arc<dyn Clock>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, clock, audit }
    }

    /// Transition: Pending → Confirmed (payment completed before the hold lapsed)
    pub async fn confirm(&self, booking_id: Uuid, actor: Actor) -> BookingResult<Booking> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let booking = load_for_update(&mut *tx, booking_id).await?;
        self.confirm_locked(tx, booking, actor, None, now).await
    }

    /// Apply a payment provider callback. Retried successes are idempotent.
    pub async fn apply_payment(&self, outcome: PaymentOutcome) -> BookingResult<Booking> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let booking = load_for_update(&mut *tx, outcome.booking_id).await?;

        if booking.status == BookingStatus::Confirmed && outcome.succeeded {
            info!(booking_id = %booking.id, "Duplicate payment callback ignored");
            return Ok(booking);
        }

        if !outcome.succeeded {
            check_confirmable(&booking, now)?;
            warn!(booking_id = %booking.id, "Payment declined, hold stays until {}", booking.expires_at);
            return Err(BookingError::PaymentDeclined(booking.id));
        }

        let actor = Actor::Customer(booking.customer_id);
        self.confirm_locked(tx, booking, actor, outcome.provider_reference, now).await
    }

    /// Transition: Pending → Cancelled
    pub async fn cancel(&self, booking_id: Uuid, actor: Actor, reason: Option<String>) -> BookingResult<Booking> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut booking = load_for_update(&mut *tx, booking_id).await?;
        require_pending(&booking, "cancel")?;

        let row = booking.transition(BookingStatus::Cancelled, actor, reason.clone(), now);
        booking.cancel_reason = reason;
        self.commit_transition(tx, booking, row).await
    }

    /// Transition: Pending → Rejected. Staff only; records who overrode the booking and why.
    pub async fn reject(&self, booking_id: Uuid, staff_id: Uuid, reason: String) -> BookingResult<Booking> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut booking = load_for_update(&mut *tx, booking_id).await?;
        require_pending(&booking, "reject")?;

        let row = booking.transition(BookingStatus::Rejected, Actor::Staff(staff_id), Some(reason.clone()), now);
        booking.override_staff_id = Some(staff_id);
        booking.override_reason = Some(reason);
        self.commit_transition(tx, booking, row).await
    }

    async fn confirm_locked(
        &self,
        mut tx: Box<dyn BookingTx>,
        mut booking: Booking,
        actor: Actor,
        payment_reference: Option<String>,
        now: DateTime<Utc>,
    ) -> BookingResult<Booking> {
        check_confirmable(&booking, now)?;
        ensure_slot_free(&mut *tx, booking.room_id, &booking.slot, Some(booking.id), now).await?;

        let row = booking.transition(BookingStatus::Confirmed, actor, None, now);
        booking.payment_completed_at = Some(now);
        booking.payment_reference = payment_reference;
        self.commit_transition(tx, booking, row).await
    }

    async fn commit_transition(
        &self,
        mut tx: Box<dyn BookingTx>,
        booking: Booking,
        row: BookingTransition,
    ) -> BookingResult<Booking> {
        tx.update_booking(&booking)
            .await
            .map_err(overlap_as_conflict(booking.room_id, booking.slot))?;
        tx.append_transition(&row).await?;
        tx.commit()
            .await
            .map_err(overlap_as_conflict(booking.room_id, booking.slot))?;

        self.audit.record(&row.to_event(&booking));
        info!(
            booking_id = %booking.id,
            actor = %row.actor,
            "Booking {} -> {}",
            row.from_status.map(|s| s.as_str()).unwrap_or("NEW"),
            row.to_status
        );
        Ok(booking)
    }
}

fn require_pending(booking: &Booking, action: &'static str) -> BookingResult<()> {
    if booking.status != BookingStatus::Pending {
        return Err(BookingError::InvalidState {
            booking_id: booking.id,
            status: booking.status,
            action,
        });
    }
    Ok(())
}

/// A lapsed hold is `Expired` whether or not the sweep has cancelled it yet.
fn check_confirmable(booking: &Booking, now: DateTime<Utc>) -> BookingResult<()> {
    let lapsed = match booking.status {
        BookingStatus::Pending => now > booking.expires_at,
        BookingStatus::Cancelled => booking.expired_at.is_some(),
        _ => false,
    };
    if lapsed {
        return Err(BookingError::Expired {
            booking_id: booking.id,
            expires_at: booking.expires_at,
        });
    }
    require_pending(booking, "confirm")
}
