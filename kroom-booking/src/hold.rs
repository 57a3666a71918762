use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use kroom_core::events::AuditSink;
use kroom_core::repository::BookingStore;
use kroom_core::rules::hold_duration;
use kroom_core::{
    Actor, Booking, BookingError, BookingResult, BookingRules, BookingStatus, BookingTransition, TimeSlot,
};
use kroom_shared::Clock;

use crate::conflict::ensure_slot_free;
use crate::pricing;
use crate::txn::{load_for_update, overlap_as_conflict};

pub const EXPIRED_REASON: &str = "hold expired";

/// Request to reserve `slot` in `room_id` for `customer_id`.
#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub room_id: Uuid,
    pub customer_id: Uuid,
    pub slot: TimeSlot,
    /// Falls back to the configured hold duration.
    pub hold_seconds: Option<u64>,
}

/// Creates, extends and expires time-limited holds.
pub struct HoldManager {
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    rules: BookingRules,
}

impl HoldManager {
    pub fn new(
        store: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        rules: BookingRules,
    ) -> Self {
        Self { store, clock, audit, rules }
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    /// Reserve a slot as a `PENDING` booking that lapses after the hold duration.
    pub async fn create_hold(&self, request: HoldRequest, actor: Actor) -> BookingResult<Booking> {
        let now = self.clock.now();
        let ttl = hold_duration(request.hold_seconds.unwrap_or(self.rules.hold_seconds), "hold duration")?;
        if request.slot.start() < now {
            return Err(BookingError::Validation(format!(
                "slot {} starts in the past",
                request.slot
            )));
        }

        let room_id = request.room_id;
        let mut tx = self.store.begin().await?;
        tx.lock_room(room_id).await?;

        let room = tx
            .find_room(room_id)
            .await?
            .filter(|r| r.is_active)
            .ok_or_else(|| BookingError::NotFound(format!("room {}", room_id)))?;

        ensure_slot_free(&mut *tx, room_id, &request.slot, None, now).await?;

        let price = pricing::quote(&room, &request.slot);
        let booking = Booking::new_hold(&room, request.customer_id, request.slot, price, now, now + ttl);
        let created = BookingTransition::created(&booking, actor);

        tx.insert_booking(&booking)
            .await
            .map_err(overlap_as_conflict(room_id, request.slot))?;
        tx.append_transition(&created).await?;
        tx.commit()
            .await
            .map_err(overlap_as_conflict(room_id, request.slot))?;

        self.audit.record(&created.to_event(&booking));
        info!(
            booking_id = %booking.id,
            room_id = %room_id,
            "Hold created for {} until {}",
            booking.slot,
            booking.expires_at
        );
        Ok(booking)
    }

    /// Push a live hold's expiry forward, at most `max_extensions` times.
    ///
    /// Only a live hold (`expires_at > now`) can be extended, and lapsing is
    /// checked before the cap, so a lapsed hold is `Expired` even at the cap.
    ///
    /// The slot is re-checked under the room lock; on conflict the hold is
    /// left untouched and the extension is not counted.
    pub async fn extend_hold(&self, booking_id: Uuid, extension_seconds: Option<u64>) -> BookingResult<Booking> {
        let now = self.clock.now();
        let extension = hold_duration(
            extension_seconds.unwrap_or(self.rules.extension_seconds),
            "extension",
        )?;

        let mut tx = self.store.begin().await?;
        let booking = load_for_update(&mut *tx, booking_id).await?;

        if booking.status != BookingStatus::Pending {
            return Err(BookingError::NotFound(format!("pending hold {}", booking_id)));
        }
        if booking.is_stale_hold(now) {
            return Err(BookingError::Expired {
                booking_id,
                expires_at: booking.expires_at,
            });
        }
        if booking.extension_count >= self.rules.max_extensions {
            return Err(BookingError::ExtensionLimit {
                booking_id,
                max: self.rules.max_extensions,
            });
        }

        ensure_slot_free(&mut *tx, booking.room_id, &booking.slot, Some(booking_id), now).await?;

        let mut extended = booking;
        extended.extension_count += 1;
        extended.expires_at += extension;
        extended.updated_at = now;

        tx.update_booking(&extended)
            .await
            .map_err(overlap_as_conflict(extended.room_id, extended.slot))?;
        tx.commit().await?;

        info!(
            booking_id = %booking_id,
            extension_count = extended.extension_count,
            "Hold extended until {}",
            extended.expires_at
        );
        Ok(extended)
    }

    /// Cancel every `PENDING` hold with `expires_at <= now`, up to the batch size.
    ///
    /// Each hold is expired in its own transaction. A row that fails is logged
    /// and skipped; a row that is no longer stale when re-read is left alone.
    pub async fn expire_stale_holds(&self, now: DateTime<Utc>) -> BookingResult<usize> {
        let ids = self.store.stale_hold_ids(now, self.rules.sweep_batch_size).await?;
        let mut expired = 0;

        for id in ids {
            match self.expire_one(id, now).await {
                Ok(true) => expired += 1,
                Ok(false) => debug!(booking_id = %id, "Hold no longer stale, skipping"),
                Err(e) => warn!(booking_id = %id, "Failed to expire hold: {}", e),
            }
        }

        if expired > 0 {
            info!("Expired {} stale holds", expired);
        }
        Ok(expired)
    }

    async fn expire_one(&self, booking_id: Uuid, now: DateTime<Utc>) -> BookingResult<bool> {
        let mut tx = self.store.begin().await?;
        let mut booking = load_for_update(&mut *tx, booking_id).await?;
        if !booking.is_stale_hold(now) {
            return Ok(false);
        }

        let row = booking.transition(
            BookingStatus::Cancelled,
            Actor::System,
            Some(EXPIRED_REASON.to_string()),
            now,
        );
        booking.cancel_reason = Some(EXPIRED_REASON.to_string());
        booking.expired_at = Some(now);

        tx.update_booking(&booking).await?;
        tx.append_transition(&row).await?;
        tx.commit().await?;

        self.audit.record(&row.to_event(&booking));
        Ok(true)
    }
}
