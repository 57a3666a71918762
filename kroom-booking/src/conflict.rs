use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use kroom_core::repository::{BookingStore, BookingTx};
use kroom_core::{Booking, BookingError, BookingResult, TimeSlot};
use kroom_shared::Clock;

/// The first row that keeps `candidate` from being booked in `room_id`, if any.
///
/// Only confirmed bookings and live holds count. `exclude` skips the booking
/// being re-evaluated (extension, confirmation).
pub fn find_conflict<'a>(
    room_id: Uuid,
    candidate: &TimeSlot,
    rows: &'a [Booking],
    exclude: Option<Uuid>,
    now: DateTime<Utc>,
) -> Option<&'a Booking> {
    rows.iter()
        .filter(|b| Some(b.id) != exclude)
        .filter(|b| b.room_id == room_id)
        .filter(|b| b.blocks_slot(now))
        .find(|b| b.slot.overlaps(candidate))
}

/// Fail with `Conflict` if `slot` is taken. Caller must already hold the room lock.
pub(crate) async fn ensure_slot_free(
    tx: &mut dyn BookingTx,
    room_id: Uuid,
    slot: &TimeSlot,
    exclude: Option<Uuid>,
    now: DateTime<Utc>,
) -> BookingResult<()> {
    let rows = tx.overlapping_bookings(room_id, slot).await?;
    if let Some(existing) = find_conflict(room_id, slot, &rows, exclude, now) {
        tracing::debug!(
            room_id = %room_id,
            existing = %existing.id,
            "Slot {} overlaps {} ({})",
            slot,
            existing.slot,
            existing.status
        );
        return Err(BookingError::Conflict { room_id, slot: *slot });
    }
    Ok(())
}

/// Collapse overlapping or touching intervals into a sorted, disjoint list.
pub fn merge_slots(mut slots: Vec<TimeSlot>) -> Vec<TimeSlot> {
    slots.sort_by_key(|s| s.start());
    let mut merged: Vec<TimeSlot> = Vec::with_capacity(slots.len());
    for slot in slots {
        match merged.last_mut() {
            Some(last) if slot.start() <= last.end() => {
                if slot.end() > last.end() {
                    // start < end holds for both inputs, so the union is valid
                    if let Ok(union) = TimeSlot::new(last.start(), slot.end()) {
                        *last = union;
                    }
                }
            }
            _ => merged.push(slot),
        }
    }
    merged
}

/// Read-side conflict queries.
pub struct ConflictChecker {
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
}

impl ConflictChecker {
    pub fn new(store: Arc<dyn BookingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Whether `candidate` overlaps a confirmed booking or live hold of `room_id`.
    pub async fn has_conflict(
        &self,
        room_id: Uuid,
        candidate: &TimeSlot,
        exclude_booking_id: Option<Uuid>,
    ) -> BookingResult<bool> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        tx.lock_room(room_id).await?;
        let rows = tx.overlapping_bookings(room_id, candidate).await?;
        Ok(find_conflict(room_id, candidate, &rows, exclude_booking_id, now).is_some())
    }

    /// Occupied parts of `window` for `room_id`, merged and sorted.
    pub async fn occupied_slots(&self, room_id: Uuid, window: &TimeSlot) -> BookingResult<Vec<TimeSlot>> {
        let now = self.clock.now();
        let rows = self.store.bookings_in_window(room_id, window).await?;
        let occupied = rows
            .iter()
            .filter(|b| b.blocks_slot(now))
            .filter_map(|b| b.slot.clamp_to(window))
            .collect();
        Ok(merge_slots(occupied))
    }
}
