use uuid::Uuid;

use kroom_core::repository::BookingTx;
use kroom_core::{Booking, BookingError, BookingResult, StoreError, TimeSlot};

/// Load a booking and take its room lock, re-reading the row once the lock is held.
pub(crate) async fn load_for_update(tx: &mut dyn BookingTx, booking_id: Uuid) -> BookingResult<Booking> {
    let booking = tx
        .find_booking(booking_id)
        .await?
        .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))?;
    tx.lock_room(booking.room_id).await?;
    tx.find_booking(booking_id)
        .await?
        .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))
}

/// Map a store-level overlap rejection onto the caller-facing conflict error.
pub(crate) fn overlap_as_conflict(room_id: Uuid, slot: TimeSlot) -> impl FnOnce(StoreError) -> BookingError {
    move |err| match err {
        StoreError::Overlap(detail) => {
            tracing::warn!(room_id = %room_id, "Store rejected overlapping write: {}", detail);
            BookingError::Conflict { room_id, slot }
        }
        other => BookingError::Store(other),
    }
}
