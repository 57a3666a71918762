use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::{Booking, BookingTransition, Room};
use crate::slot::TimeSlot;
use crate::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Entry point to booking persistence.
///
/// Every write goes through a [`BookingTx`]. Reads on the store itself are
/// unlocked snapshots and must not be used to decide a write.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Open a unit of work. Dropping the returned transaction without
    /// calling [`BookingTx::commit`] discards everything staged in it.
    async fn begin(&self) -> StoreResult<Box<dyn BookingTx>>;

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn get_room(&self, id: Uuid) -> StoreResult<Option<Room>>;

    async fn save_room(&self, room: &Room) -> StoreResult<()>;

    /// Ids of `PENDING` bookings with `expires_at <= now`, oldest first.
    async fn stale_hold_ids(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<Uuid>>;

    /// Bookings of `room_id` in `PENDING` or `CONFIRMED` whose slot overlaps `window`.
    async fn bookings_in_window(&self, room_id: Uuid, window: &TimeSlot) -> StoreResult<Vec<Booking>>;

    /// History rows of one booking in the order they were written.
    async fn history(&self, booking_id: Uuid) -> StoreResult<Vec<BookingTransition>>;
}

/// A transactional view over the store.
///
/// Callers lock the room before reading its bookings; holding the room
/// lock is what makes check-then-write atomic against other writers.
#[async_trait]
pub trait BookingTx: Send {
    async fn lock_room(&mut self, room_id: Uuid) -> StoreResult<()>;

    async fn find_room(&mut self, room_id: Uuid) -> StoreResult<Option<Room>>;

    async fn find_booking(&mut self, id: Uuid) -> StoreResult<Option<Booking>>;

    /// `PENDING`/`CONFIRMED` bookings of `room_id` whose slot overlaps `slot`.
    /// Liveness of pending holds is left to the caller.
    async fn overlapping_bookings(&mut self, room_id: Uuid, slot: &TimeSlot) -> StoreResult<Vec<Booking>>;

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn append_transition(&mut self, transition: &BookingTransition) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
