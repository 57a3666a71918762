use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use kroom_core::repository::{BookingStore, BookingTx, StoreResult};
use kroom_core::{Booking, BookingStatus, BookingTransition, Room, StoreError, TimeSlot};

#[derive(Debug, Default)]
struct MemoryState {
    rooms: HashMap<Uuid, Room>,
    bookings: HashMap<Uuid, Booking>,
    history: Vec<BookingTransition>,
}

/// Active (`PENDING`/`CONFIRMED`) rows of `room_id` overlapping `window`, by start time.
fn overlapping<'a>(rows: impl Iterator<Item = &'a Booking>, room_id: Uuid, window: &TimeSlot) -> Vec<Booking> {
    let mut rows: Vec<Booking> = rows
        .filter(|b| b.room_id == room_id)
        .filter(|b| matches!(b.status, BookingStatus::Pending | BookingStatus::Confirmed))
        .filter(|b| b.slot.overlaps(window))
        .cloned()
        .collect();
    rows.sort_by_key(|b| b.slot.start());
    rows
}

/// Process-local booking store.
///
/// A transaction holds one mutex for its whole lifetime, so transactions are
/// fully serialized; that is a superset of the per-room exclusion writers need.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn begin(&self) -> StoreResult<Box<dyn BookingTx>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx {
            guard,
            staged: HashMap::new(),
            appended: Vec::new(),
        }))
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn get_room(&self, id: Uuid) -> StoreResult<Option<Room>> {
        Ok(self.state.lock().await.rooms.get(&id).cloned())
    }

    async fn save_room(&self, room: &Room) -> StoreResult<()> {
        self.state.lock().await.rooms.insert(room.id, room.clone());
        Ok(())
    }

    async fn stale_hold_ids(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        let mut stale: Vec<&Booking> = state
            .bookings
            .values()
            .filter(|b| b.is_stale_hold(now))
            .collect();
        stale.sort_by_key(|b| b.expires_at);
        Ok(stale.into_iter().take(limit).map(|b| b.id).collect())
    }

    async fn bookings_in_window(&self, room_id: Uuid, window: &TimeSlot) -> StoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        Ok(overlapping(state.bookings.values(), room_id, window))
    }

    async fn history(&self, booking_id: Uuid) -> StoreResult<Vec<BookingTransition>> {
        let state = self.state.lock().await;
        Ok(state
            .history
            .iter()
            .filter(|t| t.booking_id == booking_id)
            .cloned()
            .collect())
    }
}

/// Writes are staged next to the locked state; commit applies them, drop throws them away.
struct InMemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: HashMap<Uuid, Booking>,
    appended: Vec<BookingTransition>,
}

impl InMemoryTx {
    fn booking(&self, id: &Uuid) -> Option<&Booking> {
        self.staged.get(id).or_else(|| self.guard.bookings.get(id))
    }

    /// Committed rows with this transaction's writes laid over them.
    fn bookings(&self) -> impl Iterator<Item = &Booking> + '_ {
        let staged = &self.staged;
        staged.values().chain(
            self.guard
                .bookings
                .values()
                .filter(move |b| !staged.contains_key(&b.id)),
        )
    }
}

#[async_trait]
impl BookingTx for InMemoryTx {
    async fn lock_room(&mut self, _room_id: Uuid) -> StoreResult<()> {
        // already exclusive for the whole transaction
        Ok(())
    }

    async fn find_room(&mut self, room_id: Uuid) -> StoreResult<Option<Room>> {
        Ok(self.guard.rooms.get(&room_id).cloned())
    }

    async fn find_booking(&mut self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.booking(&id).cloned())
    }

    async fn overlapping_bookings(&mut self, room_id: Uuid, slot: &TimeSlot) -> StoreResult<Vec<Booking>> {
        Ok(overlapping(self.bookings(), room_id, slot))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        if self.booking(&booking.id).is_some() {
            return Err(StoreError::Corrupt(format!("duplicate booking id {}", booking.id)));
        }
        self.staged.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        if self.booking(&booking.id).is_none() {
            return Err(StoreError::Corrupt(format!("update of unknown booking {}", booking.id)));
        }
        // Same guarantee the Postgres exclusion constraint gives: confirmed slots never overlap.
        if booking.status == BookingStatus::Confirmed {
            let clash = self.bookings().find(|other| {
                other.id != booking.id
                    && other.status == BookingStatus::Confirmed
                    && other.booking_slot().conflicts_with(&booking.booking_slot())
            });
            if let Some(other) = clash {
                return Err(StoreError::Overlap(format!(
                    "booking {} overlaps confirmed booking {}",
                    booking.id, other.id
                )));
            }
        }
        self.staged.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn append_transition(&mut self, transition: &BookingTransition) -> StoreResult<()> {
        self.appended.push(transition.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryTx { mut guard, staged, appended } = *self;
        guard.bookings.extend(staged);
        guard.history.extend(appended);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn room() -> Room {
        Room {
            id: Uuid::new_v4(),
            venue_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Room 1".to_string(),
            capacity: 6,
            hourly_rate_cents: 3000,
            currency: "USD".to_string(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_is_discarded() {
        let store = InMemoryBookingStore::new();
        let room = room();
        store.save_room(&room).await.unwrap();

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let slot = TimeSlot::new(now + Duration::hours(1), now + Duration::hours(2)).unwrap();
        let booking = Booking::new_hold(&room, Uuid::new_v4(), slot, 3000, now, now + Duration::minutes(5));

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_booking(&booking).await.unwrap();
            assert!(tx.find_booking(booking.id).await.unwrap().is_some());
        }
        assert!(store.get_booking(booking.id).await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&booking).await.unwrap();
        tx.commit().await.unwrap();
        assert!(store.get_booking(booking.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_confirmed_overlap_rejected_on_update() {
        let store = InMemoryBookingStore::new();
        let room = room();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let slot = TimeSlot::new(now + Duration::hours(1), now + Duration::hours(2)).unwrap();

        let mut first = Booking::new_hold(&room, Uuid::new_v4(), slot, 3000, now, now + Duration::minutes(5));
        let mut second = Booking::new_hold(&room, Uuid::new_v4(), slot, 3000, now, now + Duration::minutes(5));

        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&first).await.unwrap();
        tx.insert_booking(&second).await.unwrap();
        first.status = BookingStatus::Confirmed;
        tx.update_booking(&first).await.unwrap();
        second.status = BookingStatus::Confirmed;
        let err = tx.update_booking(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Overlap(_)));
    }

    #[tokio::test]
    async fn test_stale_hold_ids_are_oldest_first_and_limited() {
        let store = InMemoryBookingStore::new();
        let room = room();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut ids = Vec::new();
        for i in 0..3 {
            let slot = TimeSlot::new(now + Duration::hours(i + 1), now + Duration::hours(i + 2)).unwrap();
            let booking = Booking::new_hold(&room, Uuid::new_v4(), slot, 3000, now, now + Duration::minutes(5 - i));
            ids.push(booking.id);
            tx.insert_booking(&booking).await.unwrap();
        }
        tx.commit().await.unwrap();

        let later = now + Duration::minutes(10);
        assert_eq!(store.stale_hold_ids(later, 2).await.unwrap(), vec![ids[2], ids[1]]);
        assert!(store.stale_hold_ids(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_reads_its_own_writes_over_committed_rows() {
        let store = InMemoryBookingStore::new();
        let room = room();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let slot = TimeSlot::new(now + Duration::hours(1), now + Duration::hours(2)).unwrap();
        let mut booking = Booking::new_hold(&room, Uuid::new_v4(), slot, 3000, now, now + Duration::minutes(5));

        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&booking).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        booking.status = BookingStatus::Cancelled;
        tx.update_booking(&booking).await.unwrap();
        assert!(tx.overlapping_bookings(room.id, &slot).await.unwrap().is_empty());
        assert_eq!(tx.find_booking(booking.id).await.unwrap().unwrap().status, BookingStatus::Cancelled);
        let err = tx.insert_booking(&booking).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
        drop(tx);

        // rolled back: the committed row is still pending and visible
        let mut tx = store.begin().await.unwrap();
        let rows = tx.overlapping_bookings(room.id, &slot).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, BookingStatus::Pending);
    }
}
