use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use kroom_core::repository::BookingStore;
use kroom_core::{Actor, Booking, BookingResult, BookingRules, Room, TimeSlot};
use kroom_shared::ManualClock;

use crate::audit::RecordingAuditSink;
use crate::engine::BookingEngine;
use crate::hold::HoldRequest;
use crate::memory::InMemoryBookingStore;

pub(crate) fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

pub(crate) fn slot(from: (u32, u32), to: (u32, u32)) -> TimeSlot {
    TimeSlot::new(at(from.0, from.1), at(to.0, to.1)).unwrap()
}

pub(crate) fn room() -> Room {
    Room {
        id: Uuid::new_v4(),
        venue_id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        name: "Neon Booth".to_string(),
        capacity: 10,
        hourly_rate_cents: 6000,
        currency: "USD".to_string(),
        is_active: true,
    }
}

/// In-memory engine with one active room; the clock starts at 08:00.
pub(crate) struct Fixture {
    pub store: Arc<InMemoryBookingStore>,
    pub clock: ManualClock,
    pub audit: Arc<RecordingAuditSink>,
    pub engine: Arc<BookingEngine>,
    pub room: Room,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryBookingStore::new());
        let clock = ManualClock::new(at(8, 0));
        let audit = Arc::new(RecordingAuditSink::new());
        let room = room();
        store.save_room(&room).await.unwrap();

        let engine = Arc::new(BookingEngine::new(
            store.clone(),
            Arc::new(clock.clone()),
            audit.clone(),
            BookingRules::default(),
        ));
        Self { store, clock, audit, engine, room }
    }

    /// Hold `slot` in the fixture room for a fresh customer with the default hold duration.
    pub async fn hold(&self, slot: TimeSlot) -> BookingResult<Booking> {
        let customer_id = Uuid::new_v4();
        self.engine
            .holds
            .create_hold(
                HoldRequest {
                    room_id: self.room.id,
                    customer_id,
                    slot,
                    hold_seconds: None,
                },
                Actor::Customer(customer_id),
            )
            .await
    }
}
