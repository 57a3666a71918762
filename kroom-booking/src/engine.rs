use std::sync::Arc;
use uuid::Uuid;

use kroom_core::events::AuditSink;
use kroom_core::repository::BookingStore;
use kroom_core::{Booking, BookingError, BookingResult, BookingRules, BookingTransition};
use kroom_shared::Clock;

use crate::conflict::ConflictChecker;
use crate::hold::HoldManager;
use crate::lifecycle::LifecycleManager;

/// The three booking components wired to one store, clock and audit sink.
pub struct BookingEngine {
    pub conflicts: ConflictChecker,
    pub holds: HoldManager,
    pub lifecycle: LifecycleManager,
    store: Arc<dyn BookingStore>,
}

impl BookingEngine {
    pub fn new(
        store: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        rules: BookingRules,
    ) -> Self {
        Self {
            conflicts: ConflictChecker::new(store.clone(), clock.clone()),
            holds: HoldManager::new(store.clone(), clock.clone(), audit.clone(), rules),
            lifecycle: LifecycleManager::new(store.clone(), clock, audit),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    pub async fn booking(&self, booking_id: Uuid) -> BookingResult<Booking> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))
    }

    pub async fn history(&self, booking_id: Uuid) -> BookingResult<Vec<BookingTransition>> {
        // 404 for unknown ids rather than an empty list
        self.booking(booking_id).await?;
        Ok(self.store.history(booking_id).await?)
    }
}
