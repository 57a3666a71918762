pub mod audit;
pub mod conflict;
pub mod engine;
pub mod hold;
pub mod lifecycle;
pub mod memory;
pub mod pricing;
mod txn;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::RecordingAuditSink;
pub use conflict::ConflictChecker;
pub use engine::BookingEngine;
pub use hold::{HoldManager, HoldRequest};
pub use lifecycle::LifecycleManager;
pub use memory::InMemoryBookingStore;
