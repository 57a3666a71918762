pub mod slot;
pub mod booking;
pub mod repository;
pub mod payment;
pub mod events;
pub mod rules;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use booking::{Actor, Booking, BookingStatus, BookingTransition, Room};
pub use rules::BookingRules;
pub use slot::{BookingSlot, TimeSlot};

/// Failures raised by a persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend itself refused an overlapping write (e.g. an exclusion constraint).
    #[error("Overlapping booking rejected by store: {0}")]
    Overlap(String),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
    #[error("Storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Room {room_id} is not available for {slot}")]
    Conflict { room_id: Uuid, slot: TimeSlot },

    #[error("Hold {booking_id} expired at {expires_at}")]
    Expired {
        booking_id: Uuid,
        expires_at: DateTime<Utc>,
    },

    #[error("Hold {booking_id} already extended {max} times")]
    ExtensionLimit { booking_id: Uuid, max: u32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Booking {booking_id} cannot {action} from {status}")]
    InvalidState {
        booking_id: Uuid,
        status: BookingStatus,
        action: &'static str,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Payment declined for booking {0}")]
    PaymentDeclined(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type BookingResult<T> = Result<T, BookingError>;
