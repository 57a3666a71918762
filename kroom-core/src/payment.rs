use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The only thing the booking core needs from a payment provider.
///
/// `booking_id` doubles as the idempotency key: providers retry callbacks,
/// and a retried success for an already-confirmed booking is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub booking_id: Uuid,
    pub succeeded: bool,
    pub provider_reference: Option<String>,
}

impl PaymentOutcome {
    pub fn succeeded(booking_id: Uuid, provider_reference: impl Into<String>) -> Self {
        Self {
            booking_id,
            succeeded: true,
            provider_reference: Some(provider_reference.into()),
        }
    }

    pub fn declined(booking_id: Uuid) -> Self {
        Self {
            booking_id,
            succeeded: false,
            provider_reference: None,
        }
    }
}
