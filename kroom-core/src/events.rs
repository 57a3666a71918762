use kroom_shared::models::events::BookingTransitionEvent;

/// Receives one immutable record per booking state transition.
///
/// Called after the transition is committed. Implementations must not fail
/// the caller; a sink that cannot deliver logs and moves on.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &BookingTransitionEvent);
}

/// Writes audit records as structured `tracing` events on the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &BookingTransitionEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => tracing::info!(
                target: "audit",
                booking_id = %event.booking_id,
                to_status = %event.to_status,
                "{}",
                payload
            ),
            Err(e) => tracing::error!(target: "audit", "Failed to serialize audit event {}: {}", event.transition_id, e),
        }
    }
}
