use uuid::Uuid;

/// One audit record per booking state transition. Timestamps are unix seconds.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingTransitionEvent {
    pub transition_id: Uuid,
    pub booking_id: Uuid,
    pub room_id: Uuid,
    pub organization_id: Uuid,
    pub from_status: Option<String>,
    pub to_status: String,
    pub actor: String,
    pub reason: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct HoldsExpiredEvent {
    pub expired: usize,
    pub swept_at: i64,
}
