use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::slot::{BookingSlot, TimeSlot};
use kroom_shared::models::events::BookingTransitionEvent;

/// A bookable karaoke room. Owned by one venue, which belongs to one organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub hourly_rate_cents: i64,
    pub currency: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "REJECTED" => Ok(BookingStatus::Rejected),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

/// Who performed a lifecycle action. Always passed in explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Customer(Uuid),
    Staff(Uuid),
    System,
}

impl Actor {
    pub fn kind(&self) -> &'static str {
        match self {
            Actor::Customer(_) => "customer",
            Actor::Staff(_) => "staff",
            Actor::System => "system",
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Actor::Customer(id) | Actor::Staff(id) => Some(*id),
            Actor::System => None,
        }
    }

    /// Rebuild an actor from its stored `(kind, id)` columns.
    pub fn from_parts(kind: &str, id: Option<Uuid>) -> Result<Self, String> {
        match (kind, id) {
            ("customer", Some(id)) => Ok(Actor::Customer(id)),
            ("staff", Some(id)) => Ok(Actor::Staff(id)),
            ("system", None) => Ok(Actor::System),
            (kind, id) => Err(format!("invalid actor columns: {} / {:?}", kind, id)),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Customer(id) => write!(f, "customer:{}", id),
            Actor::Staff(id) => write!(f, "staff:{}", id),
            Actor::System => f.write_str("system"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub room_id: Uuid,
    pub customer_id: Uuid,
    pub slot: TimeSlot,
    pub status: BookingStatus,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub payment_completed_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub extension_count: u32,
    pub total_price_cents: i64,
    pub currency: String,
    pub cancel_reason: Option<String>,
    /// Set only when the expiry sweep cancelled the hold.
    pub expired_at: Option<DateTime<Utc>>,
    pub override_staff_id: Option<Uuid>,
    pub override_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A fresh `PENDING` hold on `room` that lapses at `expires_at`.
    pub fn new_hold(
        room: &Room,
        customer_id: Uuid,
        slot: TimeSlot,
        total_price_cents: i64,
        reserved_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: room.organization_id,
            room_id: room.id,
            customer_id,
            slot,
            status: BookingStatus::Pending,
            reserved_at,
            expires_at,
            payment_completed_at: None,
            payment_reference: None,
            extension_count: 0,
            total_price_cents,
            currency: room.currency.clone(),
            cancel_reason: None,
            expired_at: None,
            override_staff_id: None,
            override_reason: None,
            created_at: reserved_at,
            updated_at: reserved_at,
        }
    }

    pub fn booking_slot(&self) -> BookingSlot {
        BookingSlot::new(self.room_id, self.slot)
    }

    /// A pending hold that has not yet lapsed.
    pub fn is_live_hold(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && self.expires_at > now
    }

    /// A pending hold whose `expires_at` has passed; the sweep will cancel it.
    pub fn is_stale_hold(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && self.expires_at <= now
    }

    /// Whether this booking currently occupies its slot for conflict purposes.
    pub fn blocks_slot(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Confirmed || self.is_live_hold(now)
    }

    /// Move to `to`, returning the history row that records the move.
    pub fn transition(
        &mut self,
        to: BookingStatus,
        actor: Actor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> BookingTransition {
        let from = self.status;
        self.status = to;
        self.updated_at = now;
        BookingTransition {
            id: Uuid::new_v4(),
            booking_id: self.id,
            from_status: Some(from),
            to_status: to,
            actor,
            reason,
            occurred_at: now,
        }
    }
}

/// Append-only history row; one per status change (and one for creation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingTransition {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub from_status: Option<BookingStatus>,
    pub to_status: BookingStatus,
    pub actor: Actor,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl BookingTransition {
    pub fn created(booking: &Booking, actor: Actor) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            from_status: None,
            to_status: booking.status,
            actor,
            reason: None,
            occurred_at: booking.created_at,
        }
    }

    pub fn to_event(&self, booking: &Booking) -> BookingTransitionEvent {
        BookingTransitionEvent {
            transition_id: self.id,
            booking_id: self.booking_id,
            room_id: booking.room_id,
            organization_id: booking.organization_id,
            from_status: self.from_status.map(|s| s.to_string()),
            to_status: self.to_status.to_string(),
            actor: self.actor.to_string(),
            reason: self.reason.clone(),
            timestamp: self.occurred_at.timestamp(),
        }
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
            name: "Studio A".to_string(),
            capacity: 8,
            hourly_rate_cents: 4000,
            currency: "USD".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn test_hold_liveness_around_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let slot = TimeSlot::new(now + Duration::hours(1), now + Duration::hours(2)).unwrap();
        let booking = Booking::new_hold(&room(), Uuid::new_v4(), slot, 4000, now, now + Duration::seconds(300));

        assert!(booking.blocks_slot(now));
        assert!(booking.blocks_slot(now + Duration::seconds(299)));
        // expires_at itself is no longer live
        assert!(!booking.blocks_slot(now + Duration::seconds(300)));
        assert!(booking.is_stale_hold(now + Duration::seconds(300)));
    }

    #[test]
    fn test_confirmed_never_expires() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let slot = TimeSlot::new(now + Duration::hours(1), now + Duration::hours(2)).unwrap();
        let mut booking = Booking::new_hold(&room(), Uuid::new_v4(), slot, 4000, now, now + Duration::seconds(300));
        let row = booking.transition(BookingStatus::Confirmed, Actor::Customer(booking.customer_id), None, now);

        assert_eq!(row.from_status, Some(BookingStatus::Pending));
        assert_eq!(row.to_status, BookingStatus::Confirmed);
        assert!(booking.blocks_slot(now + Duration::days(30)));
        assert!(!booking.is_stale_hold(now + Duration::days(30)));
    }

    #[test]
    fn test_status_and_actor_round_trip_through_columns() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }

        let staff = Actor::Staff(Uuid::new_v4());
        assert_eq!(Actor::from_parts(staff.kind(), staff.id()).unwrap(), staff);
        assert_eq!(Actor::from_parts("system", None).unwrap(), Actor::System);
        assert!(Actor::from_parts("customer", None).is_err());
    }

    #[test]
    fn test_actor_json_shape() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(Actor::Customer(id)).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "customer", "id": id }));
        let system: Actor = serde_json::from_value(serde_json::json!({ "kind": "system" })).unwrap();
        assert_eq!(system, Actor::System);
    }
}
