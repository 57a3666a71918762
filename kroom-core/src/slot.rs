use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::BookingError;

/// Half-open time interval `[start, end)` with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSlot")]
pub struct TimeSlot {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawSlot {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawSlot> for TimeSlot {
    type Error = BookingError;

    fn try_from(raw: RawSlot) -> Result<Self, Self::Error> {
        TimeSlot::new(raw.start, raw.end)
    }
}

impl TimeSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, BookingError> {
        if start >= end {
            return Err(BookingError::Validation(format!(
                "slot start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Standard half-open overlap test. Adjacent slots (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The part of `self` that falls inside `window`, if any.
    pub fn clamp_to(&self, window: &TimeSlot) -> Option<TimeSlot> {
        let start = self.start.max(window.start);
        let end = self.end.min(window.end);
        (start < end).then_some(TimeSlot { start, end })
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// A room plus the interval requested or occupied in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSlot {
    pub room_id: Uuid,
    pub slot: TimeSlot,
}

impl BookingSlot {
    pub fn new(room_id: Uuid, slot: TimeSlot) -> Self {
        Self { room_id, slot }
    }

    /// Two booking slots conflict only when they share a room and their intervals overlap.
    pub fn conflicts_with(&self, other: &BookingSlot) -> bool {
        self.room_id == other.room_id && self.slot.overlaps(&other.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
    }

    fn slot(from: (u32, u32), to: (u32, u32)) -> TimeSlot {
        TimeSlot::new(at(from.0, from.1), at(to.0, to.1)).unwrap()
    }

    #[test]
    fn test_rejects_empty_and_inverted_slots() {
        assert!(TimeSlot::new(at(9, 0), at(9, 0)).is_err());
        assert!(TimeSlot::new(at(10, 0), at(9, 0)).is_err());
    }

    #[test]
    fn test_overlap_matches_half_open_rule() {
        let base = slot((9, 0), (10, 0));
        let cases = [
            (slot((9, 30), (10, 30)), true),
            (slot((8, 0), (9, 1)), true),
            (slot((9, 15), (9, 45)), true),
            (slot((8, 0), (11, 0)), true),
            (slot((10, 0), (11, 0)), false),
            (slot((8, 0), (9, 0)), false),
            (slot((11, 0), (12, 0)), false),
        ];

        for (other, expected) in cases {
            let rule = base.start() < other.end() && other.start() < base.end();
            assert_eq!(base.overlaps(&other), expected, "{} vs {}", base, other);
            assert_eq!(base.overlaps(&other), rule);
            assert_eq!(other.overlaps(&base), expected, "overlap must be symmetric");
        }
    }

    #[test]
    fn test_conflict_requires_same_room() {
        let a = BookingSlot::new(Uuid::new_v4(), slot((9, 0), (10, 0)));
        let b = BookingSlot::new(Uuid::new_v4(), slot((9, 0), (10, 0)));
        assert!(!a.conflicts_with(&b));
        assert!(a.conflicts_with(&BookingSlot::new(a.room_id, slot((9, 59), (10, 30)))));
    }

    #[test]
    fn test_clamp_to_window() {
        let window = slot((9, 0), (12, 0));
        assert_eq!(slot((8, 0), (10, 0)).clamp_to(&window), Some(slot((9, 0), (10, 0))));
        assert_eq!(slot((12, 0), (13, 0)).clamp_to(&window), None);
    }

    #[test]
    fn test_deserialize_validates_order() {
        let ok: TimeSlot = serde_json::from_str(
            r#"{"start":"2024-05-01T09:00:00Z","end":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(ok.duration(), Duration::hours(1));

        let bad = serde_json::from_str::<TimeSlot>(
            r#"{"start":"2024-05-01T10:00:00Z","end":"2024-05-01T09:00:00Z"}"#,
        );
        assert!(bad.is_err());
    }
}
