use kroom_core::{Room, TimeSlot};

const SECONDS_PER_HOUR: i64 = 3600;

/// Price of `slot` in `room`, in cents: the hourly rate pro-rated by the
/// second and rounded up to the next cent.
pub fn quote(room: &Room, slot: &TimeSlot) -> i64 {
    let seconds = slot.duration().num_seconds();
    let numerator = room.hourly_rate_cents.saturating_mul(seconds);
    if numerator <= 0 {
        return 0;
    }
    (numerator + SECONDS_PER_HOUR - 1) / SECONDS_PER_HOUR
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{room, slot};

    #[test]
    fn test_whole_and_partial_hours() {
        let mut r = room();
        r.hourly_rate_cents = 4500;

        assert_eq!(quote(&r, &slot((9, 0), (10, 0))), 4500);
        assert_eq!(quote(&r, &slot((9, 0), (11, 30))), 11250);
        // 4500 * 20/60 = 1500 exactly
        assert_eq!(quote(&r, &slot((9, 0), (9, 20))), 1500);
    }

    #[test]
    fn test_rounds_up_to_cent() {
        let mut r = room();
        r.hourly_rate_cents = 1000;
        // 1000 * 7/60 = 116.67
        assert_eq!(quote(&r, &slot((9, 0), (9, 7))), 117);
    }
}
