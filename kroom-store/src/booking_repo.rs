use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use kroom_core::repository::{BookingStore, BookingTx, StoreResult};
use kroom_core::{Actor, Booking, BookingStatus, BookingTransition, Room, StoreError, TimeSlot};

/// Postgres exclusion_violation
const EXCLUSION_VIOLATION: &str = "23P01";

const BOOKING_COLUMNS: &str = r#"
    id, organization_id, room_id, customer_id, start_time, end_time, status,
    reserved_at, expires_at, payment_completed_at, payment_reference, extension_count,
    total_price_cents, currency, cancel_reason, expired_at, override_staff_id,
    override_reason, created_at, updated_at
"#;

const ROOM_COLUMNS: &str =
    "id, venue_id, organization_id, name, capacity, hourly_rate_cents, currency, is_active";

pub(crate) fn map_db(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(EXCLUSION_VIOLATION) {
            return StoreError::Overlap(db.message().to_string());
        }
    }
    StoreError::backend(err)
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: Uuid,
    organization_id: Uuid,
    room_id: Uuid,
    customer_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    reserved_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    payment_completed_at: Option<DateTime<Utc>>,
    payment_reference: Option<String>,
    extension_count: i32,
    total_price_cents: i64,
    currency: String,
    cancel_reason: Option<String>,
    expired_at: Option<DateTime<Utc>>,
    override_staff_id: Option<Uuid>,
    override_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let slot = TimeSlot::new(row.start_time, row.end_time)
            .map_err(|e| StoreError::Corrupt(format!("booking {}: {}", row.id, e)))?;
        let status = row
            .status
            .parse::<BookingStatus>()
            .map_err(|e| StoreError::Corrupt(format!("booking {}: {}", row.id, e)))?;
        let extension_count = u32::try_from(row.extension_count).map_err(|_| {
            StoreError::Corrupt(format!("booking {}: negative extension_count", row.id))
        })?;

        Ok(Booking {
            id: row.id,
            organization_id: row.organization_id,
            room_id: row.room_id,
            customer_id: row.customer_id,
            slot,
            status,
            reserved_at: row.reserved_at,
            expires_at: row.expires_at,
            payment_completed_at: row.payment_completed_at,
            payment_reference: row.payment_reference,
            extension_count,
            total_price_cents: row.total_price_cents,
            currency: row.currency,
            cancel_reason: row.cancel_reason,
            expired_at: row.expired_at,
            override_staff_id: row.override_staff_id,
            override_reason: row.override_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TransitionRow {
    id: Uuid,
    booking_id: Uuid,
    from_status: Option<String>,
    to_status: String,
    actor_kind: String,
    actor_id: Option<Uuid>,
    reason: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<TransitionRow> for BookingTransition {
    type Error = StoreError;

    fn try_from(row: TransitionRow) -> Result<Self, Self::Error> {
        let corrupt = |e: String| StoreError::Corrupt(format!("transition {}: {}", row.id, e));
        let from_status = row
            .from_status
            .as_deref()
            .map(str::parse::<BookingStatus>)
            .transpose()
            .map_err(corrupt)?;
        let to_status = row.to_status.parse::<BookingStatus>().map_err(corrupt)?;
        let actor = Actor::from_parts(&row.actor_kind, row.actor_id).map_err(corrupt)?;

        Ok(BookingTransition {
            id: row.id,
            booking_id: row.booking_id,
            from_status,
            to_status,
            actor,
            reason: row.reason,
            occurred_at: row.occurred_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    id: Uuid,
    venue_id: Uuid,
    organization_id: Uuid,
    name: String,
    capacity: i32,
    hourly_rate_cents: i64,
    currency: String,
    is_active: bool,
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Room {
            id: row.id,
            venue_id: row.venue_id,
            organization_id: row.organization_id,
            name: row.name,
            capacity: row.capacity,
            hourly_rate_cents: row.hourly_rate_cents,
            currency: row.currency,
            is_active: row.is_active,
        }
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> StoreResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn begin(&self) -> StoreResult<Box<dyn BookingTx>> {
        let tx = self.pool.begin().await.map_err(map_db)?;
        Ok(Box::new(PgBookingTx { tx }))
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db)?;
        row.map(Booking::try_from).transpose()
    }

    async fn get_room(&self, id: Uuid) -> StoreResult<Option<Room>> {
        let sql = format!("SELECT {} FROM rooms WHERE id = $1", ROOM_COLUMNS);
        let row = sqlx::query_as::<_, RoomRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db)?;
        Ok(row.map(Room::from))
    }

    async fn save_room(&self, room: &Room) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rooms (id, venue_id, organization_id, name, capacity, hourly_rate_cents, currency, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                venue_id = EXCLUDED.venue_id,
                organization_id = EXCLUDED.organization_id,
                name = EXCLUDED.name,
                capacity = EXCLUDED.capacity,
                hourly_rate_cents = EXCLUDED.hourly_rate_cents,
                currency = EXCLUDED.currency,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(room.id)
        .bind(room.venue_id)
        .bind(room.organization_id)
        .bind(&room.name)
        .bind(room.capacity)
        .bind(room.hourly_rate_cents)
        .bind(&room.currency)
        .bind(room.is_active)
        .execute(&self.pool)
        .await
        .map_err(map_db)?;
        Ok(())
    }

    async fn stale_hold_ids(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<Uuid>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM bookings
            WHERE status = 'PENDING' AND expires_at <= $1
            ORDER BY expires_at
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db)
    }

    async fn bookings_in_window(&self, room_id: Uuid, window: &TimeSlot) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {} FROM bookings
            WHERE room_id = $1
              AND status IN ('PENDING', 'CONFIRMED')
              AND start_time < $3
              AND $2 < end_time
            ORDER BY start_time
            "#,
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(room_id)
            .bind(window.start())
            .bind(window.end())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db)?;
        into_bookings(rows)
    }

    async fn history(&self, booking_id: Uuid) -> StoreResult<Vec<BookingTransition>> {
        let rows = sqlx::query_as::<_, TransitionRow>(
            r#"
            SELECT id, booking_id, from_status, to_status, actor_kind, actor_id, reason, occurred_at
            FROM booking_transitions
            WHERE booking_id = $1
            ORDER BY seq
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db)?;
        rows.into_iter().map(BookingTransition::try_from).collect()
    }
}

/// One Postgres transaction. Dropping it without commit rolls back.
struct PgBookingTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BookingTx for PgBookingTx {
    async fn lock_room(&mut self, room_id: Uuid) -> StoreResult<()> {
        // released automatically at commit or rollback
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(room_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db)?;
        Ok(())
    }

    async fn find_room(&mut self, room_id: Uuid) -> StoreResult<Option<Room>> {
        let sql = format!("SELECT {} FROM rooms WHERE id = $1", ROOM_COLUMNS);
        let row = sqlx::query_as::<_, RoomRow>(&sql)
            .bind(room_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db)?;
        Ok(row.map(Room::from))
    }

    async fn find_booking(&mut self, id: Uuid) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1 FOR UPDATE", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db)?;
        row.map(Booking::try_from).transpose()
    }

    async fn overlapping_bookings(&mut self, room_id: Uuid, slot: &TimeSlot) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {} FROM bookings
            WHERE room_id = $1
              AND status IN ('PENDING', 'CONFIRMED')
              AND start_time < $3
              AND $2 < end_time
            "#,
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(room_id)
            .bind(slot.start())
            .bind(slot.end())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_db)?;
        into_bookings(rows)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, organization_id, room_id, customer_id, start_time, end_time, status,
                reserved_at, expires_at, payment_completed_at, payment_reference, extension_count,
                total_price_cents, currency, cancel_reason, expired_at, override_staff_id,
                override_reason, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(booking.id)
        .bind(booking.organization_id)
        .bind(booking.room_id)
        .bind(booking.customer_id)
        .bind(booking.slot.start())
        .bind(booking.slot.end())
        .bind(booking.status.as_str())
        .bind(booking.reserved_at)
        .bind(booking.expires_at)
        .bind(booking.payment_completed_at)
        .bind(&booking.payment_reference)
        .bind(booking.extension_count as i32)
        .bind(booking.total_price_cents)
        .bind(&booking.currency)
        .bind(&booking.cancel_reason)
        .bind(booking.expired_at)
        .bind(booking.override_staff_id)
        .bind(&booking.override_reason)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db)?;
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                status = $2,
                expires_at = $3,
                payment_completed_at = $4,
                payment_reference = $5,
                extension_count = $6,
                cancel_reason = $7,
                expired_at = $8,
                override_staff_id = $9,
                override_reason = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(booking.id)
        .bind(booking.status.as_str())
        .bind(booking.expires_at)
        .bind(booking.payment_completed_at)
        .bind(&booking.payment_reference)
        .bind(booking.extension_count as i32)
        .bind(&booking.cancel_reason)
        .bind(booking.expired_at)
        .bind(booking.override_staff_id)
        .bind(&booking.override_reason)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db)?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Corrupt(format!("update of unknown booking {}", booking.id)));
        }
        Ok(())
    }

    async fn append_transition(&mut self, transition: &BookingTransition) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO booking_transitions (id, booking_id, from_status, to_status, actor_kind, actor_id, reason, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(transition.id)
        .bind(transition.booking_id)
        .bind(transition.from_status.map(|s| s.as_str()))
        .bind(transition.to_status.as_str())
        .bind(transition.actor.kind())
        .bind(transition.actor.id())
        .bind(&transition.reason)
        .bind(transition.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(map_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn row(status: &str, start_offset_h: i64, end_offset_h: i64) -> BookingRow {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        BookingRow {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            start_time: now + Duration::hours(start_offset_h),
            end_time: now + Duration::hours(end_offset_h),
            status: status.to_string(),
            reserved_at: now,
            expires_at: now + Duration::minutes(5),
            payment_completed_at: None,
            payment_reference: None,
            extension_count: 1,
            total_price_cents: 6000,
            currency: "USD".to_string(),
            cancel_reason: None,
            expired_at: None,
            override_staff_id: None,
            override_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_booking_row_conversion() {
        let booking = Booking::try_from(row("CONFIRMED", 1, 2)).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.extension_count, 1);
        assert_eq!(booking.slot.duration(), Duration::hours(1));
    }

    #[test]
    fn test_corrupt_rows_are_rejected() {
        assert!(matches!(Booking::try_from(row("ON_HOLD", 1, 2)), Err(StoreError::Corrupt(_))));
        assert!(matches!(Booking::try_from(row("PENDING", 2, 1)), Err(StoreError::Corrupt(_))));

        let mut negative = row("PENDING", 1, 2);
        negative.extension_count = -1;
        assert!(matches!(Booking::try_from(negative), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_transition_row_conversion() {
        let staff = Uuid::new_v4();
        let transition = BookingTransition::try_from(TransitionRow {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            from_status: Some("PENDING".to_string()),
            to_status: "REJECTED".to_string(),
            actor_kind: "staff".to_string(),
            actor_id: Some(staff),
            reason: Some("maintenance".to_string()),
            occurred_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(transition.from_status, Some(BookingStatus::Pending));
        assert_eq!(transition.actor, Actor::Staff(staff));

        let broken = BookingTransition::try_from(TransitionRow {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            from_status: None,
            to_status: "PENDING".to_string(),
            actor_kind: "system".to_string(),
            actor_id: Some(staff),
            reason: None,
            occurred_at: Utc::now(),
        });
        assert!(matches!(broken, Err(StoreError::Corrupt(_))));
    }
}
