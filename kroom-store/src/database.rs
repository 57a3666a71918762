use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};

use kroom_core::rules::hold_duration;
use kroom_core::BookingRules;

use crate::app_config::DatabaseConfig;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Layer rows of the `booking_rules` table over the configured defaults.
    pub async fn fetch_booking_rules(&self, defaults: BookingRules) -> Result<BookingRules, sqlx::Error> {
        #[derive(sqlx::FromRow)]
        struct RuleRow {
            rule_key: String,
            rule_value: Value,
        }

        let rows = sqlx::query_as::<_, RuleRow>("SELECT rule_key, rule_value FROM booking_rules")
            .fetch_all(&self.pool)
            .await?;

        Ok(apply_rule_overrides(
            defaults,
            rows.into_iter().map(|r| (r.rule_key, r.rule_value)),
        ))
    }
}

/// Expected value format: `{"value": <number>}`. Unknown keys, malformed values
/// and values the engine would reject (zero or over-long durations, an empty
/// sweep) are logged and ignored.
pub fn apply_rule_overrides<I>(defaults: BookingRules, rows: I) -> BookingRules
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut rules = defaults;

    for (key, value) in rows {
        let Some(v) = value.get("value").and_then(Value::as_u64) else {
            warn!("Ignoring malformed booking rule {}: {}", key, value);
            continue;
        };
        match key.as_str() {
            "hold_seconds" | "extension_seconds" => {
                if let Err(e) = hold_duration(v, &key) {
                    warn!("Ignoring booking rule {}: {}", key, e);
                } else if key == "hold_seconds" {
                    rules.hold_seconds = v;
                } else {
                    rules.extension_seconds = v;
                }
            }
            "max_extensions" => match u32::try_from(v) {
                Ok(max) => rules.max_extensions = max,
                Err(_) => warn!("max_extensions override out of range: {}", v),
            },
            "sweep_interval_seconds" | "sweep_batch_size" if v == 0 => {
                warn!("Ignoring booking rule {}: must be at least 1", key)
            }
            "sweep_interval_seconds" => rules.sweep_interval_seconds = v,
            "sweep_batch_size" => match usize::try_from(v) {
                Ok(size) => rules.sweep_batch_size = size,
                Err(_) => warn!("sweep_batch_size override out of range: {}", v),
            },
            other => warn!("Unknown booking rule {}", other),
        }
    }

    rules
}
