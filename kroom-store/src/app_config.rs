use kroom_core::{BookingRules, Room};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    /// Without a database section the service runs on the in-memory store.
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub booking_rules: BookingRules,
    /// Upserted into the store at startup.
    #[serde(default)]
    pub rooms: Vec<Room>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }
fn default_true() -> bool { true }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // per-environment and local overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(environment())
            .build()?;

        s.try_deserialize()
    }
}

/// `KROOM_` followed by a `__`-separated key path, e.g. `KROOM_BOOKING_RULES__HOLD_SECONDS=600`.
fn environment() -> config::Environment {
    config::Environment::with_prefix("KROOM")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_minimal_toml() {
        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 8080

                [booking_rules]
                max_extensions = 4
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.server.port, 8080);
        assert!(cfg.database.is_none());
        assert_eq!(cfg.booking_rules.max_extensions, 4);
        assert_eq!(cfg.booking_rules.hold_seconds, 300);
        assert!(cfg.rooms.is_empty());
    }

    #[test]
    fn test_parses_seed_rooms() {
        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 8080

                [[rooms]]
                id = "6f1c3c1e-7a0b-4b7e-9d59-3c0a5f1f2a10"
                venue_id = "0b8f2f55-3f0e-4d0c-8c2e-5a4a3e0d9b21"
                organization_id = "c7d6e5f4-1a2b-4c3d-8e9f-a0b1c2d3e4f5"
                name = "Room 1"
                capacity = 6
                hourly_rate_cents = 4500
                currency = "USD"
                is_active = true
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.rooms.len(), 1);
        assert_eq!(cfg.rooms[0].hourly_rate_cents, 4500);
    }

    #[test]
    fn test_environment_overrides_nested_keys() {
        let vars: config::Map<String, String> = [
            ("KROOM_BOOKING_RULES__HOLD_SECONDS", "600"),
            ("KROOM_SERVER__PORT", "9090"),
            ("OTHER_BOOKING_RULES__MAX_EXTENSIONS", "9"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 8080
                "#,
                config::FileFormat::Toml,
            ))
            .add_source(environment().source(Some(vars)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.booking_rules.hold_seconds, 600);
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.booking_rules.max_extensions, 2);
    }

    #[test]
    fn test_database_defaults() {
        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 8080

                [database]
                url = "postgres://localhost/kroom"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let db = cfg.database.unwrap();
        assert_eq!(db.max_connections, 5);
        assert_eq!(db.acquire_timeout_seconds, 3);
        assert!(db.run_migrations);
    }
}
