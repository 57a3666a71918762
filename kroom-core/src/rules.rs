use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Hold and sweep policy. Loaded from configuration, optionally overridden from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRules {
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u64,
    #[serde(default = "default_extension_seconds")]
    pub extension_seconds: u64,
    #[serde(default = "default_max_extensions")]
    pub max_extensions: u32,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,
}

/// Upper bound for any single hold or extension.
pub const MAX_HOLD_SECONDS: u64 = 24 * 60 * 60;

fn default_hold_seconds() -> u64 { 300 }
fn default_extension_seconds() -> u64 { 300 }
fn default_max_extensions() -> u32 { 2 }
fn default_sweep_interval_seconds() -> u64 { 60 }
fn default_sweep_batch_size() -> usize { 500 }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            hold_seconds: default_hold_seconds(),
            extension_seconds: default_extension_seconds(),
            max_extensions: default_max_extensions(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            sweep_batch_size: default_sweep_batch_size(),
        }
    }
}

/// Convert a configured or requested number of seconds into a hold duration.
pub fn hold_duration(seconds: u64, what: &str) -> Result<Duration, crate::BookingError> {
    if seconds == 0 || seconds > MAX_HOLD_SECONDS {
        return Err(crate::BookingError::Validation(format!(
            "{} must be between 1 and {} seconds, got {}",
            what, MAX_HOLD_SECONDS, seconds
        )));
    }
    Ok(Duration::seconds(seconds as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let rules: BookingRules = serde_json::from_str(r#"{"max_extensions": 5}"#).unwrap();
        assert_eq!(rules.max_extensions, 5);
        assert_eq!(rules.hold_seconds, 300);
        assert_eq!(rules.sweep_batch_size, 500);
    }

    #[test]
    fn test_hold_duration_bounds() {
        assert!(hold_duration(0, "hold").is_err());
        assert!(hold_duration(MAX_HOLD_SECONDS + 1, "hold").is_err());
        assert_eq!(hold_duration(300, "hold").unwrap(), Duration::seconds(300));
    }
}
