use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::format::parse_time;

pub const BOOKING_ADVANCE_DAYS: &str = "booking_advance_days";
pub const CANCELLATION_NOTICE_HOURS: &str = "cancellation_notice_hours";
pub const APPROVAL_CUTOFF: &str = "approval_cutoff";

const DEFAULT_BOOKING_ADVANCE_DAYS: i64 = 14;
const DEFAULT_CANCELLATION_NOTICE_HOURS: i64 = 12;

pub const MAX_BOOKING_ADVANCE_DAYS: i64 = 365;
pub const MAX_CANCELLATION_NOTICE_HOURS: i64 = 24 * 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSetting {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

/// The settings the booking engine reads on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingSettings {
    pub booking_advance_days: i64,
    pub cancellation_notice_hours: i64,
    pub approval_cutoff: NaiveTime,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            booking_advance_days: DEFAULT_BOOKING_ADVANCE_DAYS,
            cancellation_notice_hours: DEFAULT_CANCELLATION_NOTICE_HOURS,
            approval_cutoff: default_cutoff(),
        }
    }
}

fn default_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
}

impl BookingSettings {
    /// Build from raw key/value rows. Missing or unparsable values fall back to the
    /// defaults with a warning so that misconfiguration shows up in the logs.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let lookup = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        Self {
            booking_advance_days: bounded_or_default(
                BOOKING_ADVANCE_DAYS,
                lookup(BOOKING_ADVANCE_DAYS),
                DEFAULT_BOOKING_ADVANCE_DAYS,
                MAX_BOOKING_ADVANCE_DAYS,
            ),
            cancellation_notice_hours: bounded_or_default(
                CANCELLATION_NOTICE_HOURS,
                lookup(CANCELLATION_NOTICE_HOURS),
                DEFAULT_CANCELLATION_NOTICE_HOURS,
                MAX_CANCELLATION_NOTICE_HOURS,
            ),
            approval_cutoff: match lookup(APPROVAL_CUTOFF) {
                Some(raw) => parse_time(raw).unwrap_or_else(|| {
                    tracing::warn!(key = APPROVAL_CUTOFF, value = %raw, "unparsable setting, using default");
                    default_cutoff()
                }),
                None => {
                    tracing::warn!(key = APPROVAL_CUTOFF, "setting missing, using default");
                    default_cutoff()
                }
            },
        }
    }

    /// Validate a value an administrator wants to store for a known key.
    pub fn validate_value(key: &str, value: &str) -> Result<(), String> {
        match key {
            BOOKING_ADVANCE_DAYS => in_range(key, value, MAX_BOOKING_ADVANCE_DAYS),
            CANCELLATION_NOTICE_HOURS => in_range(key, value, MAX_CANCELLATION_NOTICE_HOURS),
            APPROVAL_CUTOFF => parse_time(value)
                .map(|_| ())
                .ok_or_else(|| format!("{key} must be a time in HH:MM format")),
            _ => Err(format!("unknown setting: {key}")),
        }
    }
}

fn in_range(key: &str, value: &str, max: i64) -> Result<(), String> {
    match value.trim().parse::<i64>() {
        Ok(n) if (0..=max).contains(&n) => Ok(()),
        _ => Err(format!("{key} must be an integer between 0 and {max}")),
    }
}

fn bounded_or_default(key: &str, raw: Option<&str>, default: i64, max: i64) -> i64 {
    let Some(raw) = raw else {
        tracing::warn!(key, default, "setting missing, using default");
        return default;
    };
    match raw.trim().parse::<i64>() {
        Ok(n) if (0..=max).contains(&n) => n,
        _ => {
            tracing::warn!(key, value = %raw, default, "unparsable setting, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parses_values() {
        let s = BookingSettings::from_pairs(&pairs(&[
            ("booking_advance_days", "30"),
            ("cancellation_notice_hours", " 24 "),
            ("approval_cutoff", "10:30"),
        ]));
        assert_eq!(s.booking_advance_days, 30);
        assert_eq!(s.cancellation_notice_hours, 24);
        assert_eq!(s.approval_cutoff, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    }

    #[test]
    fn test_garbage_falls_back() {
        let s = BookingSettings::from_pairs(&pairs(&[
            ("booking_advance_days", "two weeks"),
            ("cancellation_notice_hours", "-3"),
            ("approval_cutoff", "noon"),
        ]));
        assert_eq!(s, BookingSettings::default());
    }

    #[test]
    fn test_missing_falls_back() {
        assert_eq!(BookingSettings::from_pairs(&[]), BookingSettings::default());
    }

    #[test]
    fn test_validate_value() {
        assert!(BookingSettings::validate_value("booking_advance_days", "7").is_ok());
        assert!(BookingSettings::validate_value("booking_advance_days", "x").is_err());
        assert!(BookingSettings::validate_value("approval_cutoff", "11:00").is_ok());
        assert!(BookingSettings::validate_value("theme", "dark").is_err());
    }

    #[test]
    fn test_huge_values_rejected_and_ignored() {
        assert!(BookingSettings::validate_value("cancellation_notice_hours", &i64::MAX.to_string()).is_err());
        assert!(BookingSettings::validate_value("booking_advance_days", "100000000").is_err());
        assert!(BookingSettings::validate_value("booking_advance_days", "365").is_ok());

        // Rows written before the bounds existed fall back to the defaults.
        let s = BookingSettings::from_pairs(&pairs(&[
            ("booking_advance_days", "100000000"),
            ("cancellation_notice_hours", &i64::MAX.to_string()),
            ("approval_cutoff", "12:00"),
        ]));
        assert_eq!(s, BookingSettings::default());
    }
}
