use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const TIME_FMT: &str = "%H:%M";
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FMT).ok()
}

/// Accepts `HH:MM` and `HH:MM:SS`; seconds are dropped so slots compare at minute resolution.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, TIME_FMT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
        .and_then(|t| t.with_second(0))
}

pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).ok()
}

pub fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

pub fn fmt_time(t: &NaiveTime) -> String {
    t.format(TIME_FMT).to_string()
}

pub fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FMT).to_string()
}

/// Serde adapter for `HH:MM` times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::fmt_time(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time: {raw}")))
    }
}
