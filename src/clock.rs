//! `HH:MM` clock times, the wire format reminders use for times of day.

use crate::error::{AppError, AppResult};
use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;

static CLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap());

/// True when `s` looks like `H:MM` or `HH:MM`. Range is not checked.
pub fn is_clock_time(s: &str) -> bool {
    CLOCK_RE.is_match(s)
}

/// Parse `H:MM` / `HH:MM` into a time of day.
pub fn parse_clock(s: &str) -> AppResult<NaiveTime> {
    let caps = CLOCK_RE
        .captures(s.trim())
        .ok_or_else(|| AppError::validation(format!("Invalid time '{}', expected HH:MM", s)))?;

    let hour: u32 = caps[1]
        .parse()
        .map_err(|_| AppError::validation(format!("Invalid hour in '{}'", s)))?;
    let minute: u32 = caps[2]
        .parse()
        .map_err(|_| AppError::validation(format!("Invalid minute in '{}'", s)))?;

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| AppError::validation(format!("Time '{}' is out of range", s)))
}

pub fn format_clock(time: &NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Serde adapter for a single `HH:MM` field.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_clock(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_clock(&s).map_err(de::Error::custom)
    }
}

/// Serde adapter for an optional `HH:MM` field.
pub mod hhmm_opt {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.serialize_some(&super::format_clock(t)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| super::parse_clock(&s).map_err(de::Error::custom))
            .transpose()
    }
}

/// Serde adapter for a list of `HH:MM` times.
pub mod hhmm_vec {
    use chrono::NaiveTime;
    use serde::ser::SerializeSeq;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(times: &[NaiveTime], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(times.len()))?;
        for t in times {
            seq.serialize_element(&super::format_clock(t))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<NaiveTime>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| super::parse_clock(s).map_err(de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_digit_hour() {
        let t = parse_clock("9:05").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(9, 5, 0).unwrap());
        assert_eq!(format_clock(&t), "09:05");
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(parse_clock("24:00").is_err());
        assert!(parse_clock("12:60").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_clock("9h30").is_err());
        assert!(parse_clock("123:00").is_err());
        assert!(parse_clock("").is_err());
    }

    #[test]
    fn test_is_clock_time_ignores_range() {
        assert!(is_clock_time("99:99"));
        assert!(!is_clock_time("abc123"));
    }
}
