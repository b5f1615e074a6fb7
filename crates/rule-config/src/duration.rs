//! `HH:MM:SS` durations in configuration files

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Serde adapter for `Option<Duration>` written as `HH:MM:SS`, `MM:SS` or `SS`
pub mod option_duration_serde {
    use super::*;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_str(&format_duration(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let parts = s
        .trim()
        .split(':')
        .map(|part| part.parse::<u64>().map_err(|_| format!("invalid duration '{}'", s)))
        .collect::<Result<Vec<_>, _>>()?;

    let secs = match parts.as_slice() {
        [secs] => *secs,
        [mins, secs] => mins * 60 + secs,
        [hours, mins, secs] => hours * 3600 + mins * 60 + secs,
        _ => return Err(format!("invalid duration format '{}'", s)),
    };
    Ok(Duration::from_secs(secs))
}
