//! Measurement records and the pieces that produce and hold them
//!
//! - Random walk trackers ([`signal`])
//! - Measurement assembly ([`generator`])
//! - Bounded FIFO buffer and identifier allocation ([`buffer`])

pub mod buffer;
pub mod generator;
pub mod signal;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reading of the four tracked signals
///
/// A field is `None` when the polarity or measurement mode excludes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasuredValue {
    pub pos_voltage: Option<i64>,
    pub pos_current: Option<i64>,
    pub neg_voltage: Option<i64>,
    pub neg_current: Option<i64>,
}

/// A timestamped group of one or two readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: u64,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub measured_values: Vec<MeasuredValue>,
}

/// ISO-8601 timestamps with millisecond precision and a `Z` suffix
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
