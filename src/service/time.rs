//! Conversions between store milliseconds and the calendar strings the API
//! speaks: `yyyy-MM-ddTHH:mm` instants, `yyyy-MM-dd` dates, `HH:mm` labels.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serializer};

use crate::model::Ms;

const MINUTE_FORMAT: &str = "%Y-%m-%dT%H:%M";
const SECOND_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn to_ms(dt: NaiveDateTime) -> Ms {
    dt.and_utc().timestamp_millis()
}

pub fn from_ms(ms: Ms) -> NaiveDateTime {
    DateTime::from_timestamp_millis(ms).unwrap_or_default().naive_utc()
}

pub fn day_start(date: NaiveDate) -> Ms {
    to_ms(date.and_time(NaiveTime::MIN))
}

pub fn format_instant(ms: Ms) -> String {
    from_ms(ms).format(MINUTE_FORMAT).to_string()
}

pub fn format_clock(ms: Ms) -> String {
    from_ms(ms).format("%H:%M").to_string()
}

/// Accepts minute precision, with or without trailing seconds.
pub fn parse_instant(raw: &str) -> Option<Ms> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, MINUTE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, SECOND_FORMAT))
        .ok()
        .map(to_ms)
}

/// `#[serde(with = "instant")]` for `Ms` fields.
pub mod instant {
    use super::*;

    pub fn serialize<S: Serializer>(ms: &Ms, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_instant(*ms))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Ms, D::Error> {
        let raw = String::deserialize(d)?;
        parse_instant(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("expected yyyy-MM-ddTHH:mm, got {raw}")))
    }
}

/// `#[serde(with = "instants")]` for `Vec<Ms>` fields.
pub mod instants {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Ms>, D::Error> {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|raw| {
                parse_instant(raw).ok_or_else(|| {
                    serde::de::Error::custom(format!("expected yyyy-MM-ddTHH:mm, got {raw}"))
                })
            })
            .collect()
    }
}

/// `#[serde(serialize_with = "clock")]` for `HH:mm` slot labels.
pub fn clock<S: Serializer>(ms: &Ms, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_clock(*ms))
}
