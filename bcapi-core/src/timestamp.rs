//! `lastModified` values as the storage API writes them.
//!
//! Most responses carry RFC 3339 strings; older endpoints omit the offset
//! (treated as UTC) or fall back to HTTP dates.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

pub fn parse(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }
    if let Ok(value) = PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT) {
        return Some(value.assume_utc());
    }
    httpdate::parse_http_date(raw)
        .ok()
        .map(OffsetDateTime::from)
}

pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(value) => {
            let formatted = value
                .format(&Rfc3339)
                .map_err(<S::Error as serde::ser::Error>::custom)?;
            serializer.serialize_some(&formatted)
        }
        None => serializer.serialize_none(),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("unrecognized timestamp {raw:?}"))),
    }
}
