pub mod option;

use serde::{Deserialize, Deserializer, Serializer};
use time::{
	OffsetDateTime, PrimitiveDateTime,
	format_description::well_known::{Iso8601, Rfc3339},
};

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&formatted)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	parse(&raw).map_err(serde::de::Error::custom)
}

/// Parses RFC 3339, falling back to offset-less ISO 8601 read as UTC.
pub fn parse(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
	match OffsetDateTime::parse(raw, &Rfc3339) {
		Ok(value) => Ok(value),
		Err(_) => PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT).map(|value| value.assume_utc()),
	}
}
