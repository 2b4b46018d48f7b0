//! Identity codec and document timestamps
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use uuid7::uuid7;

use crate::error::EngineError;

/// Length in bytes of a stored reference.
pub const REF_LEN: usize = 16;

/// Opaque store reference. Transported as 32 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ref([u8; REF_LEN]);

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct TimeStamp(DateTime<Utc>);

impl Ref {
    /// New reference. uuid7 keeps raw byte order aligned with creation order.
    pub fn generate() -> Self {
        Self(*uuid7().as_bytes())
    }

    /// Decode the transport form, rejecting anything that is not exactly 32 hex digits.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let trimmed = raw.trim();
        if trimmed.len() != REF_LEN * 2 {
            return Err(EngineError::InvalidIdentifier(raw.to_string()));
        }

        let mut bytes = [0u8; REF_LEN];
        hex::decode_to_slice(trimmed, &mut bytes)
            .map_err(|_| EngineError::InvalidIdentifier(raw.to_string()))?;

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; REF_LEN] {
        &self.0
    }

    pub(crate) fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; REF_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// `self || other`, used as a compound index key.
    pub(crate) fn join(&self, other: &Ref) -> [u8; REF_LEN * 2] {
        let mut key = [0u8; REF_LEN * 2];
        key[..REF_LEN].copy_from_slice(&self.0);
        key[REF_LEN..].copy_from_slice(&other.0);
        key
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Ref {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ref::parse(s)
    }
}

impl TimeStamp {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp {
    fn default() -> Self {
        Self::new()
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(value: DateTime<Utc>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for Ref {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Ref {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let bytes = d.bytes()?;

        Ref::from_slice(bytes).ok_or(minicbor::decode::Error::message(
            "stored reference is not 16 bytes long",
        ))
    }
}

impl<C> minicbor::Encode<C> for TimeStamp {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_transport_form_is_lowercase_hex() {
        let original = Ref::generate();
        let raw = original.to_string();

        assert_eq!(raw.len(), 32);
        assert!(raw.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(Ref::parse(&raw).unwrap(), original);
    }

    #[test]
    fn ref_parse_ignores_case() {
        let original = Ref::generate();
        let upper = original.to_string().to_uppercase();

        assert_eq!(Ref::parse(&upper).unwrap(), original);
    }

    #[test]
    fn ref_parse_rejects_malformed_input() {
        let not_hex = "g".repeat(32);
        let too_long = "a".repeat(33);

        for raw in ["", "abc", "507f1f77bcf86cd799439011", not_hex.as_str(), too_long.as_str()] {
            assert!(
                matches!(Ref::parse(raw), Err(EngineError::InvalidIdentifier(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn generated_refs_follow_creation_order() {
        let first = Ref::generate();
        let second = Ref::generate();

        assert!(first < second);
    }

    #[test]
    fn ref_encoding() {
        let original = Ref::generate();

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: Ref = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: TimeStamp = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }
}
