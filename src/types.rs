//! Shared value types: timestamps, prices and negotiating sides
use super::error::MarketError;
use chrono::{DateTime, TimeZone, Utc};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    /// Panics on an out-of-range calendar value. Intended for fixtures.
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

// Utc itself is not Ord, so a derive would not apply
impl PartialOrd for TimeStamp<Utc> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeStamp<Utc> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for TimeStamp<Utc> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
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

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// A strictly positive amount in the smallest currency unit.
#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Price(#[n(0)] u64);

impl Price {
    pub fn new(amount: u64) -> Result<Self, MarketError> {
        if amount == 0 {
            return Err(MarketError::InvalidInput("price must be positive".into()));
        }
        Ok(Self(amount))
    }
    pub fn amount(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The party a negotiation entry originates from.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    #[n(0)]
    Buyer,
    #[n(1)]
    Seller,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buyer => Side::Seller,
            Side::Seller => Side::Buyer,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buyer => "buyer",
            Side::Seller => "seller",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn timestamps_sort_chronologically() {
        let noon = TimeStamp::new_with(2025, 6, 1, 12, 0, 0);
        let morning = TimeStamp::new_with(2025, 6, 1, 8, 30, 0);
        let evening = TimeStamp::new_with(2025, 6, 1, 19, 45, 0);

        let mut stamps = vec![noon.clone(), evening.clone(), morning.clone()];
        stamps.sort();

        assert_eq!(stamps, vec![morning.clone(), noon.clone(), evening]);
        assert!(morning < noon);
        assert_eq!(noon.cmp(&noon.clone()), Ordering::Equal);
    }

    #[test]
    fn price_rejects_zero() {
        assert!(matches!(Price::new(0), Err(MarketError::InvalidInput(_))));
        assert_eq!(Price::new(150).unwrap().amount(), 150);
    }

    #[test]
    fn sides_are_opposites() {
        assert_eq!(Side::Buyer.opposite(), Side::Seller);
        assert_eq!(Side::Seller.opposite(), Side::Buyer);
        assert_eq!(Side::Buyer.to_string(), "buyer");
    }
}
