//! Text encoding of timestamps.
//!
//! Timestamps are stored as RFC 3339 with a fixed microsecond fraction and a
//! `Z` suffix, so that ordering the text column orders by time.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

pub(crate) fn encode(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time at the precision the store persists.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Parse a stored timestamp inside a row mapper.
pub(crate) fn decode(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion(idx, e))
}

/// Wrap a decoding failure of column `idx` as a rusqlite conversion error.
pub(crate) fn conversion<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encoding_is_fixed_width_and_sortable() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::microseconds(10);
        let (ea, eb) = (encode(&a), encode(&b));
        assert_eq!(ea.len(), eb.len());
        assert!(ea < eb);
        assert_eq!(decode(0, &eb).unwrap(), b);
    }
}
