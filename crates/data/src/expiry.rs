//! Expiry normalization shared by the market-data providers.
//!
//! Accepted forms:
//! - relative: `<n>D`, `<n>W`, `<n>M` (30 days), `<n>Y` (365 days)
//! - date: `YYYY-MM-DD` (midnight UTC)
//! - naive timestamp: `YYYY-MM-DDTHH:MM:SS` (UTC)
//! - RFC 3339: `2024-05-24T08:00:00Z`

use crate::error::{DataError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use std::collections::BTreeMap;

/// Parses one expiry relative to `now`.
///
/// # Errors
/// Returns [`DataError::UnsupportedExpiry`] if no accepted form matches.
pub fn parse_expiry(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    let unsupported = || DataError::UnsupportedExpiry(raw.to_string());

    if let Some(unit) = trimmed.chars().last().filter(char::is_ascii_alphabetic) {
        let amount = &trimmed[..trimmed.len() - unit.len_utf8()];
        if !amount.is_empty() && amount.chars().all(|c| c.is_ascii_digit()) {
            let amount: i64 = amount.parse().map_err(|_| unsupported())?;
            let days = match unit.to_ascii_uppercase() {
                'D' => amount,
                'W' => amount * 7,
                'M' => amount * 30,
                'Y' => amount * 365,
                _ => return Err(unsupported()),
            };
            return Ok(now + Duration::days(days));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(unsupported);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| unsupported())
}

/// Parses and sorts requested expiries, dropping unsupported ones with a warning.
#[must_use]
pub fn normalize_expiries(expiries: &[String], now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut normalized: Vec<DateTime<Utc>> = expiries
        .iter()
        .filter_map(|raw| match parse_expiry(raw, now) {
            Ok(expiry) => Some(expiry),
            Err(e) => {
                tracing::warn!(expiry = %raw, error = %e, "Dropping unresolvable expiry");
                None
            }
        })
        .collect();
    normalized.sort();
    normalized
}

/// Selects the exact expiry group, or the one closest in time.
#[must_use]
pub fn select_nearest<T>(
    groups: &BTreeMap<DateTime<Utc>, T>,
    requested: DateTime<Utc>,
) -> Option<(DateTime<Utc>, &T)> {
    if let Some(group) = groups.get(&requested) {
        return Some((requested, group));
    }
    groups
        .iter()
        .min_by_key(|(expiry, _)| (**expiry - requested).num_milliseconds().unsigned_abs())
        .map(|(expiry, group)| (*expiry, group))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    // ============================================
    // parse_expiry
    // ============================================

    #[test]
    fn relative_units() {
        assert_eq!(parse_expiry("7D", now()).unwrap(), now() + Duration::days(7));
        assert_eq!(parse_expiry("2W", now()).unwrap(), now() + Duration::days(14));
        assert_eq!(parse_expiry("1M", now()).unwrap(), now() + Duration::days(30));
        assert_eq!(parse_expiry("1Y", now()).unwrap(), now() + Duration::days(365));
        assert_eq!(parse_expiry(" 3d ", now()).unwrap(), now() + Duration::days(3));
    }

    #[test]
    fn absolute_forms() {
        let date = Utc.with_ymd_and_hms(2024, 5, 24, 0, 0, 0).unwrap();
        let stamp = Utc.with_ymd_and_hms(2024, 5, 24, 8, 0, 0).unwrap();

        assert_eq!(parse_expiry("2024-05-24", now()).unwrap(), date);
        assert_eq!(parse_expiry("2024-05-24T08:00:00", now()).unwrap(), stamp);
        assert_eq!(parse_expiry("2024-05-24T08:00:00Z", now()).unwrap(), stamp);
        assert_eq!(parse_expiry("2024-05-24T10:00:00+02:00", now()).unwrap(), stamp);
    }

    #[test]
    fn unsupported_forms() {
        for raw in ["", "D", "7X", "next friday", "24MAY24"] {
            assert!(
                matches!(parse_expiry(raw, now()), Err(DataError::UnsupportedExpiry(_))),
                "{raw}"
            );
        }
    }

    // ============================================
    // normalize_expiries / select_nearest
    // ============================================

    #[test]
    fn normalize_sorts_and_drops_invalid() {
        let raw = vec!["30D".to_string(), "bogus".to_string(), "7D".to_string()];
        let normalized = normalize_expiries(&raw, now());

        assert_eq!(
            normalized,
            vec![now() + Duration::days(7), now() + Duration::days(30)]
        );
    }

    #[test]
    fn nearest_prefers_exact_match() {
        let a = Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 5, 17, 8, 0, 0).unwrap();
        let groups = BTreeMap::from([(a, "a"), (b, "b")]);

        assert_eq!(select_nearest(&groups, b), Some((b, &"b")));
        let near_a = Utc.with_ymd_and_hms(2024, 5, 12, 0, 0, 0).unwrap();
        assert_eq!(select_nearest(&groups, near_a), Some((a, &"a")));
    }

    #[test]
    fn nearest_of_nothing_is_none() {
        let groups: BTreeMap<DateTime<Utc>, ()> = BTreeMap::new();
        assert!(select_nearest(&groups, now()).is_none());
    }
}
