//! Persisted token record

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Validity assumed when neither storage nor the server provides one (1 hour).
pub const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Identifier of a stored token. Assigned once at creation.
pub type TokenId = i64;

/// One stored OAuth2 access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub id: TokenId,
    pub access_token: String,
    pub refresh_token: String,
    /// Validity in seconds, counted from `created_at`.
    pub expires_in: i64,
    /// ISO-8601 timestamp, see [`parse_timestamp`].
    pub created_at: String,
}

impl TokenRecord {
    /// Parsed creation instant, if `created_at` is a valid timestamp.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    /// Creation time in the local timezone, for display.
    pub fn created_local(&self) -> String {
        match self.created() {
            Some(at) => at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            None => "Invalid date".to_string(),
        }
    }
}

/// Format an instant the way records store it (millisecond precision, `Z` suffix).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored ISO-8601 timestamp.
///
/// Accepts RFC 3339, offsets written without a colon (`+0000`), and local
/// date-times or bare dates, which are read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
