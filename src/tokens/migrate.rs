//! Repair of raw persisted token data into valid records
//!
//! Stored data may come from older versions of the client or be hand-edited,
//! so nothing about its shape is assumed. Every load runs the collection
//! through [`normalize`], which fills in missing fields with defaults. The
//! output of `normalize` is a fixed point: running it again changes nothing.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::storage::{save_records, Storage, StorageError};
use crate::models::{format_timestamp, parse_timestamp, TokenId, TokenRecord, DEFAULT_EXPIRES_IN};

/// Hands out ids derived from the clock, skipping any already in use.
///
/// Ids are epoch milliseconds, bumped past the largest known id so two
/// tokens created within the same millisecond still get distinct ids.
#[derive(Debug)]
pub struct IdAllocator {
    next: TokenId,
}

impl IdAllocator {
    pub fn new(now: DateTime<Utc>, existing: impl IntoIterator<Item = TokenId>) -> Self {
        let floor = existing
            .into_iter()
            .max()
            .map_or(TokenId::MIN, |max| max.saturating_add(1));
        Self {
            next: now.timestamp_millis().max(floor),
        }
    }

    pub fn allocate(&mut self) -> TokenId {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Normalize a raw serialized collection into valid records.
///
/// `None` (nothing stored yet) is an empty collection. Input that is not a
/// JSON array of objects is rejected as a whole.
pub fn normalize(raw: Option<&str>, now: DateTime<Utc>) -> Result<Vec<TokenRecord>, StorageError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let value: Value = serde_json::from_str(raw)?;
    let entries = match value {
        Value::Array(entries) => entries,
        other => {
            return Err(StorageError::Shape(format!(
                "expected an array of tokens, found {}",
                kind_of(&other)
            )))
        }
    };

    let objects = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            entry.as_object().ok_or_else(|| {
                StorageError::Shape(format!("entry {} is {}, not an object", i, kind_of(entry)))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let known_ids: HashSet<TokenId> = objects
        .iter()
        .filter_map(|obj| obj.get("id").and_then(integer))
        .collect();
    let mut ids = IdAllocator::new(now, known_ids.iter().copied());

    Ok(objects
        .into_iter()
        .map(|obj| normalize_entry(obj, now, &mut ids))
        .collect())
}

fn normalize_entry(obj: &Map<String, Value>, now: DateTime<Utc>, ids: &mut IdAllocator) -> TokenRecord {
    let id = obj
        .get("id")
        .and_then(integer)
        .unwrap_or_else(|| ids.allocate());

    let string = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    };

    let expires_in = obj
        .get("expiresIn")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.trunc() as i64)))
        .unwrap_or(DEFAULT_EXPIRES_IN);

    let created_at = obj
        .get("createdAt")
        .and_then(Value::as_str)
        .filter(|s| parse_timestamp(s).is_some())
        .map(str::to_string)
        .unwrap_or_else(|| format_timestamp(now));

    TokenRecord {
        id,
        access_token: string("accessToken"),
        refresh_token: string("refreshToken"),
        expires_in,
        created_at,
    }
}

/// Integral JSON number, accepting floats with no fractional part.
fn integer(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| {
        v.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Load, normalize and write back the stored collection.
///
/// Storage that cannot be read or decoded is discarded: an empty collection
/// is persisted in its place and returned.
pub fn migrate(storage: &dyn Storage, now: DateTime<Utc>) -> Vec<TokenRecord> {
    let loaded = storage
        .load()
        .and_then(|raw| normalize(raw.as_deref(), now));

    match loaded {
        Ok(records) => {
            if let Err(e) = save_records(storage, &records) {
                tracing::warn!("Failed to write migrated tokens: {}", e);
            }
            tracing::debug!("Loaded {} stored token(s)", records.len());
            records
        }
        Err(e) => {
            tracing::error!("Discarding unreadable token storage: {}", e);
            if let Err(e) = storage.save("[]") {
                tracing::warn!("Failed to reset token storage: {}", e);
            }
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::storage::MemoryStorage;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn round_trip(records: &[TokenRecord]) -> String {
        serde_json::to_string(records).unwrap()
    }

    #[test]
    fn test_complete_records_are_kept() {
        let raw = r#"[{"id":5,"accessToken":"a","refreshToken":"r","expiresIn":120,"createdAt":"2024-04-30T08:00:00.000Z"}]"#;
        let records = normalize(Some(raw), now()).unwrap();
        assert_eq!(
            records,
            vec![TokenRecord {
                id: 5,
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                expires_in: 120,
                created_at: "2024-04-30T08:00:00.000Z".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let records = normalize(Some(r#"[{}]"#), now()).unwrap();
        let record = &records[0];
        assert_eq!(record.id, now().timestamp_millis());
        assert_eq!(record.access_token, "");
        assert_eq!(record.refresh_token, "");
        assert_eq!(record.expires_in, 3600);
        assert_eq!(record.created(), Some(now()));
    }

    #[test]
    fn test_invalid_values_get_defaults() {
        let raw = r#"[{"id":"x","accessToken":42,"expiresIn":"soon","createdAt":"not a date"}]"#;
        let record = &normalize(Some(raw), now()).unwrap()[0];
        assert_eq!(record.id, now().timestamp_millis());
        assert_eq!(record.access_token, "");
        assert_eq!(record.expires_in, 3600);
        assert_eq!(record.created_at, format_timestamp(now()));
    }

    #[test]
    fn test_fractional_expiry_truncated() {
        let raw = r#"[{"id":1,"expiresIn":90.75}]"#;
        assert_eq!(normalize(Some(raw), now()).unwrap()[0].expires_in, 90);
    }

    #[test]
    fn test_generated_ids_do_not_collide() {
        let taken = now().timestamp_millis();
        let raw = format!(r#"[{{}}, {{"id":{}}}, {{}}]"#, taken);
        let records = normalize(Some(&raw), now()).unwrap();
        let ids: HashSet<_> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(records[1].id, taken);
    }

    #[test]
    fn test_iso_8601_created_at_kept() {
        for created_at in [
            "2024-05-01T10:00:00",
            "2024-05-01",
            "2024-05-01T10:00:00.000+0000",
            "2024-05-01 10:00:00",
        ] {
            let raw = format!(r#"[{{"id":1,"createdAt":"{}"}}]"#, created_at);
            let record = &normalize(Some(&raw), now()).unwrap()[0];
            assert_eq!(record.created_at, created_at);
            assert!(record.created().unwrap() < now(), "{}", created_at);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let cases = [
            r#"[
                {"id": 3, "accessToken": "a"},
                {"refreshToken": "r", "expiresIn": 12.5, "createdAt": "2024-01-01T00:00:00+01:00"},
                {"id": 4.0, "createdAt": "garbage", "expiresIn": null}
            ]"#,
            r#"[{"id": 7, "accessToken": "a"}, {"id": 7, "accessToken": "b"}, {}]"#,
            r#"[{"id": 1e300, "expiresIn": 1e300}, {"id": -2, "expiresIn": -1e300}]"#,
            r#"[{"id": 1, "expiresIn": -60}, {"id": 2, "expiresIn": 0}]"#,
            r#"[
                {"id": 1, "createdAt": "2024-05-01T10:00:00"},
                {"id": 2, "createdAt": "2024-05-01"},
                {"id": 3, "createdAt": "2024-05-01T10:00:00.000+0000"},
                {"id": 4, "createdAt": ""}
            ]"#,
            "[]",
        ];
        for raw in cases {
            let once = normalize(Some(raw), now()).unwrap();
            let later = now() + Duration::hours(5);
            let twice = normalize(Some(&round_trip(&once)), later).unwrap();
            assert_eq!(once, twice, "{}", raw);
        }
    }

    #[test]
    fn test_duplicate_ids_are_kept() {
        let raw = r#"[{"id": 7, "accessToken": "a"}, {"id": 7, "accessToken": "b"}]"#;
        let records = normalize(Some(raw), now()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.id == 7));
    }

    #[test]
    fn test_out_of_range_numbers() {
        let raw = r#"[{"id": 1e300, "expiresIn": 1e300}, {"id": 2, "expiresIn": -60}]"#;
        let records = normalize(Some(raw), now()).unwrap();
        assert_eq!(records[0].id, now().timestamp_millis());
        assert_eq!(records[0].expires_in, i64::MAX);
        assert_eq!(records[1].expires_in, -60);
    }

    #[test]
    fn test_non_array_rejected() {
        assert!(matches!(
            normalize(Some(r#"{"id":1}"#), now()),
            Err(StorageError::Shape(_))
        ));
        assert!(matches!(
            normalize(Some("[1, null]"), now()),
            Err(StorageError::Shape(_))
        ));
        assert!(matches!(
            normalize(Some("[{"), now()),
            Err(StorageError::Malformed(_))
        ));
    }

    #[test]
    fn test_migrate_persists_normalized_collection() {
        let storage = MemoryStorage::with_contents(r#"[{"id":1,"accessToken":"a"}]"#);
        let records = migrate(&storage, now());
        assert_eq!(records.len(), 1);
        assert_eq!(storage.contents(), Some(round_trip(&records)));
    }

    #[test]
    fn test_migrate_malformed_storage_resets_to_empty() {
        let storage = MemoryStorage::with_contents(r#""oops""#);
        assert!(migrate(&storage, now()).is_empty());
        assert_eq!(storage.contents().as_deref(), Some("[]"));
    }

    #[test]
    fn test_migrate_first_run() {
        let storage = MemoryStorage::new();
        assert!(migrate(&storage, now()).is_empty());
        assert_eq!(storage.contents().as_deref(), Some("[]"));
    }

    #[test]
    fn test_id_allocator_skips_existing() {
        let mut ids = IdAllocator::new(now(), [now().timestamp_millis() + 10]);
        assert_eq!(ids.allocate(), now().timestamp_millis() + 11);
        assert_eq!(ids.allocate(), now().timestamp_millis() + 12);

        let mut ids = IdAllocator::new(now(), [1, 2]);
        assert_eq!(ids.allocate(), now().timestamp_millis());
    }
}
