//! The persisted token collection

use chrono::{DateTime, Utc};

use super::migrate::{migrate, IdAllocator};
use super::storage::{save_records, Storage, StorageError};
use crate::models::{format_timestamp, TokenGrant, TokenId, TokenRecord};

/// Owns the token collection and mirrors every change to storage.
pub struct TokenStore {
    storage: Box<dyn Storage>,
    records: Vec<TokenRecord>,
}

impl TokenStore {
    /// Open the store, migrating whatever the storage currently holds.
    pub fn load(storage: Box<dyn Storage>, now: DateTime<Utc>) -> Self {
        let records = migrate(storage.as_ref(), now);
        Self { storage, records }
    }

    pub fn list(&self) -> &[TokenRecord] {
        &self.records
    }

    pub fn get(&self, id: TokenId) -> Option<&TokenRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Replace the record with the same id, or append it.
    pub fn upsert(&mut self, record: TokenRecord) -> Result<(), StorageError> {
        let mut records = self.records.clone();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.commit(records)
    }

    /// Remove the record with `id`. Unknown ids are ignored.
    pub fn delete(&mut self, id: TokenId) -> Result<(), StorageError> {
        let records: Vec<TokenRecord> =
            self.records.iter().filter(|r| r.id != id).cloned().collect();
        if records.len() == self.records.len() {
            tracing::debug!("Token {} not found, nothing to delete", id);
        }
        self.commit(records)
    }

    /// Fresh id for a record created at `now`.
    pub fn next_id(&self, now: DateTime<Utc>) -> TokenId {
        IdAllocator::new(now, self.records.iter().map(|r| r.id)).allocate()
    }

    /// Store a newly issued token pair as a new record.
    pub fn insert_grant(
        &mut self,
        grant: TokenGrant,
        now: DateTime<Utc>,
    ) -> Result<TokenRecord, StorageError> {
        let record = TokenRecord {
            id: self.next_id(now),
            expires_in: grant.expires_in(),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.unwrap_or_default(),
            created_at: format_timestamp(now),
        };
        self.upsert(record.clone())?;
        Ok(record)
    }

    /// Write `records` to storage, then adopt them. A failed save leaves memory untouched.
    fn commit(&mut self, records: Vec<TokenRecord>) -> Result<(), StorageError> {
        save_records(self.storage.as_ref(), &records)?;
        self.records = records;
        Ok(())
    }
}
