//! Token persistence: storage slot, migration, collection and expiry

pub mod expiry;
pub mod migrate;
pub mod storage;
pub mod store;

pub use expiry::{remaining, Expiry, ExpiryError};
pub use storage::{FileStorage, StorageError};
pub use store::TokenStore;

#[cfg(test)]
pub use storage::MemoryStorage;
