//! Persistence slot for the serialized token collection

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::models::TokenRecord;

/// Errors reading, writing or decoding the persisted collection.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored tokens are not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("stored tokens have an unexpected shape: {0}")]
    Shape(String),
}

/// A single named slot holding the JSON-encoded token collection.
///
/// `save` replaces the whole slot; readers never observe a partial write.
pub trait Storage: Send {
    /// Raw contents of the slot, or `None` if nothing has been saved yet.
    fn load(&self) -> Result<Option<String>, StorageError>;
    fn save(&self, contents: &str) -> Result<(), StorageError>;
}

/// Serialize the full collection and replace the slot with it.
pub fn save_records(storage: &dyn Storage, records: &[TokenRecord]) -> Result<(), StorageError> {
    let json = serde_json::to_string(records)?;
    storage.save(&json)
}

/// Slot backed by a JSON file.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a unique temp file next to the target, then rename over it.
    fn save(&self, contents: &str) -> Result<(), StorageError> {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        fs::write(&tmp_path, contents)?;

        // Tokens are secrets: owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
pub use memory::MemoryStorage;

#[cfg(test)]
mod memory {
    use std::sync::{Arc, Mutex};

    use super::{Storage, StorageError};

    /// In-memory slot. Clones share the same contents, so a test can keep a
    /// handle and inspect what the store persisted.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryStorage {
        slot: Arc<Mutex<Option<String>>>,
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_contents(contents: impl Into<String>) -> Self {
            Self {
                slot: Arc::new(Mutex::new(Some(contents.into()))),
            }
        }

        pub fn contents(&self) -> Option<String> {
            self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    impl Storage for MemoryStorage {
        fn load(&self) -> Result<Option<String>, StorageError> {
            Ok(self.contents())
        }

        fn save(&self, contents: &str) -> Result<(), StorageError> {
            let mut guard = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            *guard = Some(contents.to_string());
            Ok(())
        }
    }
}
