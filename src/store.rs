//! Persistent token slot.
//!
//! DESIGN
//! ======
//! The persisted `TokenSet` is a single mutable slot (the `"tokens"` key)
//! written as JSON. Only `Session` reads or writes it. `FileTokenStore` is
//! the durable backend; `MemoryTokenStore` keeps the same JSON encoding
//! in memory for embedding and tests.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::types::TokenSet;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("token storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("token JSON encode/decode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait TokenStore: Send + Sync {
    /// Read the persisted set. `Ok(None)` when the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read or does not decode.
    fn load(&self) -> Result<Option<TokenSet>, StoreError>;

    /// Overwrite the slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    fn save(&self, tokens: &TokenSet) -> Result<(), StoreError>;

    /// Empty the slot. Clearing an empty slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot exists but cannot be removed.
    fn clear(&self) -> Result<(), StoreError>;
}

// =============================================================================
// FILE STORE
// =============================================================================

#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenSet>, StoreError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // Bytes that are not UTF-8 surface as a decode error, not io.
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    fn save(&self, tokens: &TokenSet) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string(tokens)?;
        std::fs::write(&self.path, data)?;
        tracing::debug!(path = %self.path.display(), "tokens persisted");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "tokens removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with raw JSON already in the slot, as if written by an earlier run.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { slot: Mutex::new(Some(raw.into())) }
    }

    /// The raw JSON currently stored.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenSet>, StoreError> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, tokens: &TokenSet) -> Result<(), StoreError> {
        let data = serde_json::to_string(tokens)?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
