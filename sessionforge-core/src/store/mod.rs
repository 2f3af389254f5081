//! Scoped, expiry-aware credential cache.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`CacheBackend`] - Trait for raw cache storage backends
//! - [`MemoryStore`] - In-process backend
//! - [`FileStore`] - Per-user runtime-directory backend shared between processes
//! - [`CredentialStore`] - Typed, expiry-enforcing front end used by provisioners
//! - [`create_store`] - Helper to select a backend based on availability
//!
//! # Failure Semantics
//!
//! Backends report failures as [`StoreError`]. [`CredentialStore`] never does:
//! an unreadable entry is a cache miss and a failed write is logged and dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use sessionforge_core::{CredentialStore, ItemScope};
//!
//! let store = CredentialStore::in_memory();
//! let item = ItemScope::new("aws-prod");
//!
//! store.put(&item, "sts", &"value", expires_at).await;
//! let cached: Option<String> = store.get(&item, "sts").await;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::clock::{Clock, SystemClock};
use crate::model::ItemScope;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value.
/// The buffer is wiped when the secret is dropped.
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&String> for Secret {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

/// Error type for cache backend operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// A cache directory could be tampered with by another user.
    #[error("refusing to use {}: {reason}", .path.display())]
    InsecureDirectory { path: PathBuf, reason: String },

    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A raw cache entry as persisted by a backend.
///
/// `value` holds the JSON encoding of the cached object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Secret,
    pub expires_at: DateTime<Utc>,
}

/// Abstraction over cache storage backends.
///
/// Implementations only move bytes. Expiry and failure collapsing are done
/// by [`CredentialStore`].
///
/// A `load` racing a `save` for the same key must observe either the old or
/// the new entry in full.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Load the entry stored under `key` in `scope`.
    ///
    /// Returns `Ok(None)` if there is no entry.
    async fn load(&self, scope: &ItemScope, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Store an entry, replacing any previous entry for the same key.
    async fn save(&self, scope: &ItemScope, key: &str, entry: &CacheEntry)
        -> Result<(), StoreError>;
}

/// Typed, expiry-enforcing cache handed to provisioners.
///
/// Cloning is cheap; clones share the same backend.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    /// Create a store over the given backend using the system clock.
    pub fn new(backend: impl CacheBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a store over a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Replace the time source used for expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The current time as seen by this store.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Look up `key` in `scope`.
    ///
    /// Returns `None` if the entry is absent, expired, or unreadable.
    pub async fn get<T: DeserializeOwned>(&self, scope: &ItemScope, key: &str) -> Option<T> {
        let entry = match self.backend.load(scope, key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::trace!(item = %scope, key, "cache entry absent");
                return None;
            }
            Err(e) => {
                tracing::warn!(item = %scope, key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        if self.now() >= entry.expires_at {
            tracing::debug!(item = %scope, key, expires_at = %entry.expires_at, "cache entry expired");
            return None;
        }

        match serde_json::from_str(entry.value.expose()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(item = %scope, key, error = %e, "cache entry undecodable, treating as miss");
                None
            }
        }
    }

    /// Store `value` under `key` in `scope` until `expires_at`.
    ///
    /// Failures are logged and otherwise ignored.
    pub async fn put<T: Serialize>(
        &self,
        scope: &ItemScope,
        key: &str,
        value: &T,
        expires_at: DateTime<Utc>,
    ) {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(item = %scope, key, error = %e, "failed to encode cache entry");
                return;
            }
        };

        let entry = CacheEntry {
            value: Secret::new(encoded),
            expires_at,
        };

        if let Err(e) = self.backend.save(scope, key, &entry).await {
            tracing::warn!(item = %scope, key, error = %e, "cache write failed, continuing without cache");
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

/// Create a credential store with automatic backend selection.
///
/// # Backend Selection Logic
///
/// - If `cache_dir` is given, attempts to create a [`FileStore`] there and
///   falls back to [`MemoryStore`] with a warning if that fails
/// - Otherwise: uses [`MemoryStore`]
///
/// # Example
///
/// ```rust,ignore
/// use sessionforge_core::store::{create_store, FileStore};
///
/// let store = create_store(Some(&FileStore::default_dir()));
/// ```
pub fn create_store(cache_dir: Option<&Path>) -> CredentialStore {
    if let Some(dir) = cache_dir {
        match FileStore::try_new(dir) {
            Ok(store) => {
                tracing::debug!("Using file cache at {:?}", dir);
                return CredentialStore::new(store);
            }
            Err(e) => {
                tracing::warn!(
                    "File cache unavailable at {:?} ({}), falling back to memory cache. \
                     Credentials will not be shared between processes.",
                    dir,
                    e
                );
            }
        }
    }

    tracing::debug!("Using in-memory credential cache");
    CredentialStore::in_memory()
}
