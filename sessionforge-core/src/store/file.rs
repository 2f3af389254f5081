//! File-backed cache backend for sharing derived credentials between processes.

use async_trait::async_trait;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{CacheBackend, CacheEntry, StoreError};
use crate::model::ItemScope;

/// Cache backend storing one JSON file per entry.
///
/// # Layout
///
/// Entries live at `{root}/{hex(scope)}/{hex(key)}.json`. Hex-encoding keeps
/// arbitrary scope identifiers from escaping the root or colliding.
///
/// # Concurrency
///
/// Writes go to a temporary file in the target directory which is then
/// renamed over the entry, so a concurrent reader sees either the old or the
/// new entry and never a partial one. Two writers racing on the same key
/// leave whichever finished last.
///
/// # Example
///
/// ```rust,ignore
/// use sessionforge_core::store::{CredentialStore, FileStore};
///
/// let backend = FileStore::try_new(FileStore::default_dir())?;
/// let store = CredentialStore::new(backend);
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a file store rooted at `root`.
    ///
    /// On unix, `root` must be a directory owned by the current user that
    /// no one else can write to.
    pub fn try_new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        create_private_dir(&root)?;
        Ok(Self { root })
    }

    /// Default cache directory.
    ///
    /// Prefers the per-user runtime directory, which is cleared when the
    /// user session ends, and falls back to a per-user directory under the
    /// system temp directory.
    pub fn default_dir() -> PathBuf {
        directories::ProjectDirs::from("com", "raibid-labs", "sessionforge")
            .and_then(|dirs| dirs.runtime_dir().map(|dir| dir.to_path_buf()))
            .unwrap_or_else(|| std::env::temp_dir().join(fallback_dir_name()))
    }

    fn entry_path(&self, scope: &ItemScope, key: &str) -> PathBuf {
        self.root
            .join(encode_component(scope.as_str()))
            .join(format!("{}.json", encode_component(key)))
    }
}

#[async_trait]
impl CacheBackend for FileStore {
    async fn load(&self, scope: &ItemScope, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let path = self.entry_path(scope, key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, scope: &ItemScope, key: &str, entry: &CacheEntry) -> Result<(), StoreError> {
        let path = self.entry_path(scope, key);
        let bytes = serde_json::to_vec(entry)?;

        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| StoreError::BackendError {
                message: format!("cache writer task failed: {}", e),
            })?
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path.parent().ok_or_else(|| StoreError::BackendError {
        message: format!("cache path has no parent directory: {:?}", path),
    })?;
    create_private_dir(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

fn create_private_dir(dir: &Path) -> Result<(), StoreError> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder.create(dir)?;
    verify_private_dir(dir)
}

#[cfg(unix)]
fn fallback_dir_name() -> String {
    format!("sessionforge-{}", current_uid())
}

#[cfg(not(unix))]
fn fallback_dir_name() -> String {
    "sessionforge-cache".to_string()
}

#[cfg(unix)]
fn current_uid() -> u32 {
    unsafe { libc::geteuid() }
}

/// Refuse directories another user could have planted entries in.
#[cfg(unix)]
fn verify_private_dir(dir: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::MetadataExt;

    let insecure = |reason: String| StoreError::InsecureDirectory {
        path: dir.to_path_buf(),
        reason,
    };

    let metadata = std::fs::symlink_metadata(dir)?;
    if !metadata.is_dir() {
        return Err(insecure("not a directory".to_string()));
    }
    if metadata.uid() != current_uid() {
        return Err(insecure(format!("owned by uid {}", metadata.uid())));
    }
    if metadata.mode() & 0o022 != 0 {
        return Err(insecure(format!("writable by others (mode {:o})", metadata.mode() & 0o777)));
    }
    Ok(())
}

#[cfg(not(unix))]
fn verify_private_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}

fn encode_component(raw: &str) -> String {
    raw.bytes().map(|b| format!("{:02x}", b)).collect()
}
