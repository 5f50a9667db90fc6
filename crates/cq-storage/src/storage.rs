//! Versioned JSON files in the `.storage/` directory
//!
//! Every file wraps its payload with the key and schema version it was
//! written with, so a reader can refuse data written by a newer host.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Name of the storage directory inside the config directory
pub const STORAGE_DIR: &str = ".storage";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage {key} was written with version {found}, newest supported is {supported}")]
    UnsupportedVersion {
        key: String,
        supported: u32,
        found: u32,
    },

    #[error("Addon instance {0} already exists")]
    DuplicateAddon(String),

    #[error("Addon instance {0} not found")]
    UnknownAddon(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Versioned wrapper written to disk
///
/// JSON format:
/// ```json
/// {
///   "version": 1,
///   "minor_version": 1,
///   "key": "consequences.addons",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageFile<T> {
    /// Major version - breaking changes
    pub version: u32,
    /// Minor version - additive changes
    pub minor_version: u32,
    /// Storage key (file name)
    pub key: String,
    /// Payload
    pub data: T,
}

/// Payload types with a fixed key and schema version
pub trait Storable: Serialize + DeserializeOwned {
    /// Storage key for this type
    const KEY: &'static str;
    /// Current major version
    const VERSION: u32;
    /// Current minor version
    const MINOR_VERSION: u32;
}

/// Access to the `.storage/` directory
#[derive(Debug, Clone)]
pub struct Storage {
    storage_dir: PathBuf,
}

impl Storage {
    /// Use `storage_dir` directly
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    /// Use the `.storage/` directory inside `config_dir`
    pub fn in_config_dir(config_dir: impl AsRef<Path>) -> Self {
        Self::new(config_dir.as_ref().join(STORAGE_DIR))
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Path of the file for a storage key
    pub fn file_path(&self, key: &str) -> PathBuf {
        self.storage_dir.join(key)
    }

    /// Load the payload of `T`, or `None` when nothing was saved yet
    ///
    /// Files from an older minor version load as-is; files from a newer
    /// major version are rejected.
    pub async fn load<T: Storable>(&self) -> StorageResult<Option<StorageFile<T>>> {
        let path = self.file_path(T::KEY);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = T::KEY, "Storage file not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let file: StorageFile<T> = serde_json::from_str(&content)?;
        if file.version > T::VERSION {
            return Err(StorageError::UnsupportedVersion {
                key: T::KEY.to_string(),
                supported: T::VERSION,
                found: file.version,
            });
        }

        debug!(
            key = T::KEY,
            version = file.version,
            minor_version = file.minor_version,
            "Loaded storage file"
        );
        Ok(Some(file))
    }

    /// Save `data` under its key
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// readers never observe a partial file.
    pub async fn save<T: Storable>(&self, data: &T) -> StorageResult<()> {
        fs::create_dir_all(&self.storage_dir).await?;

        let file = StorageFile {
            version: T::VERSION,
            minor_version: T::MINOR_VERSION,
            key: T::KEY.to_string(),
            data,
        };
        let content = serde_json::to_string_pretty(&file)?;

        let path = self.file_path(T::KEY);
        let temp_path = self.file_path(&format!("{}.tmp", T::KEY));
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!(key = T::KEY, "Saved storage file");
        Ok(())
    }
}
