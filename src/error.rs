//! Error types for block info storage
//!
//! Everything the crate can fail with funnels into [`StorageError`]. Callers of
//! the public API get these back synchronously; lifecycle sweeps log them per
//! region instead.

use std::path::{Path, PathBuf};

use crate::region::RegionLocation;
use crate::WorldId;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while loading, mutating or saving block info
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Region {location} is not loaded")]
    NotLoaded { location: RegionLocation },

    #[error("Region {location} is already loaded")]
    AlreadyLoaded { location: RegionLocation },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Corrupted region file {}: {reason}", .path.display())]
    Corrupted { path: PathBuf, reason: String },

    #[error("No storage folder known for world {world}")]
    UnknownWorld { world: WorldId },

    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to read configuration {}: {source}", .path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// True for errors caused by a caller bypassing the region cache.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            StorageError::NotLoaded { .. } | StorageError::AlreadyLoaded { .. }
        )
    }
}

/// Create a save error
pub fn save_error(path: impl AsRef<Path>, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.as_ref().to_path_buf(),
        source,
    }
}

/// Create a load error
pub fn load_error(path: impl AsRef<Path>, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.as_ref().to_path_buf(),
        source,
    }
}

/// Create a corrupted data error
pub fn corrupted_data(path: impl AsRef<Path>, reason: impl Into<String>) -> StorageError {
    StorageError::Corrupted {
        path: path.as_ref().to_path_buf(),
        reason: reason.into(),
    }
}
