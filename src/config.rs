use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Configuration for block info storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Subdirectory of each world folder holding the region files
    pub directory_name: String,
    /// Region file name prefix
    pub file_prefix: String,
    /// Region file extension
    pub file_extension: String,
    /// Write indented documents
    pub pretty_print: bool,
    /// Background loader threads, 0 loads on the notifying thread
    pub load_threads: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory_name: "blockinfo".to_string(),
            file_prefix: "bi".to_string(),
            file_extension: "json".to_string(),
            pretty_print: true,
            load_threads: 2,
        }
    }
}

impl StorageConfig {
    /// Parse a TOML configuration, missing fields take their defaults
    pub fn from_toml_str(source: &str) -> StorageResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Load a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| StorageError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// File name of the region at the given region coordinates
    pub fn region_file_name(&self, region_x: i32, region_z: i32) -> String {
        format!(
            "{}.{}.{}.{}",
            self.file_prefix, region_x, region_z, self.file_extension
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = StorageConfig::from_toml_str("load_threads = 0\nfile_extension = \"bi\"\n")
            .expect("valid config");
        assert_eq!(config.load_threads, 0);
        assert_eq!(config.file_extension, "bi");
        assert_eq!(config.directory_name, "blockinfo");
        assert!(config.pretty_print);
    }

    #[test]
    fn test_region_file_name() {
        let config = StorageConfig::default();
        assert_eq!(config.region_file_name(-1, 3), "bi.-1.3.json");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = StorageConfig::from_toml_str("load_threads = \"many\"").unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().expect("Failed to create temporary directory for test");
        let path = dir.path().join("storage.toml");
        std::fs::write(&path, "directory_name = \"meta\"\n").expect("write config");

        let config = StorageConfig::load(&path).expect("load config");
        assert_eq!(config.directory_name, "meta");

        let missing = StorageConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, StorageError::ConfigIo { .. }));
    }
}
