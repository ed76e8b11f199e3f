use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde_json::Value;

use super::{atomic_write, RegionStore};
use crate::config::StorageConfig;
use crate::error::{corrupted_data, load_error, save_error, StorageError, StorageResult};
use crate::region::{Document, RegionLocation};
use crate::WorldId;

/// Stores each region as one JSON document inside its world's folder
///
/// Layout: `<world folder>/<directory_name>/<prefix>.<rx>.<rz>.<ext>`
#[derive(Debug)]
pub struct FileRegionStore {
    config: StorageConfig,
    /// Folders registered by the host, keyed by world
    worlds: DashMap<WorldId, PathBuf>,
    /// Fallback parent for unregistered worlds (`<root>/<world uuid>`)
    root: Option<PathBuf>,
}

impl FileRegionStore {
    /// Store that only knows explicitly registered worlds
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            worlds: DashMap::new(),
            root: None,
        }
    }

    /// Store that places unregistered worlds under `root`
    pub fn with_root<P: AsRef<Path>>(config: StorageConfig, root: P) -> Self {
        Self {
            root: Some(root.as_ref().to_path_buf()),
            ..Self::new(config)
        }
    }

    pub fn register_world<P: AsRef<Path>>(&self, world: WorldId, folder: P) {
        self.worlds.insert(world, folder.as_ref().to_path_buf());
    }

    pub fn unregister_world(&self, world: WorldId) -> Option<PathBuf> {
        self.worlds.remove(&world).map(|(_, folder)| folder)
    }

    /// Folder holding the region files of a world
    pub fn world_dir(&self, world: WorldId) -> StorageResult<PathBuf> {
        let folder = match self.worlds.get(&world) {
            Some(folder) => folder.clone(),
            None => self
                .root
                .as_ref()
                .map(|root| root.join(world.to_string()))
                .ok_or(StorageError::UnknownWorld { world })?,
        };
        Ok(folder.join(&self.config.directory_name))
    }

    /// File path of a region's document
    pub fn region_path(&self, location: &RegionLocation) -> StorageResult<PathBuf> {
        Ok(self
            .world_dir(location.world)?
            .join(self.config.region_file_name(location.x, location.z)))
    }
}

impl RegionStore for FileRegionStore {
    fn read(&self, location: &RegionLocation) -> StorageResult<Option<Document>> {
        let path = self.region_path(location)?;
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(load_error(&path, e)),
        };

        match serde_json::from_slice::<Value>(&data) {
            Ok(Value::Object(document)) => Ok(Some(document)),
            Ok(_) => Err(corrupted_data(&path, "top level is not a document")),
            Err(e) => Err(corrupted_data(&path, e.to_string())),
        }
    }

    fn write(&self, location: &RegionLocation, document: &Document) -> StorageResult<()> {
        let path = self.region_path(location)?;
        let data = if self.config.pretty_print {
            serde_json::to_vec_pretty(document)
        } else {
            serde_json::to_vec(document)
        }
        .map_err(|source| StorageError::Serialize {
            path: path.clone(),
            source,
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| save_error(parent, e))?;
        }
        atomic_write(&path, &data)?;
        log::debug!("[FileRegionStore] Wrote {} ({} bytes)", path.display(), data.len());
        Ok(())
    }
}
