//! Per-region block info documents and their lifecycle

pub mod document;
pub mod info_path;
pub mod location;
pub mod registry;

pub use document::Document;
pub use info_path::{InfoPath, NamespacedKey};
pub use location::{BlockPos, ChunkCoord, RegionLocation};
pub use registry::{RegionLocationRegistry, RegionToken};

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{StorageError, StorageResult};
use crate::persistence::RegionStore;

/// In-memory block info of one region
///
/// A region starts out unloaded; every data operation fails with
/// [`StorageError::NotLoaded`] until [`Region::load`] succeeded. The owner is
/// expected to serialize all calls through the region's [`RegionToken`].
#[derive(Debug)]
pub struct Region {
    location: RegionLocation,
    /// Chunks reported loaded after the document was available
    loaded_chunks: HashSet<ChunkCoord>,
    /// Chunks reported loaded while the document was still being read
    awaiting_load: HashSet<ChunkCoord>,
    dirty: bool,
    tree: Option<Document>,
}

impl Region {
    pub fn new(location: RegionLocation) -> Self {
        Self {
            location,
            loaded_chunks: HashSet::new(),
            awaiting_load: HashSet::new(),
            dirty: false,
            tree: None,
        }
    }

    pub fn location(&self) -> RegionLocation {
        self.location
    }

    pub fn is_loaded(&self) -> bool {
        self.tree.is_some()
    }

    /// True if the document has changes that were not saved yet
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read the document from the store, or start empty if there is none
    pub fn load(&mut self, store: &dyn RegionStore) -> StorageResult<()> {
        if self.tree.is_some() {
            return Err(StorageError::AlreadyLoaded {
                location: self.location,
            });
        }

        let document = store.read(&self.location)?.unwrap_or_default();
        log::debug!(
            "[Region] Loaded {} ({} columns)",
            self.location,
            document.len()
        );
        self.tree = Some(document);
        self.loaded_chunks.extend(self.awaiting_load.drain());
        Ok(())
    }

    /// Write the document to the store if it changed. Returns whether a
    /// write happened. On failure the region stays dirty.
    pub fn save(&mut self, store: &dyn RegionStore) -> StorageResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let tree = self.tree.as_ref().ok_or(StorageError::NotLoaded {
            location: self.location,
        })?;
        store.write(&self.location, tree)?;
        self.dirty = false;
        Ok(true)
    }

    /// Record a chunk of this region as loaded
    pub fn notify_chunk_loaded(&mut self, chunk: ChunkCoord) {
        debug_assert!(self.location.contains_chunk(chunk));
        if self.is_loaded() {
            self.loaded_chunks.insert(chunk);
        } else {
            self.awaiting_load.insert(chunk);
        }
    }

    /// Record a chunk of this region as unloaded
    pub fn notify_chunk_unloaded(&mut self, chunk: ChunkCoord) {
        self.loaded_chunks.remove(&chunk);
        self.awaiting_load.remove(&chunk);
    }

    /// True once no chunk of this region is loaded or about to be
    pub fn is_fully_unloaded(&self) -> bool {
        self.loaded_chunks.is_empty() && self.awaiting_load.is_empty()
    }

    /// Store `value` under `key` at `pos`. A `null` value removes the key.
    pub fn set_info(&mut self, pos: BlockPos, key: &NamespacedKey, value: Value) -> StorageResult<()> {
        if value.is_null() {
            return self.remove_info(pos, key).map(|_| ());
        }
        let path = InfoPath::value(pos, key);
        document::set(self.tree_mut()?, &path.segments(), value);
        self.dirty = true;
        Ok(())
    }

    pub fn get_info_value(&self, pos: BlockPos, key: &NamespacedKey) -> StorageResult<Option<&Value>> {
        let path = InfoPath::value(pos, key);
        Ok(document::get(self.tree()?, &path.segments()))
    }

    /// Everything one namespace stored at `pos`
    pub fn get_info_section(&self, pos: BlockPos, namespace: &str) -> StorageResult<Option<&Document>> {
        let path = InfoPath::section(pos, namespace);
        Ok(document::section(self.tree()?, &path.segments()))
    }

    /// Remove one value, pruning sections it leaves empty
    pub fn remove_info(&mut self, pos: BlockPos, key: &NamespacedKey) -> StorageResult<bool> {
        self.remove_path(&InfoPath::value(pos, key))
    }

    /// Remove a namespace's whole section at `pos`
    pub fn remove_info_section(&mut self, pos: BlockPos, namespace: &str) -> StorageResult<bool> {
        self.remove_path(&InfoPath::section(pos, namespace))
    }

    /// Remove everything stored at `pos`
    pub fn remove_all_info(&mut self, pos: BlockPos) -> StorageResult<bool> {
        self.remove_path(&InfoPath::block(pos))
    }

    fn remove_path(&mut self, path: &InfoPath) -> StorageResult<bool> {
        let removed = document::remove_pruned(self.tree_mut()?, &path.segments()).is_some();
        if removed {
            self.dirty = true;
        }
        Ok(removed)
    }

    fn tree(&self) -> StorageResult<&Document> {
        self.tree.as_ref().ok_or(StorageError::NotLoaded {
            location: self.location,
        })
    }

    fn tree_mut(&mut self) -> StorageResult<&mut Document> {
        self.tree.as_mut().ok_or(StorageError::NotLoaded {
            location: self.location,
        })
    }
}
