use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::RegionStore;
use crate::error::StorageResult;
use crate::region::{Document, RegionLocation};

/// In-process region store
///
/// Keeps documents in a map and counts reads and writes, which makes it the
/// store of choice for embedding without a disk and for observing how often
/// the cache actually touches storage.
#[derive(Debug, Default)]
pub struct MemoryRegionStore {
    documents: Mutex<HashMap<RegionLocation, Document>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryRegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `read` calls so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `write` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Copy of the last written document of a region
    pub fn document(&self, location: &RegionLocation) -> Option<Document> {
        self.documents.lock().get(location).cloned()
    }
}

impl RegionStore for MemoryRegionStore {
    fn read(&self, location: &RegionLocation) -> StorageResult<Option<Document>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.lock().get(location).cloned())
    }

    fn write(&self, location: &RegionLocation, document: &Document) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.documents.lock().insert(*location, document.clone());
        Ok(())
    }
}
