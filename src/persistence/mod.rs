//! Persistence backends for region documents

pub mod file_store;
pub mod memory_store;

pub use file_store::FileRegionStore;
pub use memory_store::MemoryRegionStore;

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{save_error, StorageResult};
use crate::region::{Document, RegionLocation};

/// Backing store for region documents
///
/// Implementations must be safe to call from several threads at once. The
/// region cache guarantees that reads and writes for one location never
/// overlap, but different locations are accessed in parallel.
pub trait RegionStore: Send + Sync {
    /// Read a region's document, `None` if it was never written
    fn read(&self, location: &RegionLocation) -> StorageResult<Option<Document>>;

    /// Replace a region's document
    fn write(&self, location: &RegionLocation, document: &Document) -> StorageResult<()>;
}

/// Write `data` to `path` through a temporary sibling file so readers never
/// observe a half-written document.
pub fn atomic_write(path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
    let path = path.as_ref();
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let write_tmp = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()
    };
    if let Err(e) = write_tmp() {
        let _ = fs::remove_file(&tmp_path);
        return Err(save_error(&tmp_path, e));
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        save_error(path, e)
    })
}
