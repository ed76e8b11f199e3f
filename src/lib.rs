//! Block info storage
//!
//! Attaches namespaced key-value data to individual block positions of a
//! world. Data is grouped into 512x512 block regions, each persisted as one
//! document and kept in memory while any of its chunks is loaded.

pub mod cache;
pub mod config;
pub mod error;
pub mod persistence;
pub mod region;

pub use cache::{FlushSummary, RegionCache};
pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use persistence::{FileRegionStore, MemoryRegionStore, RegionStore};
pub use region::{
    BlockPos, ChunkCoord, Document, InfoPath, NamespacedKey, Region, RegionLocation,
    RegionLocationRegistry, RegionToken,
};

/// Identifier of a world as assigned by the host engine
pub type WorldId = uuid::Uuid;

/// Install `env_logger` as the log backend unless one is already set
pub fn init_logging() {
    if let Err(e) = env_logger::try_init() {
        log::debug!("[block_info_storage::init_logging] env_logger already initialized: {}", e);
    }
}
