//! Region cache coordinating block info access with world lifecycle events
//!
//! The cache keeps at most one [`Region`] per location resident. Regions are
//! loaded on first touch (chunk load notification or API call), stay resident
//! while any of their chunks is loaded, and are written back when the last
//! chunk unloads, the world saves or unloads, or the cache shuts down.
//!
//! Lock order is always token, then cache map, then region. No map guard is
//! held while waiting on a token or a region.

mod loader;

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde_json::Value;

use crate::config::StorageConfig;
use crate::error::StorageResult;
use crate::persistence::RegionStore;
use crate::region::info_path::normalize_namespace;
use crate::region::{
    BlockPos, ChunkCoord, Document, NamespacedKey, Region, RegionLocation, RegionLocationRegistry,
    RegionToken,
};
use crate::WorldId;

use loader::{LoadJob, PendingLoads, RegionLoader};

pub(crate) type SharedRegion = Arc<Mutex<Region>>;

/// Outcome of flushing a set of regions
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    /// Regions written to the store
    pub written: usize,
    /// Regions without unsaved changes
    pub clean: usize,
    /// Regions whose write failed, they stay dirty
    pub failed: usize,
}

impl FlushSummary {
    fn merge(self, other: Self) -> Self {
        Self {
            written: self.written + other.written,
            clean: self.clean + other.clean,
            failed: self.failed + other.failed,
        }
    }
}

/// State shared between the cache and its loader threads
pub(crate) struct CacheShared {
    registry: RegionLocationRegistry,
    regions: DashMap<RegionLocation, SharedRegion>,
    store: Arc<dyn RegionStore>,
    pending: PendingLoads,
}

impl CacheShared {
    fn resident(&self, location: &RegionLocation) -> Option<SharedRegion> {
        self.regions.get(location).map(|entry| Arc::clone(entry.value()))
    }

    /// Resident, loaded region for the token's location. Caller holds the token lock.
    fn load_resident(&self, token: &RegionToken) -> StorageResult<SharedRegion> {
        let location = token.location();
        let resident = self.resident(&location);
        if let Some(region) = resident {
            {
                let mut guard = region.lock();
                if !guard.is_loaded() {
                    guard.load(self.store.as_ref())?;
                }
            }
            return Ok(region);
        }

        let mut region = Region::new(location);
        region.load(self.store.as_ref())?;
        let region = Arc::new(Mutex::new(region));
        self.regions.insert(location, Arc::clone(&region));
        Ok(region)
    }

    /// Run `f` under the live token of `location`, resolving it again if the
    /// token was retired while waiting for its lock
    fn with_token<R>(&self, location: RegionLocation, f: impl FnOnce(&Arc<RegionToken>) -> R) -> R {
        loop {
            let token = self.registry.resolve(location.world, location.x, location.z);
            let _held = token.lock();
            if !token.is_retired() {
                return f(&token);
            }
        }
    }

    /// Like [`Self::with_token`] but never creates a token
    fn with_existing_token<R>(
        &self,
        location: &RegionLocation,
        f: impl FnOnce(&Arc<RegionToken>) -> R,
    ) -> Option<R> {
        loop {
            let token = self.registry.get(location)?;
            let _held = token.lock();
            if !token.is_retired() {
                return Some(f(&token));
            }
        }
    }

    /// Finish a queued load unless its region was evicted or replaced meanwhile
    fn complete_load(&self, job: LoadJob) {
        let location = job.token.location();
        let _token = job.token.lock();

        match self.resident(&location) {
            Some(current) if Arc::ptr_eq(&current, &job.region) => {}
            _ => {
                log::debug!("[RegionCache] Discarding stale load of {}", location);
                return;
            }
        }

        let mut region = job.region.lock();
        if region.is_loaded() {
            return;
        }
        if let Err(e) = region.load(self.store.as_ref()) {
            log::error!(
                "[RegionCache] Failed to load block info for region {}: {}",
                location,
                e
            );
        }
    }

    fn flush(&self, region: &SharedRegion) -> FlushSummary {
        let mut region = region.lock();
        match region.save(self.store.as_ref()) {
            Ok(true) => FlushSummary {
                written: 1,
                ..Default::default()
            },
            Ok(false) => FlushSummary {
                clean: 1,
                ..Default::default()
            },
            Err(e) => {
                log::error!(
                    "[RegionCache] Error while trying to save block info for region {}: {}",
                    region.location(),
                    e
                );
                FlushSummary {
                    failed: 1,
                    ..Default::default()
                }
            }
        }
    }

    fn resident_in_world(&self, world: WorldId) -> Vec<RegionLocation> {
        self.regions
            .iter()
            .filter(|entry| entry.key().world == world)
            .map(|entry| *entry.key())
            .collect()
    }
}

/// Process-wide cache of region documents
pub struct RegionCache {
    config: StorageConfig,
    shared: Arc<CacheShared>,
    loader: Mutex<Option<RegionLoader>>,
}

impl RegionCache {
    /// Only `load_threads` is read here. Where and how regions are persisted
    /// is up to `store`, which carries its own configuration.
    pub fn new(config: StorageConfig, store: Arc<dyn RegionStore>) -> Self {
        let shared = Arc::new(CacheShared {
            registry: RegionLocationRegistry::new(),
            regions: DashMap::new(),
            store,
            pending: PendingLoads::default(),
        });
        let loader = (config.load_threads > 0)
            .then(|| RegionLoader::spawn(config.load_threads, Arc::clone(&shared)));

        Self {
            config,
            shared,
            loader: Mutex::new(loader),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn registry(&self) -> &RegionLocationRegistry {
        &self.shared.registry
    }

    // --- Block info API ---

    /// Attach `value` to a block under `key`
    pub fn set_block_info(
        &self,
        world: WorldId,
        pos: BlockPos,
        key: &NamespacedKey,
        value: impl Into<Value>,
    ) -> StorageResult<()> {
        let value = value.into();
        self.with_region(world, pos, |region| region.set_info(pos, key, value))
    }

    /// Everything a namespace (plugin or type name) attached to a block
    pub fn get_block_info(
        &self,
        world: WorldId,
        pos: BlockPos,
        namespace: &str,
    ) -> StorageResult<Option<Document>> {
        let namespace = normalize_namespace(namespace)?;
        self.with_region(world, pos, |region| {
            Ok(region.get_info_section(pos, &namespace)?.cloned())
        })
    }

    pub fn get_block_info_value(
        &self,
        world: WorldId,
        pos: BlockPos,
        key: &NamespacedKey,
    ) -> StorageResult<Option<Value>> {
        self.with_region(world, pos, |region| {
            Ok(region.get_info_value(pos, key)?.cloned())
        })
    }

    /// Remove one value, returns whether it existed
    pub fn remove_block_info(
        &self,
        world: WorldId,
        pos: BlockPos,
        key: &NamespacedKey,
    ) -> StorageResult<bool> {
        self.with_region(world, pos, |region| region.remove_info(pos, key))
    }

    /// Remove everything a namespace (plugin or type name) attached to a block
    pub fn remove_block_info_type(
        &self,
        world: WorldId,
        pos: BlockPos,
        namespace: &str,
    ) -> StorageResult<bool> {
        let namespace = normalize_namespace(namespace)?;
        self.with_region(world, pos, |region| region.remove_info_section(pos, &namespace))
    }

    /// Remove all info attached to a block
    pub fn remove_all_block_info(&self, world: WorldId, pos: BlockPos) -> StorageResult<bool> {
        self.with_region(world, pos, |region| region.remove_all_info(pos))
    }

    fn with_region<R>(
        &self,
        world: WorldId,
        pos: BlockPos,
        f: impl FnOnce(&mut Region) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let location = RegionLocation::from_block(world, pos);
        self.shared.with_token(location, |token| {
            let region = self.shared.load_resident(token)?;
            let mut region = region.lock();
            f(&mut region)
        })
    }

    // --- World lifecycle ---

    /// A chunk was loaded by the world engine
    pub fn on_chunk_load(&self, world: WorldId, chunk: ChunkCoord) {
        let location = RegionLocation::from_chunk(world, chunk);
        let job = self.shared.with_token(location, |token| {
            let region = Arc::clone(
                self.shared
                    .regions
                    .entry(location)
                    .or_insert_with(|| Arc::new(Mutex::new(Region::new(location))))
                    .value(),
            );
            let mut guard = region.lock();
            guard.notify_chunk_loaded(chunk);
            if guard.is_loaded() {
                return None;
            }
            drop(guard);
            Some(LoadJob {
                token: Arc::clone(token),
                region,
            })
        });

        if let Some(job) = job {
            self.schedule_load(job);
        }
    }

    /// A chunk was unloaded by the world engine. Evicts its region once no
    /// chunk of it is loaded anymore.
    pub fn on_chunk_unload(&self, world: WorldId, chunk: ChunkCoord) {
        let location = RegionLocation::from_chunk(world, chunk);
        let known = self.shared.with_existing_token(&location, |_| {
            let Some(region) = self.shared.resident(&location) else {
                return;
            };

            let mut guard = region.lock();
            guard.notify_chunk_unloaded(chunk);
            if !guard.is_fully_unloaded() {
                return;
            }
            match guard.save(self.shared.store.as_ref()) {
                Ok(_) => {
                    drop(guard);
                    self.shared.regions.remove(&location);
                    log::debug!("[RegionCache] Evicted region {}", location);
                }
                Err(e) => log::error!(
                    "[RegionCache] Keeping region {} resident, saving it failed: {}",
                    location,
                    e
                ),
            }
        });

        if known.is_none() {
            log::debug!("[RegionCache] Unload of chunk {:?} in unknown region {}", chunk, location);
        }
    }

    /// Write every resident region of a world. Regions with no loaded chunk
    /// left (an earlier eviction failed to save them, or they were only
    /// touched through the API) are evicted once written.
    pub fn on_world_save(&self, world: WorldId) -> FlushSummary {
        let summary = self
            .shared
            .resident_in_world(world)
            .par_iter()
            .map(|location| {
                self.shared.with_token(*location, |_| {
                    let Some(region) = self.shared.resident(location) else {
                        return FlushSummary::default();
                    };
                    let summary = self.shared.flush(&region);
                    let idle = region.lock().is_fully_unloaded();
                    if summary.failed == 0 && idle {
                        self.shared.regions.remove(location);
                        log::debug!("[RegionCache] Evicted idle region {}", location);
                    }
                    summary
                })
            })
            .reduce(FlushSummary::default, FlushSummary::merge);

        log::info!("[RegionCache] Saved world {}: {:?}", world, summary);
        summary
    }

    /// Write and evict every resident region of a world, then forget its
    /// locations. Regions created by handlers that raced the sweep are
    /// written and evicted while their tokens are retired.
    pub fn on_world_unload(&self, world: WorldId) -> FlushSummary {
        let swept = self
            .shared
            .resident_in_world(world)
            .par_iter()
            .map(|location| {
                self.shared.with_token(*location, |_| {
                    self.shared
                        .regions
                        .remove(location)
                        .map(|(_, region)| self.shared.flush(&region))
                        .unwrap_or_default()
                })
            })
            .reduce(FlushSummary::default, FlushSummary::merge);

        let mut stragglers = FlushSummary::default();
        let forgotten = self.shared.registry.forget(world, |location| {
            if let Some((_, region)) = self.shared.regions.remove(&location) {
                stragglers = stragglers.merge(self.shared.flush(&region));
            }
        });
        let summary = swept.merge(stragglers);
        log::info!(
            "[RegionCache] Unloaded world {}: {:?}, {} locations released",
            world,
            summary,
            forgotten
        );
        summary
    }

    /// A block's identity changed (broken, placed, burnt, faded, flowed into,
    /// moved by a piston). Info attached to it described the old block.
    pub fn on_block_mutated(&self, world: WorldId, pos: BlockPos) {
        if let Err(e) = self.remove_all_block_info(world, pos) {
            log::warn!(
                "[RegionCache] Failed to clear block info at {:?} in world {}: {}",
                pos,
                world,
                e
            );
        }
    }

    /// Several blocks changed at once, e.g. a piston moving a row of blocks.
    /// Info is dropped, not carried along to the new positions.
    pub fn on_blocks_mutated<I>(&self, world: WorldId, positions: I)
    where
        I: IntoIterator<Item = BlockPos>,
    {
        for pos in positions {
            self.on_block_mutated(world, pos);
        }
    }

    /// Finish queued loads and write every resident region with unsaved
    /// changes. Regions stay resident and usable, loads then run inline.
    /// Later calls, including the one on drop, write whatever changed since.
    pub fn shutdown(&self) -> FlushSummary {
        if let Some(loader) = self.loader.lock().take() {
            loader.shutdown();
        }

        let resident: Vec<(RegionLocation, SharedRegion)> = self
            .shared
            .regions
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        let summary = resident
            .par_iter()
            .map(|(location, region)| {
                let token = self.shared.registry.get(location);
                let _token = token.as_ref().map(|token| token.lock());
                self.shared.flush(region)
            })
            .reduce(FlushSummary::default, FlushSummary::merge);

        log::info!("[RegionCache] Shut down: {:?}", summary);
        summary
    }

    /// Block until every queued background load has finished
    pub fn wait_for_pending_loads(&self) {
        self.shared.pending.wait_idle();
    }

    // --- Introspection ---

    pub fn is_resident(&self, location: &RegionLocation) -> bool {
        self.shared.regions.contains_key(location)
    }

    pub fn resident_count(&self) -> usize {
        self.shared.regions.len()
    }

    pub fn resident_in_world(&self, world: WorldId) -> Vec<RegionLocation> {
        self.shared.resident_in_world(world)
    }

    /// Whether a resident region has finished loading
    pub fn is_region_loaded(&self, location: &RegionLocation) -> bool {
        self.shared
            .resident(location)
            .is_some_and(|region| region.lock().is_loaded())
    }

    fn schedule_load(&self, job: LoadJob) {
        let job = match self.loader.lock().as_ref() {
            Some(loader) => match loader.submit(job) {
                Ok(()) => return,
                Err(job) => job,
            },
            None => job,
        };
        self.shared.complete_load(job);
    }
}

impl Drop for RegionCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RegionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionCache")
            .field("config", &self.config)
            .field("resident", &self.shared.regions.len())
            .finish()
    }
}
