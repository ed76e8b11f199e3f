//! Canonical region locations and their per-region locks
//!
//! Every operation that touches a region's data first resolves a
//! [`RegionToken`] here and holds its lock for the duration. The registry
//! hands out exactly one token per `(world, region x, region z)` until the
//! world is forgotten, so two callers resolving the same area always contend
//! on the same mutex.
//!
//! Forgetting a world retires its tokens. A token is retired while its lock is
//! held and before a replacement can be resolved, so a caller that checks
//! [`RegionToken::is_retired`] under the lock never shares a location with the
//! holder of a newer token.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::location::{BlockPos, ChunkCoord, RegionLocation};
use crate::WorldId;

/// Canonical handle for one region location
#[derive(Debug)]
pub struct RegionToken {
    location: RegionLocation,
    lock: Mutex<()>,
    retired: AtomicBool,
}

impl RegionToken {
    fn new(location: RegionLocation) -> Self {
        Self {
            location,
            lock: Mutex::new(()),
            retired: AtomicBool::new(false),
        }
    }

    pub fn location(&self) -> RegionLocation {
        self.location
    }

    /// Acquire exclusive access to the region at this location
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// Whether the world of this token was forgotten. Check under the lock.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}

type WorldTokens = HashMap<(i32, i32), Arc<RegionToken>>;

/// Process-wide memoized mapping from region coordinates to tokens
#[derive(Debug, Default)]
pub struct RegionLocationRegistry {
    worlds: Mutex<HashMap<WorldId, WorldTokens>>,
}

impl RegionLocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the token for a region, creating it on first use
    pub fn resolve(&self, world: WorldId, region_x: i32, region_z: i32) -> Arc<RegionToken> {
        let mut worlds = self.worlds.lock();
        let token = worlds
            .entry(world)
            .or_default()
            .entry((region_x, region_z))
            .or_insert_with(|| {
                Arc::new(RegionToken::new(RegionLocation::new(
                    world, region_x, region_z,
                )))
            });
        Arc::clone(token)
    }

    /// Token of the region containing a chunk
    pub fn resolve_chunk(&self, world: WorldId, chunk: ChunkCoord) -> Arc<RegionToken> {
        let location = RegionLocation::from_chunk(world, chunk);
        self.resolve(world, location.x, location.z)
    }

    /// Token of the region containing a block
    pub fn resolve_block(&self, world: WorldId, pos: BlockPos) -> Arc<RegionToken> {
        let location = RegionLocation::from_block(world, pos);
        self.resolve(world, location.x, location.z)
    }

    /// Look up an existing token without creating one
    pub fn get(&self, location: &RegionLocation) -> Option<Arc<RegionToken>> {
        self.worlds
            .lock()
            .get(&location.world)
            .and_then(|tokens| tokens.get(&(location.x, location.z)))
            .map(Arc::clone)
    }

    /// All tokens currently known for a world
    pub fn tokens_in_world(&self, world: WorldId) -> Vec<Arc<RegionToken>> {
        self.worlds
            .lock()
            .get(&world)
            .map(|tokens| tokens.values().map(Arc::clone).collect())
            .unwrap_or_default()
    }

    /// Retire and drop every token of a world, returning how many were
    /// forgotten. `on_retire` runs for each location under its token lock,
    /// after any in-flight holder has released it.
    pub fn forget(&self, world: WorldId, mut on_retire: impl FnMut(RegionLocation)) -> usize {
        let mut worlds = self.worlds.lock();
        let Some(tokens) = worlds.remove(&world) else {
            return 0;
        };
        for token in tokens.values() {
            let _held = token.lock();
            on_retire(token.location);
            token.retired.store(true, Ordering::Release);
        }
        tokens.len()
    }
}
