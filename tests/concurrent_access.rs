//! Concurrency tests for the region cache
//!
//! These tests verify that:
//! - concurrent first touches of a region load it exactly once
//! - background loads are ordered against unload notifications
//! - unrelated regions are accessed in parallel without interference

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde_json::json;
use uuid::Uuid;

use block_info_storage::{
    BlockPos, ChunkCoord, Document, MemoryRegionStore, NamespacedKey, RegionCache,
    RegionLocation, RegionStore, StorageConfig, StorageResult,
};

fn key(name: &str) -> NamespacedKey {
    NamespacedKey::new("concurrency", name).expect("valid key")
}

fn threaded_config() -> StorageConfig {
    StorageConfig {
        load_threads: 4,
        ..Default::default()
    }
}

#[test]
fn test_concurrent_first_touch_loads_once() {
    let store = Arc::new(MemoryRegionStore::new());
    let cache = Arc::new(RegionCache::new(threaded_config(), store.clone()));
    let world = Uuid::new_v4();
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let pos = BlockPos::new(i as i32, 64, 0);
                cache
                    .set_block_info(world, pos, &key("k"), i as i64)
                    .expect("set");
                if i % 2 == 0 {
                    cache.on_chunk_load(world, pos.chunk());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker thread panicked");
    }
    cache.wait_for_pending_loads();

    assert_eq!(store.read_count(), 1);
    assert_eq!(cache.resident_count(), 1);
    for i in 0..threads {
        let value = cache
            .get_block_info_value(world, BlockPos::new(i as i32, 64, 0), &key("k"))
            .expect("get");
        assert_eq!(value, Some(json!(i as i64)));
    }
}

#[test]
fn test_background_loads_complete() {
    let store = Arc::new(MemoryRegionStore::new());
    let cache = RegionCache::new(threaded_config(), store.clone());
    let world = Uuid::new_v4();

    for region_x in 0..8 {
        cache.on_chunk_load(world, ChunkCoord::new(region_x * 32, 0));
        cache.on_chunk_load(world, ChunkCoord::new(region_x * 32 + 1, 0));
    }
    cache.wait_for_pending_loads();

    assert_eq!(cache.resident_count(), 8);
    for region_x in 0..8 {
        assert!(cache.is_region_loaded(&RegionLocation::new(world, region_x, 0)));
    }
    assert_eq!(store.read_count(), 8);
}

/// Store whose reads block until the test releases them
struct GatedStore {
    inner: MemoryRegionStore,
    started: Sender<()>,
    release: Receiver<()>,
}

impl RegionStore for GatedStore {
    fn read(&self, location: &RegionLocation) -> StorageResult<Option<Document>> {
        let _ = self.started.send(());
        let _ = self.release.recv();
        self.inner.read(location)
    }

    fn write(&self, location: &RegionLocation, document: &Document) -> StorageResult<()> {
        self.inner.write(location, document)
    }
}

#[test]
fn test_unload_waits_for_in_flight_load() {
    let (started_tx, started_rx) = bounded(1);
    let (release_tx, release_rx) = bounded(1);
    let store = Arc::new(GatedStore {
        inner: MemoryRegionStore::new(),
        started: started_tx,
        release: release_rx,
    });
    let cache = Arc::new(RegionCache::new(threaded_config(), store.clone()));
    let world = Uuid::new_v4();
    let chunk = ChunkCoord::new(0, 0);
    let location = RegionLocation::from_chunk(world, chunk);

    cache.on_chunk_load(world, chunk);
    started_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("background load started");
    assert!(cache.is_resident(&location));

    let unloader = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.on_chunk_unload(world, chunk))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!unloader.is_finished());

    release_tx.send(()).expect("release load");
    unloader.join().expect("unloader panicked");
    cache.wait_for_pending_loads();

    assert!(!cache.is_resident(&location));
    assert_eq!(store.inner.read_count(), 1);
}

#[test]
fn test_parallel_regions_do_not_interfere() {
    let store = Arc::new(MemoryRegionStore::new());
    let cache = Arc::new(RegionCache::new(threaded_config(), store.clone()));
    let world = Uuid::new_v4();
    let threads = 8;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let base_x = t * 512;
                let chunk = BlockPos::new(base_x, 0, 0).chunk();
                cache.on_chunk_load(world, chunk);
                for i in 0..50 {
                    let pos = BlockPos::new(base_x + i, i, i);
                    cache
                        .set_block_info(world, pos, &key("n"), i)
                        .expect("set");
                    if i % 3 == 0 {
                        cache
                            .remove_block_info(world, pos, &key("n"))
                            .expect("remove");
                    }
                }
                cache.on_world_save(world);
                cache.on_chunk_unload(world, chunk);
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker thread panicked");
    }
    cache.wait_for_pending_loads();
    assert_eq!(cache.resident_count(), 0);

    for t in 0..threads {
        let location = RegionLocation::new(world, t, 0);
        let document = store.document(&location).expect("region saved");
        // 50 positions, every third removed
        assert_eq!(document.len(), 33, "region {}", location);
    }
}
