//! Background region loading
//!
//! Chunk load notifications only register the region and queue a job here,
//! so the notifying thread never waits on disk. A worker finishes the load
//! under the region's token lock, which orders it against unload
//! notifications for the same region.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use super::{CacheShared, SharedRegion};
use crate::region::RegionToken;

/// Request to load one region that is already registered in the cache
pub(crate) struct LoadJob {
    pub token: Arc<RegionToken>,
    pub region: SharedRegion,
}

/// Counts queued jobs so callers can wait for the queue to drain
#[derive(Debug, Default)]
pub(crate) struct PendingLoads {
    count: Mutex<usize>,
    idle: Condvar,
}

impl PendingLoads {
    fn begin(&self) {
        *self.count.lock() += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    pub fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

/// Marks a job finished even if loading panics
struct PendingGuard<'a>(&'a PendingLoads);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Pool of threads running [`LoadJob`]s
pub(crate) struct RegionLoader {
    sender: Option<Sender<LoadJob>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<CacheShared>,
}

impl RegionLoader {
    pub fn spawn(threads: usize, shared: Arc<CacheShared>) -> Self {
        let (sender, receiver) = unbounded();
        let workers = (0..threads)
            .filter_map(|index| {
                let receiver: Receiver<LoadJob> = receiver.clone();
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("region-loader-{}", index))
                    .spawn(move || {
                        for job in receiver.iter() {
                            let _pending = PendingGuard(&shared.pending);
                            shared.complete_load(job);
                        }
                    })
                    .map_err(|e| log::error!("[RegionLoader] Failed to spawn worker {}: {}", index, e))
                    .ok()
            })
            .collect::<Vec<_>>();

        log::debug!("[RegionLoader] Started {} workers", workers.len());
        Self {
            sender: if workers.is_empty() { None } else { Some(sender) },
            workers,
            shared,
        }
    }

    /// Queue a job, handing it back if no worker can take it
    pub fn submit(&self, job: LoadJob) -> Result<(), LoadJob> {
        let Some(sender) = &self.sender else {
            return Err(job);
        };
        self.shared.pending.begin();
        sender.send(job).map_err(|e| {
            self.shared.pending.finish();
            e.into_inner()
        })
    }

    /// Stop accepting jobs and wait for the queued ones to finish
    pub fn shutdown(mut self) {
        self.sender = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("[RegionLoader] A worker panicked");
            }
        }
    }
}
