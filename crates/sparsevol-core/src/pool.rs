//! The grid pool: loads each source once and shares it between consumers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};

use crate::error::{Result, VolumeError};
use crate::grid_set::GridSet;
use crate::options::{EvictionPolicy, PoolOptions};
use crate::reader::GridReader;

struct PoolEntry {
    set: Arc<GridSet>,
    leases: usize,
}

type LoadOutcome = std::result::Result<Arc<GridSet>, Arc<VolumeError>>;

/// A load in progress. Every caller that asks for the source while it runs
/// waits here and receives the same outcome.
#[derive(Default)]
struct PendingLoad {
    outcome: Mutex<Option<LoadOutcome>>,
    done: Condvar,
    waiters: AtomicUsize,
}

impl PendingLoad {
    fn finish(&self, outcome: LoadOutcome) {
        *self.outcome.lock() = Some(outcome);
        self.done.notify_all();
    }

    fn wait(&self) -> LoadOutcome {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(outcome) = outcome.as_ref() {
                return outcome.clone();
            }
            self.done.wait(&mut outcome);
        }
    }
}

/// Publishes a failure to the waiters if the loading thread unwinds.
struct LoadGuard<'a> {
    pool: &'a GridPool,
    source_id: &'a str,
    pending: &'a PendingLoad,
    finished: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.pool.pending.lock().remove(self.source_id);
        let cause = VolumeError::InvalidGrid("reader panicked while loading".into());
        self.pending
            .finish(Err(Arc::new(VolumeError::source_open(self.source_id, cause))));
    }
}

/// Cache mapping source identifiers to their loaded [`GridSet`]s.
///
/// The pool is an explicit context object: construct one per process, wrap it
/// in an `Arc`, and hand it to every consumer. Lookups of loaded sources take a
/// shared lock. Loads are tracked per source: concurrent requests for the same
/// new source share one load and its outcome, while unrelated sources load in
/// parallel.
pub struct GridPool {
    reader: Box<dyn GridReader>,
    options: PoolOptions,
    sets: RwLock<HashMap<String, PoolEntry>>,
    // Lock order: `pending` before `sets`.
    pending: Mutex<HashMap<String, Arc<PendingLoad>>>,
    load_count: AtomicUsize,
}

impl std::fmt::Debug for GridPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridPool")
            .field("options", &self.options)
            .field("sources", &self.source_ids())
            .field("load_count", &self.load_count())
            .finish_non_exhaustive()
    }
}

impl GridPool {
    /// Creates an empty pool with default options.
    pub fn new(reader: impl GridReader + 'static) -> Self {
        Self::with_options(reader, PoolOptions::default())
    }

    /// Creates an empty pool.
    pub fn with_options(reader: impl GridReader + 'static, options: PoolOptions) -> Self {
        Self {
            reader: Box::new(reader),
            options,
            sets: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            load_count: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Returns the loaded set for `source_id` without loading it.
    #[must_use]
    pub fn get(&self, source_id: &str) -> Option<Arc<GridSet>> {
        self.sets
            .read()
            .get(source_id)
            .map(|entry| Arc::clone(&entry.set))
    }

    /// Returns the set for `source_id`, loading it on first use.
    ///
    /// A failed load inserts nothing; the next call retries.
    ///
    /// No lease is taken. A source loaded here is never released by
    /// [`EvictionPolicy::LastConsumer`] on its own: it leaves the pool when a
    /// lease acquired later is dropped, or through [`evict`](Self::evict),
    /// [`evict_unused`](Self::evict_unused) or [`clear`](Self::clear).
    pub fn resolve(&self, source_id: &str) -> Result<Arc<GridSet>> {
        if let Some(set) = self.get(source_id) {
            log::debug!("grid pool hit for [{source_id}]");
            return Ok(set);
        }
        self.load_and_insert(source_id, false)
    }

    /// Resolves `source_id` and registers a consumer of it.
    ///
    /// The returned lease keeps the source counted as in use until dropped.
    /// Under [`EvictionPolicy::LastConsumer`] the source leaves the pool when
    /// its last lease is dropped.
    pub fn acquire(self: &Arc<Self>, source_id: &str) -> Result<SourceLease> {
        let set = match self.lease_resident(source_id, true) {
            Some(set) => {
                log::debug!("grid pool hit for [{source_id}]");
                set
            }
            None => self.load_and_insert(source_id, true)?,
        };
        Ok(SourceLease {
            pool: Arc::clone(self),
            set,
        })
    }

    fn lease_resident(&self, source_id: &str, lease: bool) -> Option<Arc<GridSet>> {
        let mut sets = self.sets.write();
        sets.get_mut(source_id).map(|entry| {
            if lease {
                entry.leases += 1;
            }
            Arc::clone(&entry.set)
        })
    }

    fn load_and_insert(&self, source_id: &str, lease: bool) -> Result<Arc<GridSet>> {
        let (pending, leader) = {
            let mut pending = self.pending.lock();
            // A finished load inserts its set before clearing its pending slot.
            if let Some(set) = self.lease_resident(source_id, lease) {
                return Ok(set);
            }
            match pending.get(source_id) {
                Some(load) => {
                    load.waiters.fetch_add(1, Ordering::SeqCst);
                    (Arc::clone(load), false)
                }
                None => {
                    let load = Arc::new(PendingLoad::default());
                    pending.insert(source_id.to_string(), Arc::clone(&load));
                    (load, true)
                }
            }
        };

        if !leader {
            log::debug!("waiting for the load of [{source_id}]");
            let set = pending.wait().map_err(VolumeError::Shared)?;
            return Ok(if lease {
                self.lease_loaded(source_id, set)
            } else {
                set
            });
        }

        let mut guard = LoadGuard {
            pool: self,
            source_id,
            pending: &pending,
            finished: false,
        };
        let outcome: LoadOutcome = self.load(source_id).map(Arc::new).map_err(Arc::new);
        {
            let mut pending_loads = self.pending.lock();
            if let Ok(set) = &outcome {
                self.sets.write().insert(
                    source_id.to_string(),
                    PoolEntry {
                        set: Arc::clone(set),
                        leases: usize::from(lease),
                    },
                );
            }
            pending_loads.remove(source_id);
        }
        pending.finish(outcome.clone());
        guard.finished = true;
        outcome.map_err(VolumeError::Shared)
    }

    /// Leases the set a waiter received, reinstating it if it was evicted meanwhile.
    fn lease_loaded(&self, source_id: &str, set: Arc<GridSet>) -> Arc<GridSet> {
        let mut sets = self.sets.write();
        if let Some(entry) = sets.get_mut(source_id) {
            entry.leases += 1;
            return Arc::clone(&entry.set);
        }
        sets.insert(
            source_id.to_string(),
            PoolEntry {
                set: Arc::clone(&set),
                leases: 1,
            },
        );
        set
    }

    fn load(&self, source_id: &str) -> Result<GridSet> {
        let file = self.reader.open(source_id).map_err(|e| {
            log::warn!("can't open the file [{source_id}]: {e}");
            VolumeError::source_open(source_id, e)
        })?;
        let set = GridSet::load(source_id, file, self.options.materialization).map_err(|e| {
            log::warn!("can't read the file [{source_id}]: {e}");
            VolumeError::source_open(source_id, e)
        })?;
        self.load_count.fetch_add(1, Ordering::SeqCst);
        log::info!(
            "loaded [{}]: {} field(s) {:?}",
            source_id,
            set.len(),
            set.field_names().collect::<Vec<_>>()
        );
        Ok(set)
    }

    fn release(&self, lease: &SourceLease) {
        let mut sets = self.sets.write();
        let source_id = lease.set.source_id();
        let Some(entry) = sets.get_mut(source_id) else {
            return;
        };
        // The entry may have been evicted and reloaded since this lease was taken.
        if !Arc::ptr_eq(&entry.set, &lease.set) {
            return;
        }
        entry.leases = entry.leases.saturating_sub(1);
        if entry.leases == 0 && self.options.eviction == EvictionPolicy::LastConsumer {
            sets.remove(source_id);
            log::info!("evicted [{source_id}] after its last consumer was released");
        }
    }

    #[cfg(test)]
    fn waiting_on(&self, source_id: &str) -> usize {
        self.pending
            .lock()
            .get(source_id)
            .map_or(0, |load| load.waiters.load(Ordering::SeqCst))
    }

    /// Returns true if `source_id` is loaded.
    #[must_use]
    pub fn contains(&self, source_id: &str) -> bool {
        self.sets.read().contains_key(source_id)
    }

    /// Number of loaded sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.read().is_empty()
    }

    /// Identifiers of the loaded sources, sorted.
    #[must_use]
    pub fn source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sets.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of leases currently held on `source_id`.
    #[must_use]
    pub fn lease_count(&self, source_id: &str) -> usize {
        self.sets.read().get(source_id).map_or(0, |entry| entry.leases)
    }

    /// Number of successful source loads performed by this pool.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }

    /// Approximate resident voxel memory across all loaded sources.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.sets
            .read()
            .values()
            .map(|entry| entry.set.memory_usage())
            .sum()
    }

    /// Removes `source_id` from the pool. Existing consumers keep their grids.
    pub fn evict(&self, source_id: &str) -> bool {
        let removed = self.sets.write().remove(source_id).is_some();
        if removed {
            log::info!("evicted [{source_id}]");
        }
        removed
    }

    /// Removes every source that has no outstanding leases. Returns how many were removed.
    pub fn evict_unused(&self) -> usize {
        let mut sets = self.sets.write();
        let before = sets.len();
        sets.retain(|_, entry| entry.leases > 0);
        let removed = before - sets.len();
        if removed > 0 {
            log::info!("evicted {removed} unused source(s)");
        }
        removed
    }

    /// Removes every source. Existing consumers keep their grids.
    pub fn clear(&self) {
        self.sets.write().clear();
    }
}

/// A consumer's registration on one loaded source.
///
/// Obtained from [`GridPool::acquire`]; releases itself on drop.
pub struct SourceLease {
    pool: Arc<GridPool>,
    set: Arc<GridSet>,
}

impl SourceLease {
    /// The leased grid set.
    #[must_use]
    pub fn set(&self) -> &Arc<GridSet> {
        &self.set
    }

    /// The pool this lease was taken from.
    #[must_use]
    pub fn pool(&self) -> &Arc<GridPool> {
        &self.pool
    }

    #[must_use]
    pub fn source_id(&self) -> &str {
        self.set.source_id()
    }
}

impl std::fmt::Debug for SourceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceLease")
            .field("source_id", &self.source_id())
            .finish_non_exhaustive()
    }
}

impl Drop for SourceLease {
    fn drop(&mut self) {
        self.pool.release(self);
    }
}
