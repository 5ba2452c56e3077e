//! Process-wide default pool.
//!
//! Consumers normally receive their [`GridPool`] explicitly. Hosts that cannot
//! thread a pool through (e.g. plugin factories) may install one default pool
//! per process here and look it up by calling [`global_pool`].

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::error::{Result, VolumeError};
use crate::pool::GridPool;

/// Global pool slot.
static POOL: OnceLock<RwLock<Option<Arc<GridPool>>>> = OnceLock::new();

fn slot() -> &'static RwLock<Option<Arc<GridPool>>> {
    POOL.get_or_init(|| RwLock::new(None))
}

/// Installs the process-wide pool.
///
/// Returns an error if a pool is already installed.
pub fn init_pool(pool: Arc<GridPool>) -> Result<()> {
    let mut slot = slot().write();
    if slot.is_some() {
        return Err(VolumeError::AlreadyInitialized);
    }
    *slot = Some(pool);
    Ok(())
}

/// Returns whether a process-wide pool is installed.
pub fn is_initialized() -> bool {
    slot().read().is_some()
}

/// Returns the process-wide pool.
pub fn global_pool() -> Result<Arc<GridPool>> {
    try_global_pool().ok_or(VolumeError::NotInitialized)
}

/// Returns the process-wide pool, or `None` if none is installed.
pub fn try_global_pool() -> Option<Arc<GridPool>> {
    slot().read().clone()
}

/// Uninstalls the process-wide pool and clears its cache.
///
/// Consumers that still hold grids keep them alive; a new pool may be
/// installed afterwards.
pub fn shutdown_pool() {
    if let Some(pool) = slot().write().take() {
        pool.clear();
    }
}
