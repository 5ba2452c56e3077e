//! In-memory sources, for procedural volumes and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use sparsevol_core::{Grid, GridFile, GridMetadata, GridReader, Result, VolumeError};

#[derive(Default)]
struct Inner {
    sources: RwLock<HashMap<String, Arc<Vec<Grid>>>>,
    opens: AtomicUsize,
    grid_reads: AtomicUsize,
}

/// A reader serving grids registered in memory.
///
/// Clones share the same sources and counters, so a handle kept after giving
/// the reader to a pool can still register sources and observe opens.
#[derive(Clone, Default)]
pub struct MemoryReader {
    inner: Arc<Inner>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the grids served for `source_id`.
    pub fn insert(&self, source_id: impl Into<String>, grids: Vec<Grid>) {
        self.inner
            .sources
            .write()
            .insert(source_id.into(), Arc::new(grids));
    }

    /// Unregisters `source_id`. Later opens of it fail.
    pub fn remove(&self, source_id: &str) -> bool {
        self.inner.sources.write().remove(source_id).is_some()
    }

    /// Number of successful `open` calls.
    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// Number of grids materialized through files opened by this reader.
    pub fn grid_read_count(&self) -> usize {
        self.inner.grid_reads.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MemoryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<String> = self.inner.sources.read().keys().cloned().collect();
        ids.sort();
        f.debug_struct("MemoryReader")
            .field("sources", &ids)
            .field("opens", &self.open_count())
            .finish()
    }
}

struct MemoryFile {
    grids: Arc<Vec<Grid>>,
    inner: Arc<Inner>,
}

impl GridFile for MemoryFile {
    fn read_all_metadata(&mut self) -> Result<Vec<GridMetadata>> {
        Ok(self.grids.iter().map(GridMetadata::from_grid).collect())
    }

    fn read_grid(&mut self, name: &str) -> Result<Grid> {
        let grid = self
            .grids
            .iter()
            .find(|g| g.name() == name)
            .ok_or_else(|| VolumeError::InvalidGrid(format!("no grid named [{name}]")))?;
        self.inner.grid_reads.fetch_add(1, Ordering::SeqCst);
        Ok(grid.clone())
    }
}

impl GridReader for MemoryReader {
    fn open(&self, source_id: &str) -> Result<Box<dyn GridFile>> {
        let grids = self
            .inner
            .sources
            .read()
            .get(source_id)
            .cloned()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no in-memory source [{source_id}]"),
                )
            })?;
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryFile {
            grids,
            inner: Arc::clone(&self.inner),
        }))
    }
}
