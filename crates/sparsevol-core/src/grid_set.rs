//! The named fields of one loaded source.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::bounds::Aabb;
use crate::error::{Result, VolumeError};
use crate::grid::Grid;
use crate::options::Materialization;
use crate::reader::{GridFile, GridMetadata};

struct FieldSlot {
    metadata: GridMetadata,
    grid: OnceLock<Arc<Grid>>,
}

/// Field name to grid mapping for one source.
///
/// The field list and the union bounding box are fixed when the set is loaded.
/// Voxel data of a field is read from the still-open file the first time the
/// field is requested, at most once. The file is closed as soon as every field
/// has been read.
pub struct GridSet {
    source_id: String,
    fields: HashMap<String, FieldSlot>,
    order: Vec<String>,
    bbox: Aabb,
    file: Mutex<Option<Box<dyn GridFile>>>,
}

impl std::fmt::Debug for GridSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridSet")
            .field("source_id", &self.source_id)
            .field("fields", &self.order)
            .field("bbox", &self.bbox)
            .finish_non_exhaustive()
    }
}

impl GridSet {
    /// Enumerates the fields of an open file and builds the set.
    ///
    /// With [`Materialization::Eager`] every field is read before returning
    /// and the file is closed.
    pub fn load(
        source_id: impl Into<String>,
        mut file: Box<dyn GridFile>,
        materialization: Materialization,
    ) -> Result<Self> {
        let source_id = source_id.into();
        let metadata = file.read_all_metadata()?;

        let mut fields = HashMap::with_capacity(metadata.len());
        let mut order = Vec::with_capacity(metadata.len());
        let mut bbox = Aabb::EMPTY;
        for meta in metadata {
            bbox = bbox.union(meta.world_bbox());
            if fields.contains_key(&meta.name) {
                log::warn!(
                    "duplicate field [{}] in [{}], keeping the first",
                    meta.name,
                    source_id
                );
                continue;
            }
            order.push(meta.name.clone());
            fields.insert(
                meta.name.clone(),
                FieldSlot {
                    metadata: meta,
                    grid: OnceLock::new(),
                },
            );
        }

        let file = match materialization {
            Materialization::Lazy => (!order.is_empty()).then_some(file),
            Materialization::Eager => {
                for name in &order {
                    let grid = file.read_grid(name).map_err(|e| VolumeError::FieldRead {
                        source_id: source_id.clone(),
                        field: name.clone(),
                        cause: Box::new(e),
                    })?;
                    if let Some(slot) = fields.get(name) {
                        let _ = slot.grid.set(Arc::new(grid));
                    }
                }
                None
            }
        };

        Ok(Self {
            source_id,
            fields,
            order,
            bbox,
            file: Mutex::new(file),
        })
    }

    /// Builds a fully materialized set from grids already in memory.
    pub fn from_grids(source_id: impl Into<String>, grids: impl IntoIterator<Item = Grid>) -> Self {
        let mut fields = HashMap::new();
        let mut order = Vec::new();
        let mut bbox = Aabb::EMPTY;
        for grid in grids {
            let metadata = GridMetadata::from_grid(&grid);
            bbox = bbox.union(metadata.world_bbox());
            if fields.contains_key(&metadata.name) {
                continue;
            }
            order.push(metadata.name.clone());
            let slot = FieldSlot {
                metadata,
                grid: OnceLock::from(Arc::new(grid)),
            };
            fields.insert(slot.metadata.name.clone(), slot);
        }
        Self {
            source_id: source_id.into(),
            fields,
            order,
            bbox,
            file: Mutex::new(None),
        }
    }

    /// The source identifier this set was loaded from.
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Looks up a field, materializing it on first request.
    pub fn get(&self, field: &str) -> Result<Arc<Grid>> {
        let slot = self
            .fields
            .get(field)
            .ok_or_else(|| VolumeError::FieldNotFound {
                source_id: self.source_id.clone(),
                field: field.to_string(),
            })?;
        if let Some(grid) = slot.grid.get() {
            return Ok(Arc::clone(grid));
        }

        let mut file = self.file.lock();
        // Another thread may have read it while we waited.
        if let Some(grid) = slot.grid.get() {
            return Ok(Arc::clone(grid));
        }
        let read_error = |cause: VolumeError| VolumeError::FieldRead {
            source_id: self.source_id.clone(),
            field: field.to_string(),
            cause: Box::new(cause),
        };
        let handle = file
            .as_mut()
            .ok_or_else(|| read_error(VolumeError::InvalidGrid("source file is closed".into())))?;
        let grid = Arc::new(handle.read_grid(field).map_err(read_error)?);
        log::debug!(
            "materialized field [{}] of [{}]: {} active voxels",
            field,
            self.source_id,
            grid.active_voxel_count()
        );
        let _ = slot.grid.set(Arc::clone(&grid));

        if self.fields.values().all(|slot| slot.grid.get().is_some()) {
            *file = None;
            log::debug!("closed [{}]: every field is materialized", self.source_id);
        }
        Ok(grid)
    }

    /// Returns true if the source advertises `field`.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns true if the voxel data of `field` has been read.
    #[must_use]
    pub fn is_materialized(&self, field: &str) -> bool {
        self.fields
            .get(field)
            .is_some_and(|slot| slot.grid.get().is_some())
    }

    /// Field names in file order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    #[must_use]
    pub fn metadata(&self, field: &str) -> Option<&GridMetadata> {
        self.fields.get(field).map(|slot| &slot.metadata)
    }

    /// Union of the world bounding boxes of every field in the source.
    #[must_use]
    pub fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns true while the source file is held open for lazy reads.
    #[must_use]
    pub fn is_file_open(&self) -> bool {
        self.file.lock().is_some()
    }

    /// Approximate resident voxel memory of the materialized fields.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.fields
            .values()
            .filter_map(|slot| slot.grid.get())
            .map(|grid| grid.memory_usage())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::IndexBox;
    use crate::transform::GridTransform;
    use crate::tree::SparseTree;
    use glam::{IVec3, Vec3};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestFile {
        grids: Vec<Grid>,
        reads: Arc<AtomicUsize>,
        fail_on: Option<&'static str>,
    }

    impl GridFile for TestFile {
        fn read_all_metadata(&mut self) -> Result<Vec<GridMetadata>> {
            Ok(self.grids.iter().map(GridMetadata::from_grid).collect())
        }

        fn read_grid(&mut self, name: &str) -> Result<Grid> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(name) {
                return Err(VolumeError::InvalidGrid("truncated leaf data".into()));
            }
            let grid = self
                .grids
                .iter()
                .find(|g| g.name() == name)
                .ok_or_else(|| VolumeError::InvalidGrid(name.to_string()))?;
            let tree = SparseTree::from_voxels(grid.background(), grid.tree().iter_active());
            Ok(Grid::new(name, tree, *grid.transform()))
        }
    }

    fn block(name: &str, at: IVec3) -> Grid {
        let tree = SparseTree::from_voxels(0.0, [(at, 1.0), (at + IVec3::ONE, 2.0)]);
        Grid::new(name, tree, GridTransform::default())
    }

    fn test_file(fail_on: Option<&'static str>) -> (Box<dyn GridFile>, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let file = TestFile {
            grids: vec![
                block("density", IVec3::ZERO),
                block("temperature", IVec3::splat(10)),
            ],
            reads: Arc::clone(&reads),
            fail_on,
        };
        (Box::new(file), reads)
    }

    #[test]
    fn test_lazy_reads_only_requested_field() {
        let (file, reads) = test_file(None);
        let set = GridSet::load("smoke", file, Materialization::Lazy).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(reads.load(Ordering::SeqCst), 0);

        let a = set.get("density").unwrap();
        let b = set.get("density").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(set.is_materialized("density"));
        assert!(!set.is_materialized("temperature"));
    }

    #[test]
    fn test_eager_reads_everything() {
        let (file, reads) = test_file(None);
        let set = GridSet::load("smoke", file, Materialization::Eager).unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert!(set.is_materialized("density"));
        assert!(set.is_materialized("temperature"));
        set.get("temperature").unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_eager_read_failure_fails_load() {
        let (file, _) = test_file(Some("temperature"));
        let err = GridSet::load("smoke", file, Materialization::Eager).unwrap_err();
        assert!(matches!(err, VolumeError::FieldRead { ref field, .. } if field == "temperature"));
    }

    #[test]
    fn test_missing_field() {
        let (file, _) = test_file(None);
        let set = GridSet::load("smoke", file, Materialization::Lazy).unwrap();
        let err = set.get("velocity").unwrap_err();
        assert!(err.is_field_not_found());
        assert!(!set.contains("velocity"));
    }

    #[test]
    fn test_bbox_is_union_of_all_fields() {
        let (file, _) = test_file(None);
        let set = GridSet::load("smoke", file, Materialization::Lazy).unwrap();
        let bbox = set.bounding_box();
        assert_eq!(bbox.min, Vec3::ZERO);
        assert_eq!(bbox.max, Vec3::splat(11.0));
        let names: Vec<&str> = set.field_names().collect();
        assert_eq!(names, vec!["density", "temperature"]);
    }

    #[test]
    fn test_from_grids() {
        let set = GridSet::from_grids(
            "mem",
            [
                block("a", IVec3::ZERO),
                block("b", IVec3::splat(-4)),
            ],
        );
        assert!(set.is_materialized("a"));
        assert_eq!(
            set.metadata("b").unwrap().file_bbox,
            Some(IndexBox::new(IVec3::splat(-4), IVec3::splat(-3)))
        );
        assert_eq!(set.bounding_box().min, Vec3::splat(-4.0));
        assert!(set.memory_usage() > 0);
    }

    #[test]
    fn test_file_closed_once_every_field_is_read() {
        let (file, reads) = test_file(None);
        let set = GridSet::load("smoke", file, Materialization::Lazy).unwrap();
        assert!(set.is_file_open());

        let density = set.get("density").unwrap();
        assert!(set.is_file_open());
        let temperature = set.get("temperature").unwrap();
        assert!(!set.is_file_open());
        // The file and its counter handle are gone.
        assert_eq!(Arc::strong_count(&reads), 1);

        assert_eq!(
            set.memory_usage(),
            density.memory_usage() + temperature.memory_usage()
        );
        // Materialized fields keep answering after the file is closed.
        assert!(Arc::ptr_eq(&set.get("density").unwrap(), &density));
    }

    #[test]
    fn test_eager_closes_file_at_load() {
        let (file, reads) = test_file(None);
        let set = GridSet::load("smoke", file, Materialization::Eager).unwrap();
        assert!(!set.is_file_open());
        assert_eq!(Arc::strong_count(&reads), 1);
    }
}
