//! Traits implemented by volumetric file backends.
//!
//! The pool never touches an on-disk format directly: it opens sources through a
//! [`GridReader`] and pulls metadata and grids out of the returned [`GridFile`].

use crate::bounds::{Aabb, IndexBox};
use crate::error::Result;
use crate::grid::Grid;
use crate::transform::GridTransform;

/// Per-field metadata available without materializing voxel data.
#[derive(Debug, Clone, PartialEq)]
pub struct GridMetadata {
    /// Field name, unique within its file.
    pub name: String,
    /// Index-to-world transform of the field.
    pub transform: GridTransform,
    /// File-space bounding box, `None` for an empty field.
    pub file_bbox: Option<IndexBox>,
    /// Value returned for inactive voxels.
    pub background: f32,
}

impl GridMetadata {
    /// Collects the metadata of an already materialized grid.
    pub fn from_grid(grid: &Grid) -> Self {
        Self {
            name: grid.name().to_string(),
            transform: *grid.transform(),
            file_bbox: grid.file_bbox(),
            background: grid.background(),
        }
    }

    /// World-space bounding box of this field.
    #[must_use]
    pub fn world_bbox(&self) -> Aabb {
        self.file_bbox
            .map_or(Aabb::EMPTY, |bbox| self.transform.world_bbox(&bbox))
    }
}

/// An open volumetric file.
pub trait GridFile: Send {
    /// Reads the metadata of every field in the file, in file order.
    fn read_all_metadata(&mut self) -> Result<Vec<GridMetadata>>;

    /// Materializes one named field.
    ///
    /// Called at most once per field, after [`read_all_metadata`](Self::read_all_metadata).
    /// Implementations may release the field's raw data once it is built.
    fn read_grid(&mut self, name: &str) -> Result<Grid>;
}

/// Opens volumetric files by source identifier.
pub trait GridReader: Send + Sync {
    /// Opens the file named by `source_id`.
    fn open(&self, source_id: &str) -> Result<Box<dyn GridFile>>;
}
