//! In-memory grid: one named scalar field with its transform and metadata.

use std::sync::OnceLock;

use glam::{IVec3, Vec3};

use crate::bounds::{Aabb, IndexBox};
use crate::transform::GridTransform;
use crate::tree::SparseTree;

// Index coordinates beyond this are treated as outside any grid; keeps the
// neighbour offsets below clear of i32 overflow.
const MAX_INDEX_COORD: f32 = 1_073_741_824.0;

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// A named sparse scalar grid.
///
/// Grids are immutable once built and are shared between consumers through
/// `Arc<Grid>`. The value range is computed on first request and cached.
#[derive(Debug, Clone)]
pub struct Grid {
    name: String,
    tree: SparseTree,
    transform: GridTransform,
    file_bbox: Option<IndexBox>,
    value_range: OnceLock<(f32, f32)>,
}

impl Grid {
    /// Creates a grid. The file bounding box defaults to the active voxel bounds.
    pub fn new(name: impl Into<String>, tree: SparseTree, transform: GridTransform) -> Self {
        let file_bbox = tree.active_bbox();
        Self {
            name: name.into(),
            tree,
            transform,
            file_bbox,
            value_range: OnceLock::new(),
        }
    }

    /// Overrides the file-space bounding box recorded in the grid's metadata.
    #[must_use]
    pub fn with_file_bbox(mut self, bbox: IndexBox) -> Self {
        self.file_bbox = Some(bbox);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn tree(&self) -> &SparseTree {
        &self.tree
    }

    #[must_use]
    pub fn transform(&self) -> &GridTransform {
        &self.transform
    }

    #[must_use]
    pub fn voxel_size(&self) -> Vec3 {
        self.transform.voxel_size()
    }

    #[must_use]
    pub fn background(&self) -> f32 {
        self.tree.background()
    }

    /// File-space bounding box, or `None` for a grid with no data.
    #[must_use]
    pub fn file_bbox(&self) -> Option<IndexBox> {
        self.file_bbox
    }

    /// World-space bounding box of the file-space bounds.
    #[must_use]
    pub fn world_bbox(&self) -> Aabb {
        self.file_bbox
            .map_or(Aabb::EMPTY, |bbox| self.transform.world_bbox(&bbox))
    }

    #[must_use]
    pub fn active_voxel_count(&self) -> usize {
        self.tree.active_voxel_count()
    }

    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.tree.memory_usage()
    }

    /// Minimum and maximum over the active voxels.
    ///
    /// The first call scans the whole tree; later calls return the cached result.
    /// A grid without active voxels reports its background for both.
    pub fn eval_min_max(&self) -> (f32, f32) {
        *self.value_range.get_or_init(|| {
            let mut min = f32::MAX;
            let mut max = f32::MIN;
            for (_, v) in self.tree.iter_active() {
                if v.is_finite() {
                    min = min.min(v);
                    max = max.max(v);
                }
            }
            if min > max {
                (self.background(), self.background())
            } else {
                log::trace!("grid '{}' value range [{min}, {max}]", self.name);
                (min, max)
            }
        })
    }

    /// Trilinearly interpolates the eight voxels around a continuous index-space point.
    #[must_use]
    #[allow(clippy::many_single_char_names)]
    pub fn sample_index(&self, ijk: Vec3) -> f32 {
        if !ijk.is_finite() || ijk.abs().max_element() > MAX_INDEX_COORD {
            return self.background();
        }
        let base = ijk.floor();
        let t = ijk - base;
        let i = base.as_ivec3();
        let mut acc = self.tree.accessor();
        let mut v = |dx: i32, dy: i32, dz: i32| acc.get_value(i + IVec3::new(dx, dy, dz));

        let x00 = lerp(v(0, 0, 0), v(1, 0, 0), t.x);
        let x10 = lerp(v(0, 1, 0), v(1, 1, 0), t.x);
        let x01 = lerp(v(0, 0, 1), v(1, 0, 1), t.x);
        let x11 = lerp(v(0, 1, 1), v(1, 1, 1), t.x);
        let y0 = lerp(x00, x10, t.y);
        let y1 = lerp(x01, x11, t.y);
        lerp(y0, y1, t.z)
    }

    /// Samples the grid at a world-space point.
    #[must_use]
    pub fn sample_world(&self, p: Vec3) -> f32 {
        self.sample_index(self.transform.world_to_index(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn single_voxel_grid() -> Grid {
        let tree = SparseTree::from_voxels(0.0, [(IVec3::ZERO, 5.0)]);
        Grid::new("density", tree, GridTransform::default())
    }

    #[allow(clippy::cast_precision_loss)]
    fn ramp_grid() -> Grid {
        let mut tree = SparseTree::new(0.0);
        for i in 0..4 {
            for j in 0..4 {
                for k in 0..4 {
                    tree.set_value(IVec3::new(i, j, k), (i + j + k) as f32);
                }
            }
        }
        let xform = GridTransform::from_voxel_size(Vec3::splat(0.5), Vec3::ZERO).unwrap();
        Grid::new("ramp", tree, xform)
    }

    #[test]
    fn test_sample_at_voxel_center() {
        let grid = single_voxel_grid();
        assert_eq!(grid.sample_world(Vec3::ZERO), 5.0);
    }

    #[test]
    fn test_sample_falls_off_between_voxels() {
        let grid = single_voxel_grid();
        let v = grid.sample_world(Vec3::new(0.5, 0.0, 0.0));
        assert!((v - 2.5).abs() < 1e-6);
        let v = grid.sample_world(Vec3::new(-0.5, 0.5, 0.0));
        assert!((v - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_sample_far_away_is_background() {
        let grid = single_voxel_grid();
        assert_eq!(grid.sample_world(Vec3::splat(100.0)), 0.0);
        assert_eq!(grid.sample_world(Vec3::splat(f32::NAN)), 0.0);
        assert_eq!(grid.sample_world(Vec3::splat(1e30)), 0.0);
    }

    #[test]
    fn test_sample_linear_ramp_is_exact() {
        let grid = ramp_grid();
        // Index (1.5, 1.0, 0.25) is inside the fully populated region.
        let p = grid.transform().index_to_world(Vec3::new(1.5, 1.0, 0.25));
        assert!((grid.sample_world(p) - 2.75).abs() < 1e-4);
    }

    #[test]
    fn test_min_max_is_cached() {
        let grid = ramp_grid();
        assert_eq!(grid.eval_min_max(), (0.0, 9.0));
        assert_eq!(grid.eval_min_max(), (0.0, 9.0));
    }

    #[test]
    fn test_empty_grid_range_is_background() {
        let grid = Grid::new("empty", SparseTree::new(0.5), GridTransform::default());
        assert_eq!(grid.eval_min_max(), (0.5, 0.5));
        assert!(grid.file_bbox().is_none());
        assert!(grid.world_bbox().is_empty());
    }

    #[test]
    fn test_world_bbox_uses_file_bbox_override() {
        let xform = GridTransform::from_voxel_size(Vec3::splat(2.0), Vec3::ONE).unwrap();
        let grid = Grid::new("g", SparseTree::new(0.0), xform)
            .with_file_bbox(IndexBox::new(IVec3::ZERO, IVec3::new(1, 2, 3)));
        let bbox = grid.world_bbox();
        assert_eq!(bbox.min, Vec3::ONE);
        assert!((bbox.max - Vec3::new(3.0, 5.0, 7.0)).length() < 1e-5);
    }

    proptest! {
        #[test]
        fn prop_sample_within_value_range(
            x in -1.0f32..5.0, y in -1.0f32..5.0, z in -1.0f32..5.0
        ) {
            let grid = ramp_grid();
            let (min, max) = grid.eval_min_max();
            let v = grid.sample_world(Vec3::new(x, y, z));
            // Background 0.0 is also the minimum of the ramp.
            prop_assert!(v >= min - 1e-4 && v <= max + 1e-4);
        }
    }
}
