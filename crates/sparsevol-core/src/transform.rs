//! Affine index-to-world transform of a grid.

use glam::{Mat4, Vec3, Vec4};

use crate::bounds::{Aabb, IndexBox};
use crate::error::{Result, VolumeError};

/// Maps continuous index coordinates (voxel centers at integers) to world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    index_to_world: Mat4,
    world_to_index: Mat4,
}

impl Default for GridTransform {
    fn default() -> Self {
        Self {
            index_to_world: Mat4::IDENTITY,
            world_to_index: Mat4::IDENTITY,
        }
    }
}

impl GridTransform {
    /// Creates an axis-aligned transform with the given voxel size, placing
    /// voxel `(0, 0, 0)` at `origin`.
    pub fn from_voxel_size(voxel_size: Vec3, origin: Vec3) -> Result<Self> {
        if !voxel_size.is_finite() || voxel_size.cmple(Vec3::ZERO).any() {
            return Err(VolumeError::InvalidGrid(format!(
                "voxel size must be positive, got {voxel_size}"
            )));
        }
        Self::from_matrix(Mat4::from_scale_rotation_translation(
            voxel_size,
            glam::Quat::IDENTITY,
            origin,
        ))
    }

    /// Creates a transform from an index-to-world matrix.
    ///
    /// The matrix must be affine (last row `0 0 0 1`) and invertible.
    pub fn from_matrix(index_to_world: Mat4) -> Result<Self> {
        if index_to_world.row(3) != Vec4::W {
            return Err(VolumeError::InvalidGrid(
                "index-to-world matrix is not affine".into(),
            ));
        }
        let det = index_to_world.determinant();
        if !det.is_finite() || det.abs() <= f32::EPSILON * f32::EPSILON {
            return Err(VolumeError::InvalidGrid(
                "index-to-world matrix is singular".into(),
            ));
        }
        Ok(Self {
            index_to_world,
            world_to_index: index_to_world.inverse(),
        })
    }

    #[must_use]
    pub fn index_to_world_matrix(&self) -> Mat4 {
        self.index_to_world
    }

    #[must_use]
    pub fn world_to_index_matrix(&self) -> Mat4 {
        self.world_to_index
    }

    /// Maps an index-space point to world space.
    #[must_use]
    pub fn index_to_world(&self, ijk: Vec3) -> Vec3 {
        self.index_to_world.transform_point3(ijk)
    }

    /// Maps a world-space point to continuous index space.
    #[must_use]
    pub fn world_to_index(&self, p: Vec3) -> Vec3 {
        self.world_to_index.transform_point3(p)
    }

    /// World-space extent of one voxel along each index axis.
    #[must_use]
    pub fn voxel_size(&self) -> Vec3 {
        Vec3::new(
            self.index_to_world.x_axis.truncate().length(),
            self.index_to_world.y_axis.truncate().length(),
            self.index_to_world.z_axis.truncate().length(),
        )
    }

    /// World-space box containing every corner of `bbox`.
    #[must_use]
    pub fn world_bbox(&self, bbox: &IndexBox) -> Aabb {
        Aabb::from_points(bbox.corners().map(|c| self.index_to_world(c)))
    }
}
