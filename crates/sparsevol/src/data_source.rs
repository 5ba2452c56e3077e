//! The contract a ray-marching renderer expects from a volumetric data source.

use sparsevol_core::{Aabb, Vec3};

/// Point-query surface consumed by a ray-marching integrator.
///
/// All methods may be called concurrently from render worker threads.
pub trait VolumeDataSource: Send + Sync {
    /// Returns whether [`lookup_scalar`](Self::lookup_scalar) is meaningful.
    fn supports_scalar_lookup(&self) -> bool;

    /// Returns whether [`lookup_vector`](Self::lookup_vector) is meaningful.
    fn supports_vector_lookup(&self) -> bool;

    /// Interpolated scalar value at a world-space point.
    fn lookup_scalar(&self, p: Vec3) -> f32;

    /// Interpolated vector value at a world-space point.
    fn lookup_vector(&self, _p: Vec3) -> Vec3 {
        Vec3::ZERO
    }

    /// World-space distance between successive samples along a ray.
    fn step_size(&self) -> f32;

    /// Upper bound of the scalar values, used for transmittance estimation.
    fn max_value(&self) -> f32;

    /// World-space bounds of the data.
    fn bounding_box(&self) -> Aabb;
}
