//! Volume data source backed by one field of a pooled source file.
//!
//! A [`VolumeSource`] binds a (source, field) pair to a [`GridPool`]. Creating
//! one resolves the source through the pool, so many sources naming the same
//! file share a single load and the exact same in-memory grid.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sparsevol::*;
//!
//! fn main() -> Result<()> {
//!     let pool = Arc::new(GridPool::new(JsonGridReader));
//!     let smoke = VolumeSource::new(&pool, "smoke.svol.json", "density", None)?;
//!
//!     let density = smoke.lookup_scalar(Vec3::new(0.5, 1.0, 0.5));
//!     let step = smoke.step_size();
//!     println!("density {density}, step {step}, bounds {:?}", smoke.bounding_box());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use sparsevol_core::{Aabb, Grid, GridPool, Result, SourceLease, Vec3};

use crate::data_source::VolumeDataSource;
use crate::descriptor::VolumeSourceDescriptor;

/// Step size used when no grid is available.
pub const DEFAULT_STEP_SIZE: f32 = 1.0;

/// Fraction of the finest voxel extent used as the default step size.
pub const STEP_SIZE_FACTOR: f32 = 0.5;

/// Maximum value reported for a field without active voxels.
pub const NO_DATA_MAX_VALUE: f32 = -1.0;

fn step_size_of(grid: Option<&Grid>, custom_step_size: Option<f32>) -> f32 {
    if let Some(step) = custom_step_size {
        return step;
    }
    grid.map_or(DEFAULT_STEP_SIZE, |grid| {
        grid.voxel_size().min_element() * STEP_SIZE_FACTOR
    })
}

fn max_value_of(grid: Option<&Grid>) -> Option<f32> {
    grid.filter(|grid| !grid.tree().is_empty())
        .map(|grid| grid.eval_min_max().1)
}

fn lookup_scalar_of(grid: Option<&Grid>, p: Vec3) -> f32 {
    grid.map_or(0.0, |grid| grid.sample_world(p))
}

/// A scalar volume data source reading one field of a pooled source.
pub struct VolumeSource {
    field_name: String,
    custom_step_size: Option<f32>,
    bbox: Aabb,
    grid: Arc<Grid>,
    lease: SourceLease,
}

impl VolumeSource {
    /// Binds `field_name` of `source_id`, loading the source if needed.
    ///
    /// `custom_step_size` overrides the derived step size when positive.
    ///
    /// # Errors
    ///
    /// An error for which [`is_source_open`](sparsevol_core::VolumeError::is_source_open)
    /// holds if the source cannot be loaded, and
    /// [`VolumeError::FieldNotFound`](sparsevol_core::VolumeError::FieldNotFound)
    /// if it loads but has no such field.
    pub fn new(
        pool: &Arc<GridPool>,
        source_id: &str,
        field_name: &str,
        custom_step_size: Option<f32>,
    ) -> Result<Self> {
        let lease = pool.acquire(source_id).inspect_err(|e| log::error!("{e}"))?;
        let grid = lease
            .set()
            .get(field_name)
            .inspect_err(|e| log::error!("{e}"))?;
        let bbox = lease.set().bounding_box();
        log::debug!("bound field [{field_name}] of [{source_id}]");

        Ok(Self {
            field_name: field_name.to_string(),
            custom_step_size: custom_step_size.filter(|s| s.is_finite() && *s > 0.0),
            bbox,
            grid,
            lease,
        })
    }

    /// Binds a source using the process-wide pool installed by [`init`](crate::init).
    pub fn open(source_id: &str, field_name: &str, custom_step_size: Option<f32>) -> Result<Self> {
        let pool = sparsevol_core::global_pool()?;
        Self::new(&pool, source_id, field_name, custom_step_size)
    }

    /// Rebinds a serialized source identity against `pool`.
    pub fn from_descriptor(pool: &Arc<GridPool>, descriptor: &VolumeSourceDescriptor) -> Result<Self> {
        Self::new(
            pool,
            &descriptor.filename,
            &descriptor.fieldname,
            descriptor.custom_step_size,
        )
    }

    /// The identity of this source, for serialization.
    #[must_use]
    pub fn descriptor(&self) -> VolumeSourceDescriptor {
        VolumeSourceDescriptor {
            filename: self.source_id().to_string(),
            fieldname: self.field_name.clone(),
            custom_step_size: self.custom_step_size,
        }
    }

    #[must_use]
    pub fn source_id(&self) -> &str {
        self.lease.source_id()
    }

    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// The step size override, if one was given.
    #[must_use]
    pub fn custom_step_size(&self) -> Option<f32> {
        self.custom_step_size
    }

    /// The shared grid this source samples.
    #[must_use]
    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    /// The pool this source was resolved through.
    #[must_use]
    pub fn pool(&self) -> &Arc<GridPool> {
        self.lease.pool()
    }

    /// Trilinearly interpolated field value at a world-space point.
    #[must_use]
    pub fn lookup_scalar(&self, p: Vec3) -> f32 {
        lookup_scalar_of(Some(&*self.grid), p)
    }

    /// World-space ray-marching step: the override if given, otherwise half the
    /// smallest voxel extent.
    #[must_use]
    pub fn step_size(&self) -> f32 {
        step_size_of(Some(&*self.grid), self.custom_step_size)
    }

    /// Largest active value of the field, or `None` if it has no active voxels.
    #[must_use]
    pub fn try_max_value(&self) -> Option<f32> {
        max_value_of(Some(&*self.grid))
    }

    /// Largest active value of the field, or [`NO_DATA_MAX_VALUE`] if it has no
    /// active voxels.
    #[must_use]
    pub fn max_value(&self) -> f32 {
        self.try_max_value().unwrap_or(NO_DATA_MAX_VALUE)
    }

    /// Union of the world bounds of every field in the source file.
    #[must_use]
    pub fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}

impl VolumeDataSource for VolumeSource {
    fn supports_scalar_lookup(&self) -> bool {
        true
    }

    fn supports_vector_lookup(&self) -> bool {
        false
    }

    fn lookup_scalar(&self, p: Vec3) -> f32 {
        VolumeSource::lookup_scalar(self, p)
    }

    fn step_size(&self) -> f32 {
        VolumeSource::step_size(self)
    }

    fn max_value(&self) -> f32 {
        VolumeSource::max_value(self)
    }

    fn bounding_box(&self) -> Aabb {
        VolumeSource::bounding_box(self)
    }
}

impl std::fmt::Debug for VolumeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeSource")
            .field("source_id", &self.source_id())
            .field("field_name", &self.field_name)
            .field("custom_step_size", &self.custom_step_size)
            .field("bbox", &self.bbox)
            .finish_non_exhaustive()
    }
}
