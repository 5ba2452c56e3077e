//! sparsevol: shared sparse-voxel volume data for ray-marching renderers.
//!
//! Renderers that march rays through smoke, fire or clouds need point samples of
//! a scalar density field, a step size, and an upper bound of the density. This
//! crate answers those queries from sparse voxel grids read from disk, and makes
//! sure that every renderer object naming the same file shares one load.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sparsevol::*;
//!
//! fn main() -> Result<()> {
//!     let pool = Arc::new(GridPool::new(JsonGridReader));
//!
//!     // Both sources share one load of the file.
//!     let density = VolumeSource::new(&pool, "explosion.svol.json", "density", None)?;
//!     let heat = VolumeSource::new(&pool, "explosion.svol.json", "temperature", Some(0.05))?;
//!     assert_eq!(pool.load_count(), 1);
//!
//!     let p = Vec3::new(0.0, 1.0, 0.0);
//!     println!("{} {}", density.lookup_scalar(p), heat.lookup_scalar(p));
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - A [`GridPool`] maps source identifiers to loaded [`GridSet`]s and loads
//!   each source at most once.
//! - A [`GridSet`] holds the named fields of one file as shared [`Grid`]s.
//! - A [`VolumeSource`] binds one field of one source and implements
//!   [`VolumeDataSource`], the query surface the renderer consumes.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

mod data_source;
mod descriptor;
mod init;
mod volume_source;

pub use data_source::VolumeDataSource;
pub use descriptor::VolumeSourceDescriptor;
pub use init::{init, init_with_options, init_with_reader, is_initialized, shutdown};
pub use volume_source::{
    VolumeSource, DEFAULT_STEP_SIZE, NO_DATA_MAX_VALUE, STEP_SIZE_FACTOR,
};

// Re-export core types
pub use sparsevol_core::{
    error::{Result, VolumeError},
    options::{EvictionPolicy, Materialization, PoolOptions},
    Aabb, Grid, GridFile, GridMetadata, GridPool, GridReader, GridSet, GridTransform, IVec3,
    IndexBox, Mat4, SourceLease, SparseTree, Vec3,
};

// Re-export readers
pub use sparsevol_io::{JsonGridReader, MemoryReader, SvolDocument};
