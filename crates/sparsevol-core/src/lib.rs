//! Core abstractions for sparsevol.
//!
//! This crate provides the data structures behind the volume data sources:
//! - [`Grid`]: a sparse scalar voxel tree with its index-to-world transform
//! - [`GridSet`]: the named fields of one source file
//! - [`GridPool`]: the load-once, share-many cache of grid sets
//! - [`GridReader`] / [`GridFile`]: the traits file backends implement

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod bounds;
pub mod error;
pub mod grid;
pub mod grid_set;
pub mod options;
pub mod pool;
pub mod reader;
pub mod state;
pub mod transform;
pub mod tree;

pub use bounds::{Aabb, IndexBox};
pub use error::{Result, VolumeError};
pub use grid::Grid;
pub use grid_set::GridSet;
pub use options::{EvictionPolicy, Materialization, PoolOptions};
pub use pool::{GridPool, SourceLease};
pub use reader::{GridFile, GridMetadata, GridReader};
pub use state::{global_pool, init_pool, shutdown_pool, try_global_pool};
pub use transform::GridTransform;
pub use tree::{SparseTree, ValueAccessor};

// Re-export glam types for convenience
pub use glam::{IVec3, Mat4, Vec3};
