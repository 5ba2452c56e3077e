//! Initialization and lifecycle of the process-wide pool.
//!
//! Most code should construct a [`GridPool`] and pass it around explicitly.
//! These functions manage an optional default pool for hosts whose plugin
//! factories cannot receive one, and which then use [`VolumeSource::open`].
//!
//! [`VolumeSource::open`]: crate::VolumeSource::open

use std::sync::Arc;

use sparsevol_core::{GridPool, GridReader, PoolOptions};
use sparsevol_io::JsonGridReader;

use crate::Result;

/// Installs a process-wide pool reading `svol.json` files, with default options.
///
/// # Errors
///
/// Returns an error if a pool is already installed.
///
/// # Example
///
/// ```no_run
/// use sparsevol::*;
///
/// fn main() -> Result<()> {
///     init()?;
///     let smoke = VolumeSource::open("smoke.svol.json", "density", None)?;
///     println!("max density {}", smoke.max_value());
///     Ok(())
/// }
/// ```
pub fn init() -> Result<Arc<GridPool>> {
    init_with_options(PoolOptions::default())
}

/// Installs a process-wide pool reading `svol.json` files.
pub fn init_with_options(options: PoolOptions) -> Result<Arc<GridPool>> {
    init_with_reader(JsonGridReader, options)
}

/// Installs a process-wide pool using a custom reader.
pub fn init_with_reader(
    reader: impl GridReader + 'static,
    options: PoolOptions,
) -> Result<Arc<GridPool>> {
    let pool = Arc::new(GridPool::with_options(reader, options));
    sparsevol_core::init_pool(Arc::clone(&pool))?;
    log::info!("sparsevol initialized with {options:?}");
    Ok(pool)
}

/// Returns whether a process-wide pool is installed.
#[must_use]
pub fn is_initialized() -> bool {
    sparsevol_core::state::is_initialized()
}

/// Uninstalls the process-wide pool and drops its cached sources.
///
/// Sources already bound keep their grids alive until dropped. After calling
/// this, [`init()`] may be called again.
pub fn shutdown() {
    sparsevol_core::shutdown_pool();
    log::info!("sparsevol shut down");
}
