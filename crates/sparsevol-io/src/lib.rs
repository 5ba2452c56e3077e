//! Grid readers for sparsevol.
//!
//! - [`JsonGridReader`]: opens `svol.json` documents from disk
//! - [`MemoryReader`]: serves grids registered in memory

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod json;
pub mod memory;

pub use json::{JsonGridFile, JsonGridReader, SvolDocument, SvolGrid, SvolTransform};
pub use memory::MemoryReader;
