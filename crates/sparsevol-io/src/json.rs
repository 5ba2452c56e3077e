//! The `svol.json` document format.
//!
//! A document lists named scalar grids. Each grid carries its background value,
//! an index-to-world transform, an optional file-space bounding box, and its
//! active voxels as `[i, j, k, value]` entries:
//!
//! ```json
//! { "grids": [ { "name": "density", "background": 0.0,
//!                "transform": { "voxel_size": [0.1, 0.1, 0.1], "origin": [0, 0, 0] },
//!                "file_bbox": { "min": [0, 0, 0], "max": [1, 0, 0] },
//!                "voxels": [[0, 0, 0, 1.5], [1, 0, 0, 2.0]] } ] }
//! ```
//!
//! The transform may instead be given as `{ "matrix": [..16 floats, column-major..] }`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use glam::{IVec3, Mat4, Vec3};
use serde::{Deserialize, Serialize};
use sparsevol_core::{
    Grid, GridFile, GridMetadata, GridReader, GridTransform, IndexBox, Result, SparseTree,
    VolumeError,
};

/// Transform of a grid in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SvolTransform {
    /// Axis-aligned voxels of the given size, voxel `(0, 0, 0)` centered at `origin`.
    VoxelSize {
        voxel_size: Vec3,
        #[serde(default)]
        origin: Vec3,
    },
    /// Full index-to-world matrix in column-major order.
    Matrix { matrix: [f32; 16] },
}

impl Default for SvolTransform {
    fn default() -> Self {
        Self::VoxelSize {
            voxel_size: Vec3::ONE,
            origin: Vec3::ZERO,
        }
    }
}

impl SvolTransform {
    fn to_grid_transform(&self) -> Result<GridTransform> {
        match self {
            Self::VoxelSize { voxel_size, origin } => {
                GridTransform::from_voxel_size(*voxel_size, *origin)
            }
            Self::Matrix { matrix } => GridTransform::from_matrix(Mat4::from_cols_array(matrix)),
        }
    }
}

/// One grid in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvolGrid {
    pub name: String,
    #[serde(default)]
    pub background: f32,
    #[serde(default)]
    pub transform: SvolTransform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_bbox: Option<IndexBox>,
    #[serde(default)]
    pub voxels: Vec<(i32, i32, i32, f32)>,
}

impl SvolGrid {
    /// Captures an in-memory grid. Voxels are written in sorted index order.
    pub fn from_grid(grid: &Grid) -> Self {
        let mut voxels: Vec<(i32, i32, i32, f32)> = grid
            .tree()
            .iter_active()
            .map(|(ijk, v)| (ijk.x, ijk.y, ijk.z, v))
            .collect();
        voxels.sort_by_key(|&(i, j, k, _)| (i, j, k));
        Self {
            name: grid.name().to_string(),
            background: grid.background(),
            transform: SvolTransform::Matrix {
                matrix: grid.transform().index_to_world_matrix().to_cols_array(),
            },
            file_bbox: grid.file_bbox(),
            voxels,
        }
    }

    fn coords(&self) -> impl Iterator<Item = IVec3> + '_ {
        self.voxels.iter().map(|&(i, j, k, _)| IVec3::new(i, j, k))
    }

    /// Metadata of this grid, without building its tree.
    pub fn metadata(&self) -> Result<GridMetadata> {
        let transform = self.transform.to_grid_transform().map_err(|e| {
            VolumeError::InvalidGrid(format!("grid [{}]: {e}", self.name))
        })?;
        Ok(GridMetadata {
            name: self.name.clone(),
            transform,
            file_bbox: self.file_bbox.or_else(|| IndexBox::from_coords(self.coords())),
            background: self.background,
        })
    }

    /// Builds the in-memory grid.
    pub fn to_grid(&self) -> Result<Grid> {
        let meta = self.metadata()?;
        let tree = SparseTree::from_voxels(
            self.background,
            self.voxels
                .iter()
                .map(|&(i, j, k, v)| (IVec3::new(i, j, k), v)),
        );
        let grid = Grid::new(meta.name, tree, meta.transform);
        Ok(match meta.file_bbox {
            Some(bbox) => grid.with_file_bbox(bbox),
            None => grid,
        })
    }
}

/// A parsed `svol.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SvolDocument {
    pub grids: Vec<SvolGrid>,
}

impl SvolDocument {
    /// Parses a document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a document from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Captures a list of in-memory grids.
    pub fn from_grids<'a>(grids: impl IntoIterator<Item = &'a Grid>) -> Self {
        Self {
            grids: grids.into_iter().map(SvolGrid::from_grid).collect(),
        }
    }

    /// Writes the document to disk.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An opened `svol.json` file.
///
/// The whole document is parsed on open; grids are built on request. Building
/// a grid consumes its raw voxel list, so each grid can be read once.
#[derive(Debug)]
pub struct JsonGridFile {
    document: SvolDocument,
}

impl JsonGridFile {
    pub fn new(document: SvolDocument) -> Self {
        Self { document }
    }

    /// Number of grids not read yet.
    #[must_use]
    pub fn unread(&self) -> usize {
        self.document.grids.len()
    }
}

impl GridFile for JsonGridFile {
    fn read_all_metadata(&mut self) -> Result<Vec<GridMetadata>> {
        self.document.grids.iter().map(SvolGrid::metadata).collect()
    }

    fn read_grid(&mut self, name: &str) -> Result<Grid> {
        let index = self
            .document
            .grids
            .iter()
            .position(|g| g.name == name)
            .ok_or_else(|| VolumeError::InvalidGrid(format!("no grid named [{name}]")))?;
        let grid = self.document.grids[index].to_grid()?;
        self.document.grids.swap_remove(index);
        Ok(grid)
    }
}

/// Opens `svol.json` files from the local filesystem. Source ids are paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonGridReader;

impl GridReader for JsonGridReader {
    fn open(&self, source_id: &str) -> Result<Box<dyn GridFile>> {
        let document = SvolDocument::read(source_id)?;
        log::debug!(
            "parsed [{}]: {} grid(s)",
            source_id,
            document.grids.len()
        );
        Ok(Box::new(JsonGridFile::new(document)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMOKE: &str = r#"{
        "grids": [
            { "name": "density",
              "transform": { "voxel_size": [0.5, 0.5, 0.5], "origin": [1, 0, 0] },
              "voxels": [[0, 0, 0, 1.5], [2, 1, 0, 3.0]] },
            { "name": "temperature", "background": 0.25,
              "transform": { "matrix": [2,0,0,0, 0,2,0,0, 0,0,2,0, 0,0,0,1] },
              "file_bbox": { "min": [-1, -1, -1], "max": [4, 4, 4] },
              "voxels": [[3, 3, 3, 900.0]] }
        ]
    }"#;

    #[test]
    fn test_parse_metadata() {
        let mut file = JsonGridFile::new(SvolDocument::from_json(SMOKE).unwrap());
        let meta = file.read_all_metadata().unwrap();
        assert_eq!(meta.len(), 2);

        assert_eq!(meta[0].name, "density");
        assert_eq!(
            meta[0].file_bbox,
            Some(IndexBox::new(IVec3::ZERO, IVec3::new(2, 1, 0)))
        );
        assert_eq!(meta[0].world_bbox().min, Vec3::new(1.0, 0.0, 0.0));

        assert_eq!(meta[1].background, 0.25);
        assert_eq!(
            meta[1].file_bbox,
            Some(IndexBox::new(IVec3::splat(-1), IVec3::splat(4)))
        );
        assert!((meta[1].transform.voxel_size() - Vec3::splat(2.0)).length() < 1e-6);
    }

    #[test]
    fn test_read_grid() {
        let mut file = JsonGridFile::new(SvolDocument::from_json(SMOKE).unwrap());
        let grid = file.read_grid("density").unwrap();
        assert_eq!(grid.active_voxel_count(), 2);
        assert!((grid.sample_world(Vec3::new(1.0, 0.0, 0.0)) - 1.5).abs() < 1e-4);
        assert_eq!(grid.eval_min_max(), (1.5, 3.0));

        let grid = file.read_grid("temperature").unwrap();
        assert_eq!(grid.background(), 0.25);
        assert_eq!(grid.file_bbox().unwrap().min, IVec3::splat(-1));

        assert!(file.read_grid("velocity").is_err());
    }

    #[test]
    fn test_read_grid_releases_raw_voxels() {
        let mut file = JsonGridFile::new(SvolDocument::from_json(SMOKE).unwrap());
        assert_eq!(file.unread(), 2);

        file.read_grid("temperature").unwrap();
        assert_eq!(file.unread(), 1);
        assert!(file.read_grid("temperature").is_err());

        let density = file.read_grid("density").unwrap();
        assert_eq!(density.active_voxel_count(), 2);
        assert_eq!(file.unread(), 0);
    }

    #[test]
    fn test_defaults_for_missing_keys() {
        let doc = SvolDocument::from_json(r#"{ "grids": [ { "name": "empty" } ] }"#).unwrap();
        let grid = doc.grids[0].to_grid().unwrap();
        assert_eq!(grid.background(), 0.0);
        assert_eq!(grid.voxel_size(), Vec3::ONE);
        assert!(grid.file_bbox().is_none());
    }

    #[test]
    fn test_singular_transform_rejected() {
        let doc = SvolDocument::from_json(
            r#"{ "grids": [ { "name": "flat", "transform": { "voxel_size": [1, 0, 1] } } ] }"#,
        )
        .unwrap();
        let mut file = JsonGridFile::new(doc);
        let err = file.read_all_metadata().unwrap_err();
        assert!(err.to_string().contains("flat"));
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(SvolDocument::from_json(r#"{ "grids": [ { "voxels": 3 } ] }"#).is_err());
        assert!(SvolDocument::from_json("not json").is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let doc = SvolDocument::from_json(SMOKE).unwrap();
        let grids: Vec<Grid> = doc.grids.iter().map(|g| g.to_grid().unwrap()).collect();
        let path = std::env::temp_dir().join(format!(
            "sparsevol-io-roundtrip-{}.svol.json",
            std::process::id()
        ));
        SvolDocument::from_grids(&grids).write(&path).unwrap();

        let mut file = JsonGridReader.open(path.to_str().unwrap()).unwrap();
        let meta = file.read_all_metadata().unwrap();
        assert_eq!(meta[1].file_bbox.unwrap().max, IVec3::splat(4));
        let density = file.read_grid("density").unwrap();
        assert!((density.sample_world(Vec3::new(2.0, 0.5, 0.0)) - 3.0).abs() < 1e-4);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = JsonGridReader
            .open("/nonexistent/sparsevol/smoke.svol.json")
            .err()
            .unwrap();
        assert!(matches!(err, VolumeError::IoError(_)));
    }
}
