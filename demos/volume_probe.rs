//! Demo probing a sparse volume file the way a ray marcher would.
//!
//! Usage: `volume_probe [FILE] [FIELD] [X Y Z]`
//!
//! Without a file, writes a small spherical smoke puff to the temp directory
//! and probes that. Set `RUST_LOG=debug` to see pool activity.

#![allow(clippy::cast_precision_loss)]

use std::sync::Arc;

use sparsevol::{
    GridPool, GridTransform, IVec3, JsonGridReader, SparseTree, SvolDocument, Vec3, VolumeSource,
};

/// Writes a sphere of radius `r` voxels with density falling off to the rim.
fn write_puff(path: &std::path::Path, r: i32) -> sparsevol::Result<()> {
    let mut tree = SparseTree::new(0.0);
    for i in -r..=r {
        for j in -r..=r {
            for k in -r..=r {
                let d = IVec3::new(i, j, k).as_vec3().length() / r as f32;
                if d <= 1.0 {
                    tree.set_value(IVec3::new(i, j, k), 1.0 - d);
                }
            }
        }
    }
    let transform = GridTransform::from_voxel_size(Vec3::splat(0.1), Vec3::ZERO)?;
    let grid = sparsevol::Grid::new("density", tree, transform);
    SvolDocument::from_grids([&grid]).write(path)
}

fn main() -> sparsevol::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let path = if let Some(path) = args.first() {
        path.clone()
    } else {
        let path = std::env::temp_dir().join("sparsevol-puff.svol.json");
        write_puff(&path, 8)?;
        path.to_string_lossy().into_owned()
    };
    let field = args.get(1).map_or("density", String::as_str);
    let point = match args.get(2..5) {
        Some([x, y, z]) => Vec3::new(
            x.parse().unwrap_or(0.0),
            y.parse().unwrap_or(0.0),
            z.parse().unwrap_or(0.0),
        ),
        _ => Vec3::ZERO,
    };

    let pool = Arc::new(GridPool::new(JsonGridReader));
    let source = VolumeSource::new(&pool, &path, field, None)?;
    let bbox = source.bounding_box();

    println!("source     {}", source.source_id());
    println!("field      {}", source.field_name());
    println!("bounds     {} .. {}", bbox.min, bbox.max);
    println!("step size  {}", source.step_size());
    println!("max value  {}", source.max_value());
    println!("value at {point} = {}", source.lookup_scalar(point));

    // March along +x through the box center.
    let step = source.step_size();
    let start = Vec3::new(bbox.min.x, bbox.center().y, bbox.center().z);
    let mut optical_depth = 0.0;
    let mut t = 0.0;
    while start.x + t <= bbox.max.x {
        optical_depth += source.lookup_scalar(start + Vec3::X * t) * step;
        t += step;
    }
    println!("optical depth along +x = {optical_depth}");

    let other = VolumeSource::new(&pool, &path, field, Some(step * 4.0))?;
    println!(
        "second source shares the load: {} (loads = {})",
        Arc::ptr_eq(source.grid(), other.grid()),
        pool.load_count()
    );
    Ok(())
}
