//! Sparse voxel tree: a hash of dense 8³ leaf blocks.
//!
//! Only blocks that contain at least one active voxel are allocated. Reads of
//! inactive voxels return the tree's background value.

use std::collections::HashMap;

use glam::IVec3;

use crate::bounds::IndexBox;

/// log2 of the leaf edge length.
pub const LEAF_LOG2: i32 = 3;
/// Voxels along one edge of a leaf block.
pub const LEAF_DIM: i32 = 1 << LEAF_LOG2;
/// Voxels in one leaf block.
pub const LEAF_VOXELS: usize = (LEAF_DIM * LEAF_DIM * LEAF_DIM) as usize;

const MASK_WORDS: usize = LEAF_VOXELS / 64;

/// A dense block of voxels with a per-voxel active mask.
#[derive(Debug, Clone)]
struct LeafNode {
    values: [f32; LEAF_VOXELS],
    active: [u64; MASK_WORDS],
}

impl LeafNode {
    fn new(background: f32) -> Self {
        Self {
            values: [background; LEAF_VOXELS],
            active: [0; MASK_WORDS],
        }
    }

    fn is_active(&self, offset: usize) -> bool {
        self.active[offset >> 6] & (1u64 << (offset & 63)) != 0
    }

    fn set_active(&mut self, offset: usize, on: bool) {
        let bit = 1u64 << (offset & 63);
        if on {
            self.active[offset >> 6] |= bit;
        } else {
            self.active[offset >> 6] &= !bit;
        }
    }

    fn active_count(&self) -> usize {
        self.active.iter().map(|w| w.count_ones() as usize).sum()
    }
}

#[allow(clippy::cast_sign_loss)]
fn split(ijk: IVec3) -> (IVec3, usize) {
    let key = ijk >> LEAF_LOG2;
    let local = ijk & (LEAF_DIM - 1);
    let offset = ((local.x << (2 * LEAF_LOG2)) | (local.y << LEAF_LOG2) | local.z) as usize;
    (key, offset)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn join(key: IVec3, offset: usize) -> IVec3 {
    let offset = offset as i32;
    let local = IVec3::new(
        offset >> (2 * LEAF_LOG2),
        (offset >> LEAF_LOG2) & (LEAF_DIM - 1),
        offset & (LEAF_DIM - 1),
    );
    (key << LEAF_LOG2) + local
}

/// Sparse scalar voxel tree.
#[derive(Debug, Clone)]
pub struct SparseTree {
    background: f32,
    leaves: HashMap<IVec3, Box<LeafNode>>,
}

impl SparseTree {
    /// Creates an empty tree returning `background` everywhere.
    pub fn new(background: f32) -> Self {
        Self {
            background,
            leaves: HashMap::new(),
        }
    }

    /// Builds a tree from `(ijk, value)` pairs. Later duplicates overwrite earlier ones.
    pub fn from_voxels(background: f32, voxels: impl IntoIterator<Item = (IVec3, f32)>) -> Self {
        let mut tree = Self::new(background);
        for (ijk, value) in voxels {
            tree.set_value(ijk, value);
        }
        tree
    }

    #[must_use]
    pub fn background(&self) -> f32 {
        self.background
    }

    /// Sets the value of a voxel and marks it active.
    pub fn set_value(&mut self, ijk: IVec3, value: f32) {
        let (key, offset) = split(ijk);
        let background = self.background;
        let leaf = self
            .leaves
            .entry(key)
            .or_insert_with(|| Box::new(LeafNode::new(background)));
        leaf.values[offset] = value;
        leaf.set_active(offset, true);
    }

    /// Deactivates a voxel, resetting it to background. Empty leaves are released.
    pub fn set_inactive(&mut self, ijk: IVec3) {
        let (key, offset) = split(ijk);
        if let Some(leaf) = self.leaves.get_mut(&key) {
            leaf.values[offset] = self.background;
            leaf.set_active(offset, false);
            if leaf.active_count() == 0 {
                self.leaves.remove(&key);
            }
        }
    }

    /// Returns the voxel value, or background if the voxel is inactive.
    #[must_use]
    pub fn get_value(&self, ijk: IVec3) -> f32 {
        let (key, offset) = split(ijk);
        match self.leaves.get(&key) {
            Some(leaf) if leaf.is_active(offset) => leaf.values[offset],
            _ => self.background,
        }
    }

    #[must_use]
    pub fn is_active(&self, ijk: IVec3) -> bool {
        let (key, offset) = split(ijk);
        self.leaves.get(&key).is_some_and(|leaf| leaf.is_active(offset))
    }

    /// Number of allocated leaf blocks.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    #[must_use]
    pub fn active_voxel_count(&self) -> usize {
        self.leaves.values().map(|leaf| leaf.active_count()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Approximate resident size of the voxel data in bytes.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.leaves.len() * (std::mem::size_of::<LeafNode>() + std::mem::size_of::<IVec3>())
    }

    /// Iterates over all active voxels in unspecified order.
    pub fn iter_active(&self) -> impl Iterator<Item = (IVec3, f32)> + '_ {
        self.leaves.iter().flat_map(|(&key, leaf)| {
            (0..LEAF_VOXELS)
                .filter(move |&offset| leaf.is_active(offset))
                .map(move |offset| (join(key, offset), leaf.values[offset]))
        })
    }

    /// Returns a read accessor that caches the last visited leaf.
    pub fn accessor(&self) -> ValueAccessor<'_> {
        ValueAccessor {
            tree: self,
            cached: None,
        }
    }

    /// Index bounds of the active voxels, or `None` for an empty tree.
    #[must_use]
    pub fn active_bbox(&self) -> Option<IndexBox> {
        IndexBox::from_coords(self.iter_active().map(|(ijk, _)| ijk))
    }
}

/// Read accessor over a [`SparseTree`] remembering the last leaf it visited.
///
/// Lookups of neighbouring voxels mostly fall in the same leaf, which skips the
/// hash probe for all but the first of them. Missing leaves are cached too.
pub struct ValueAccessor<'a> {
    tree: &'a SparseTree,
    cached: Option<(IVec3, Option<&'a LeafNode>)>,
}

impl ValueAccessor<'_> {
    /// Same as [`SparseTree::get_value`].
    pub fn get_value(&mut self, ijk: IVec3) -> f32 {
        let (key, offset) = split(ijk);
        let leaf = match self.cached {
            Some((cached_key, leaf)) if cached_key == key => leaf,
            _ => {
                let leaf = self.tree.leaves.get(&key).map(Box::as_ref);
                self.cached = Some((key, leaf));
                leaf
            }
        };
        match leaf {
            Some(leaf) if leaf.is_active(offset) => leaf.values[offset],
            _ => self.tree.background,
        }
    }
}
