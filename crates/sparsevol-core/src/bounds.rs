//! Axis-aligned bounding boxes in world and index space.

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// The empty box. Expanding it by any point yields that point.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    /// Creates a box from two corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates the smallest box containing all `points`.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points
            .into_iter()
            .fold(Self::EMPTY, |bbox, p| bbox.expanded_by_point(p))
    }

    /// Returns true if no point has been added to this box.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Returns this box grown to include `p`.
    #[must_use]
    pub fn expanded_by_point(self, p: Vec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    /// Returns the union of two boxes.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns true if `p` lies inside the box (boundary included).
    #[must_use]
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Returns true if `other` lies entirely inside this box.
    #[must_use]
    pub fn contains_box(&self, other: &Self) -> bool {
        other.is_empty() || (self.contains(other.min) && self.contains(other.max))
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn extent(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }
}

/// Integer bounding box in index space. Both corners are inclusive voxel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexBox {
    pub min: IVec3,
    pub max: IVec3,
}

impl IndexBox {
    pub fn new(min: IVec3, max: IVec3) -> Self {
        Self { min, max }
    }

    /// Box covering a single voxel.
    pub fn voxel(ijk: IVec3) -> Self {
        Self { min: ijk, max: ijk }
    }

    /// Returns the smallest box containing all `coords`, or `None` if there are none.
    pub fn from_coords(coords: impl IntoIterator<Item = IVec3>) -> Option<Self> {
        coords.into_iter().fold(None, |acc, ijk| {
            Some(match acc {
                Some(b) => b.expanded_by(ijk),
                None => Self::voxel(ijk),
            })
        })
    }

    #[must_use]
    pub fn expanded_by(self, ijk: IVec3) -> Self {
        Self {
            min: self.min.min(ijk),
            max: self.max.max(ijk),
        }
    }

    /// Returns true if `ijk` lies inside the box.
    #[must_use]
    pub fn contains(&self, ijk: IVec3) -> bool {
        ijk.cmpge(self.min).all() && ijk.cmple(self.max).all()
    }

    /// Returns the eight corners of the box, as float index coordinates.
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min.as_vec3(), self.max.as_vec3());
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_box() {
        let bbox = Aabb::default();
        assert!(bbox.is_empty());
        assert_eq!(bbox.extent(), Vec3::ZERO);

        let bbox = bbox.expanded_by_point(Vec3::ONE);
        assert!(!bbox.is_empty());
        assert_eq!(bbox.min, Vec3::ONE);
        assert_eq!(bbox.max, Vec3::ONE);
    }

    #[test]
    fn test_union_of_disjoint_boxes() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(5.0), Vec3::splat(6.0));
        let u = a.union(b);
        assert!(u.contains_box(&a));
        assert!(u.contains_box(&b));
        assert_eq!(u.min, Vec3::ZERO);
        assert_eq!(u.max, Vec3::splat(6.0));
        assert!(u.contains(Vec3::splat(3.0)));
    }

    #[test]
    fn test_union_with_empty_is_identity() {
        let a = Aabb::new(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(1.0, 3.0, 4.0));
        assert_eq!(a.union(Aabb::EMPTY), a);
        assert_eq!(Aabb::EMPTY.union(a), a);
    }

    #[test]
    fn test_index_box_from_coords() {
        assert!(IndexBox::from_coords(std::iter::empty()).is_none());

        let b = IndexBox::from_coords([
            IVec3::new(3, -2, 0),
            IVec3::new(-1, 4, 7),
            IVec3::new(0, 0, 0),
        ])
        .unwrap();
        assert_eq!(b.min, IVec3::new(-1, -2, 0));
        assert_eq!(b.max, IVec3::new(3, 4, 7));
        assert!(b.contains(IVec3::new(0, 0, 3)));
        assert!(!b.contains(IVec3::new(4, 0, 3)));
    }
}
