//! The rotation group acting on cube patches
//!
//! A rotation is stored as the permutation it induces on the six patches plus a
//! per-patch table mapping orientation indices. Index 0 is always the identity.
//! In 3D the group has 24 elements; in planar problems only the 4 rotations
//! about z are used.

use super::vector::{
    orientation_from_vector, orientation_vector, patch_index, Vec3, ORIENTATION_COUNT,
    PATCH_COUNT, PATCH_DIRECTIONS, X_AXIS, Y_AXIS, Z_AXIS,
};
use crate::error::RotationGroupError;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    permutation: [usize; PATCH_COUNT],
    orientations: [[u8; ORIENTATION_COUNT]; PATCH_COUNT],
}

impl Rotation {
    /// Build from the images of the six patch directions.
    fn from_images(images: &[Vec3; PATCH_COUNT], dimensions: usize) -> Result<Self, RotationGroupError> {
        let invalid = || RotationGroupError {
            dimensions,
            found: 0,
            expected: RotationGroup::expected_order(dimensions),
        };

        let mut permutation = [0usize; PATCH_COUNT];
        for (p, &image) in images.iter().enumerate() {
            permutation[p] = patch_index(image).ok_or_else(invalid)?;
        }

        // The orientation marker of patch p points along some patch direction q;
        // after rotating, it points along the image of q, seen from the image of p.
        let mut orientations = [[0u8; ORIENTATION_COUNT]; PATCH_COUNT];
        for p in 0..PATCH_COUNT {
            for o in 0..ORIENTATION_COUNT as u8 {
                let q = patch_index(orientation_vector(p, o)).ok_or_else(invalid)?;
                let rotated = PATCH_DIRECTIONS[permutation[q]];
                orientations[p][o as usize] =
                    orientation_from_vector(permutation[p], rotated).ok_or_else(invalid)?;
            }
        }

        Ok(Self {
            permutation,
            orientations,
        })
    }

    /// Patch that `patch` is carried to.
    pub fn patch(&self, patch: usize) -> usize {
        self.permutation[patch]
    }

    /// Orientation of the rotated patch when the original had `orientation`.
    pub fn orientation(&self, patch: usize, orientation: u8) -> u8 {
        self.orientations[patch][orientation as usize]
    }

    pub fn permutation(&self) -> &[usize; PATCH_COUNT] {
        &self.permutation
    }

    pub fn is_identity(&self) -> bool {
        self.permutation.iter().enumerate().all(|(p, &q)| p == q)
    }
}

/// All rotations available to a problem of a given dimensionality.
#[derive(Debug, Clone)]
pub struct RotationGroup {
    dimensions: usize,
    rotations: Vec<Rotation>,
    index: HashMap<[usize; PATCH_COUNT], usize>,
}

impl RotationGroup {
    /// Enumerate the group by closing over quarter turns about the generator
    /// axes, starting from the identity.
    pub fn new(dimensions: usize) -> Result<Self, RotationGroupError> {
        let axes: &[Vec3] = if dimensions >= 3 {
            &[X_AXIS, Y_AXIS, Z_AXIS]
        } else {
            &[Z_AXIS]
        };

        let mut rotations = Vec::new();
        let mut index = HashMap::new();
        let mut queue = VecDeque::from([PATCH_DIRECTIONS]);

        while let Some(images) = queue.pop_front() {
            let rotation = Rotation::from_images(&images, dimensions)?;
            if index.contains_key(rotation.permutation()) {
                continue;
            }
            index.insert(*rotation.permutation(), rotations.len());
            rotations.push(rotation);

            for &axis in axes {
                for turns in [1, 3] {
                    queue.push_back(images.map(|v| v.rotate(axis, turns)));
                }
            }
        }

        let expected = Self::expected_order(dimensions);
        if rotations.len() != expected {
            return Err(RotationGroupError {
                dimensions,
                found: rotations.len(),
                expected,
            });
        }

        log::debug!("Enumerated {} rotations for {}D", rotations.len(), dimensions);
        Ok(Self {
            dimensions,
            rotations,
            index,
        })
    }

    pub fn expected_order(dimensions: usize) -> usize {
        if dimensions >= 3 {
            24
        } else {
            4
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.rotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }

    pub fn identity(&self) -> usize {
        0
    }

    pub fn get(&self, r: usize) -> &Rotation {
        &self.rotations[r]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rotation> {
        self.rotations.iter()
    }

    pub fn rotate_patch(&self, patch: usize, r: usize) -> usize {
        self.rotations[r].patch(patch)
    }

    pub fn rotate_orientation(&self, patch: usize, r: usize, orientation: u8) -> u8 {
        self.rotations[r].orientation(patch, orientation)
    }

    /// Index of the rotation with the given patch permutation.
    pub fn find(&self, permutation: &[usize; PATCH_COUNT]) -> Option<usize> {
        self.index.get(permutation).copied()
    }

    /// Index of the rotation that applies `second` after `first`.
    pub fn compose(&self, first: usize, second: usize) -> Option<usize> {
        let a = self.rotations[first].permutation();
        let b = self.rotations[second].permutation();
        self.find(&a.map(|p| b[p]))
    }

    pub fn inverse(&self, r: usize) -> Option<usize> {
        let mut inverse = [0usize; PATCH_COUNT];
        for (p, &q) in self.rotations[r].permutation().iter().enumerate() {
            inverse[q] = p;
        }
        self.find(&inverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polycube::vector::{are_opposing, FLAT_ORIENTATIONS};
    use proptest::prelude::*;

    #[test]
    fn test_group_orders() {
        assert_eq!(RotationGroup::new(3).unwrap().len(), 24);
        assert_eq!(RotationGroup::new(2).unwrap().len(), 4);
        assert_eq!(RotationGroup::new(1).unwrap().len(), 4);
    }

    #[test]
    fn test_identity_first() {
        let group = RotationGroup::new(3).unwrap();
        let identity = group.get(0);
        assert!(identity.is_identity());
        for p in 0..PATCH_COUNT {
            for o in 0..ORIENTATION_COUNT as u8 {
                assert_eq!(identity.orientation(p, o), o);
            }
        }
    }

    #[test]
    fn test_opposing_patches_stay_opposing() {
        let group = RotationGroup::new(3).unwrap();
        for rotation in group.iter() {
            for p in (0..PATCH_COUNT).step_by(2) {
                assert!(are_opposing(rotation.patch(p), rotation.patch(p + 1)));
            }
        }
    }

    #[test]
    fn test_planar_rotations_fix_z() {
        let group = RotationGroup::new(2).unwrap();
        for rotation in group.iter() {
            assert_eq!(rotation.patch(4), 4);
            assert_eq!(rotation.patch(5), 5);
            // Flat orientations are preserved by every in-plane rotation
            for p in 0..4 {
                let q = rotation.patch(p);
                assert_eq!(rotation.orientation(p, FLAT_ORIENTATIONS[p]), FLAT_ORIENTATIONS[q]);
            }
        }
    }

    #[test]
    fn test_orientation_follows_vector() {
        let group = RotationGroup::new(3).unwrap();
        // Quarter turn about z: -x goes to -y, and the -x marker (0,-1,0) goes to (1,0,0)
        let r = group.find(&[2, 3, 1, 0, 4, 5]).unwrap();
        let o = group.rotate_orientation(0, r, 0);
        assert_eq!(orientation_vector(2, o), Vec3::new(1, 0, 0));
    }

    proptest! {
        #[test]
        fn prop_closed_under_composition(a in 0usize..24, b in 0usize..24) {
            let group = RotationGroup::new(3).unwrap();
            let c = group.compose(a, b);
            prop_assert!(c.is_some());
            let c = c.unwrap();
            for p in 0..PATCH_COUNT {
                let via = group.rotate_patch(group.rotate_patch(p, a), b);
                prop_assert_eq!(group.rotate_patch(p, c), via);
                for o in 0..ORIENTATION_COUNT as u8 {
                    let step = group.rotate_orientation(p, a, o);
                    let via = group.rotate_orientation(group.rotate_patch(p, a), b, step);
                    prop_assert_eq!(group.rotate_orientation(p, c, o), via);
                }
            }
        }

        #[test]
        fn prop_inverse_exists(r in 0usize..24) {
            let group = RotationGroup::new(3).unwrap();
            let inv = group.inverse(r).unwrap();
            let identity = group.compose(r, inv).unwrap();
            prop_assert!(group.get(identity).is_identity());
            prop_assert_eq!(identity, group.identity());
        }

        #[test]
        fn prop_planar_closed(a in 0usize..4, b in 0usize..4) {
            let group = RotationGroup::new(2).unwrap();
            prop_assert!(group.compose(a, b).is_some());
            prop_assert!(group.inverse(a).is_some());
        }
    }
}
