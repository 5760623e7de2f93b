//! Integer lattice vectors and the fixed patch geometry of a cube
//!
//! Patch `p` faces outward along `PATCH_DIRECTIONS[p]` (−x, +x, −y, +y, −z, +z).
//! A torsional patch additionally carries an orientation `o` in `0..4`: its
//! marker is the reference vector `PATCH_UP[p]` turned `o` quarter turns
//! counter-clockwise about the patch's outward axis.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

pub const PATCH_COUNT: usize = 6;
pub const ORIENTATION_COUNT: usize = 4;

/// Orientation every patch takes when the lattice is planar. All in-plane
/// markers then point along +z.
pub const FLAT_ORIENTATIONS: [u8; PATCH_COUNT] = [1, 1, 2, 0, 0, 0];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

pub const PATCH_DIRECTIONS: [Vec3; PATCH_COUNT] = [
    Vec3::new(-1, 0, 0),
    Vec3::new(1, 0, 0),
    Vec3::new(0, -1, 0),
    Vec3::new(0, 1, 0),
    Vec3::new(0, 0, -1),
    Vec3::new(0, 0, 1),
];

pub const PATCH_UP: [Vec3; PATCH_COUNT] = [
    Vec3::new(0, -1, 0),
    Vec3::new(0, 1, 0),
    Vec3::new(0, 0, -1),
    Vec3::new(0, 0, 1),
    Vec3::new(-1, 0, 0),
    Vec3::new(1, 0, 0),
];

pub const X_AXIS: Vec3 = Vec3::new(1, 0, 0);
pub const Y_AXIS: Vec3 = Vec3::new(0, 1, 0);
pub const Z_AXIS: Vec3 = Vec3::new(0, 0, 1);

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0, 0, 0);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> i32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn abs(self) -> Vec3 {
        Vec3::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    /// Rotate by 90° counter-clockwise about a unit lattice axis.
    ///
    /// Rodrigues' formula at a quarter turn reduces to `a × v + a (a · v)`,
    /// which stays exact in integers.
    pub fn quarter_turn(self, axis: Vec3) -> Vec3 {
        axis.cross(self) + axis * axis.dot(self)
    }

    /// Rotate by `turns` quarter turns about a unit lattice axis.
    pub fn rotate(self, axis: Vec3, turns: u8) -> Vec3 {
        (0..turns % 4).fold(self, |v, _| v.quarter_turn(axis))
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<i32> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: i32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

/// Index of the patch facing along `direction`, if it is a unit axis vector.
pub fn patch_index(direction: Vec3) -> Option<usize> {
    PATCH_DIRECTIONS.iter().position(|&d| d == direction)
}

/// The patch on the opposite face.
pub fn opposite_patch(patch: usize) -> usize {
    patch ^ 1
}

/// Whether two patches are the two faces of one axis (0/1, 2/3, 4/5).
pub fn are_opposing(patch_a: usize, patch_b: usize) -> bool {
    patch_a != patch_b && patch_a / 2 == patch_b / 2
}

pub fn orientation_vector(patch: usize, orientation: u8) -> Vec3 {
    PATCH_UP[patch].rotate(PATCH_DIRECTIONS[patch], orientation)
}

/// Inverse of [`orientation_vector`]: `None` when `v` is not perpendicular to
/// the patch axis.
pub fn orientation_from_vector(patch: usize, v: Vec3) -> Option<u8> {
    (0..ORIENTATION_COUNT as u8).find(|&o| orientation_vector(patch, o) == v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_turn_is_counter_clockwise() {
        assert_eq!(X_AXIS.quarter_turn(Z_AXIS), Y_AXIS);
        assert_eq!(Y_AXIS.quarter_turn(X_AXIS), Z_AXIS);
        assert_eq!(Z_AXIS.quarter_turn(Y_AXIS), X_AXIS);
        // Vectors along the axis are fixed
        assert_eq!(Z_AXIS.quarter_turn(Z_AXIS), Z_AXIS);
        assert_eq!(X_AXIS.rotate(Z_AXIS, 4), X_AXIS);
    }

    #[test]
    fn test_orientation_vectors_are_perpendicular() {
        for p in 0..PATCH_COUNT {
            for o in 0..ORIENTATION_COUNT as u8 {
                let v = orientation_vector(p, o);
                assert_eq!(v.dot(PATCH_DIRECTIONS[p]), 0);
                assert_eq!(orientation_from_vector(p, v), Some(o));
            }
        }
    }

    #[test]
    fn test_flat_orientations_point_up() {
        for p in 0..4 {
            assert_eq!(orientation_vector(p, FLAT_ORIENTATIONS[p]), Z_AXIS);
        }
    }

    #[test]
    fn test_opposing_patches() {
        assert!(are_opposing(0, 1));
        assert!(are_opposing(5, 4));
        assert!(!are_opposing(1, 2));
        assert!(!are_opposing(3, 3));
        assert_eq!(opposite_patch(2), 3);
        assert_eq!(PATCH_DIRECTIONS[opposite_patch(4)], -PATCH_DIRECTIONS[4]);
    }
}
