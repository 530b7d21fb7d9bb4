//! Geometric sub-messages nested inside top-level kinds
//!
//! Coordinates compare by bit pattern, so every value (NaN included) equals
//! its own decoded copy; `0.0` and `-0.0` are distinct.

use serde::{Deserialize, Serialize};

/// A point in 3D space
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A rotation expressed as a quaternion `(x, y, z, w)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    /// The identity rotation `(0, 0, 0, 1)`
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Unit-length copy of this quaternion, or identity for a zero quaternion
    pub fn normalized(&self) -> Self {
        let n = self.norm();
        if n == 0.0 {
            return Self::IDENTITY;
        }
        Self::new(self.x / n, self.y / n, self.z / n, self.w / n)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Bitwise float equality
pub(crate) fn same_bits(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits()
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        same_bits(self.x, other.x) && same_bits(self.y, other.y) && same_bits(self.z, other.z)
    }
}

impl Eq for Point {}

impl PartialEq for Quaternion {
    fn eq(&self, other: &Self) -> bool {
        same_bits(self.x, other.x)
            && same_bits(self.y, other.y)
            && same_bits(self.z, other.z)
            && same_bits(self.w, other.w)
    }
}

impl Eq for Quaternion {}
