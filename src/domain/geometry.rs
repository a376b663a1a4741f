//! Tolerance-based geometric identity of a node.
//!
//! A [`GeometricKey`] is a node position mapped through its entity's affine transform,
//! plus the node's layer depth. Two keys are the same point when every axis differs by
//! strictly less than the tolerance. That relation is not transitive, so keys are never
//! hashed; [`crate::domain::NodeSetIndex`] handles lookup.

use kurbo::{Affine, Point};

use crate::domain::arena::NodeData;

/// Absolute tolerance in x, y and depth.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricKey {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl GeometricKey {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Key of `node` in world space under `transform`.
    pub fn of(node: &NodeData, transform: &Affine) -> Self {
        let p: Point = *transform * node.position;
        Self::new(p.x, p.y, node.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Same point within `tolerance` on every axis.
    #[inline]
    pub fn matches(&self, other: &GeometricKey, tolerance: f64) -> bool {
        same(self.x, other.x, tolerance)
            && same(self.y, other.y, tolerance)
            && same(self.z, other.z, tolerance)
    }

    /// Integer grid cell of edge `cell` containing this key.
    pub(crate) fn cell(&self, cell: f64) -> (i64, i64, i64) {
        (
            floor_to_i64(self.x / cell),
            floor_to_i64(self.y / cell),
            floor_to_i64(self.z / cell),
        )
    }
}

#[inline]
fn same(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() < tolerance
}

/// Saturates at `i64::MIN` / `i64::MAX` for coordinates beyond the grid range.
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn floor_to_i64(v: f64) -> i64 {
    v.floor() as i64
}
