//! Axis-aligned bounding box

use crate::core::types::Vec3;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box over a square terrain patch: `size` along x and z starting at
    /// `(x, z)`, spanning `min_y..=max_y` vertically.
    pub fn from_square(x: f32, z: f32, size: f32, min_y: f32, max_y: f32) -> Self {
        Self {
            min: Vec3::new(x, min_y, z),
            max: Vec3::new(x + size, max_y, z + size),
        }
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get half-extents
    pub fn half_extent(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// L-infinity distance from `p` to the box surface.
    ///
    /// Largest per-axis gap between the point and the box; negative when the
    /// point is inside on every axis.
    pub fn chebyshev_distance(&self, p: Vec3) -> f32 {
        ((p - self.center()).abs() - self.half_extent()).max_element()
    }
}
