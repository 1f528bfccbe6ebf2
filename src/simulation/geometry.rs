//! Geometry helpers for line-of-sight and occlusion tests.
//!
//! Contains helper functions for:
//! - Distance calculations (squared distance to avoid sqrt in hot paths)
//! - Ray-sphere intersection using the half-chord form of the quadratic
//! - Clipping a ray's sphere hits to a finite segment

use super::types::Position;

/// Squared Euclidean distance in world units.
///
/// Range checks compare `d²` against `range²`, so the square root is only
/// taken once a pair is known to be worth evaluating.
pub fn distance2(a: &Position, b: &Position) -> f64 {
    (a - b).norm_squared()
}

/// Convert squared distance back to distance.
pub fn distance_from_d2(d2: f64) -> f64 {
    d2.sqrt()
}

/// Parametric distances along a unit ray where it crosses a sphere surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereHits {
    /// Entry parameter (may be negative when the sphere starts behind the origin).
    pub near: f64,
    /// Exit parameter.
    pub far: f64,
}

impl SphereHits {
    /// True when the whole sphere lies ahead of the ray origin.
    pub fn ahead(&self) -> bool {
        self.near > 0.0 && self.far > 0.0
    }

    /// Restrict the hits to the segment `[0, length]`.
    ///
    /// Returns `None` when the segment ends before entering the sphere or
    /// starts after leaving it.
    pub fn clip(&self, length: f64) -> Option<(f64, f64)> {
        if self.far <= 0.0 || self.near >= length {
            return None;
        }
        Some((self.near.max(0.0), self.far.min(length)))
    }
}

/// Intersect a ray with a sphere centered at the coordinate origin.
///
/// With origin `o`, unit direction `r` and `halfB = o·r`, the hits are
/// `t = -halfB ± sqrt(halfB² - |o|² + radius²)`.
///
/// # Parameters
///
/// * `half_b` - Projection of the ray origin on the ray direction
/// * `origin_norm2` - Squared distance of the ray origin from the sphere center
/// * `radius` - Sphere radius
///
/// # Returns
///
/// `None` when the discriminant is not positive (miss or grazing tangent).
pub fn ray_sphere_intersections(half_b: f64, origin_norm2: f64, radius: f64) -> Option<SphereHits> {
    let discriminant = half_b * half_b - origin_norm2 + radius * radius;
    if discriminant <= 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    Some(SphereHits {
        near: -half_b - root,
        far: -half_b + root,
    })
}
