//! 2D math kernel built on top of [`vek`].
//!
//! The engine treats body orientation as a plain scalar angle in radians
//! (§3 DATA MODEL), so this module is mostly thin helpers around [`Vec2`]
//! rather than a full isometry type: rotation composition, the 2D
//! cross/perp-dot products the Jacobian and SAT code need everywhere, and
//! an `Iso` pair bundling a world position with an angle for shape queries.

use vek::Vec2 as VekVec2;

/// The engine's vector type. `f64` throughout: §8 boundary behaviors ask
/// for sub-percent energy/momentum conservation, which single precision
/// does not hold onto across many steps.
pub type Vec2 = VekVec2<f64>;

/// Axis-aligned bounding box.
pub type Aabb = vek::Aabr<f64>;

/// Rotate a vector by an angle in radians.
#[inline]
pub fn rotate(v: Vec2, angle: f64) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// 2D cross product of two vectors, a scalar (the z component of the 3D cross product).
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Cross product of a scalar (angular velocity) and a vector, yielding a vector.
///
/// Used throughout the solver to turn `ω × r` into a linear velocity contribution.
#[inline]
pub fn cross_scalar_vec(s: f64, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Rotate a vector 90 degrees clockwise.
///
/// Used to derive a friction tangent from a contact normal (§4.3).
#[inline]
pub fn rotate90cw(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

/// A world-space position + angle pair, used to place a [`crate::shape::Shape`] in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Iso {
    /// World position.
    pub pos: Vec2,
    /// World angle in radians.
    pub angle: f64,
}

impl Iso {
    /// Construct from a position and an angle.
    pub fn new(pos: Vec2, angle: f64) -> Self {
        Self { pos, angle }
    }

    /// Construct from a position with an angle of zero.
    pub fn from_pos(pos: Vec2) -> Self {
        Self { pos, angle: 0.0 }
    }

    /// Rotate a local-space point by this isometry's angle and translate it into world space.
    #[inline]
    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        self.pos + rotate(point, self.angle)
    }

    /// Rotate a local-space direction by this isometry's angle, without translating.
    #[inline]
    pub fn transform_vector(&self, vector: Vec2) -> Vec2 {
        rotate(vector, self.angle)
    }
}

/// Normalize a vector, returning a zero vector instead of NaN when the input is (near) zero.
#[inline]
pub fn try_normalized(v: Vec2) -> Vec2 {
    let len_sq = v.magnitude_squared();
    if len_sq <= f64::EPSILON {
        Vec2::zero()
    } else {
        v / len_sq.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_quarter_turn() {
        let v = Vec2::new(1.0, 0.0);
        let rotated = rotate(v, std::f64::consts::FRAC_PI_2);

        assert!((rotated.x - 0.0).abs() < 1e-10);
        assert!((rotated.y - 1.0).abs() < 1e-10);
    }

    #[test]
    fn rotate90cw_is_inverse_of_rotate90ccw() {
        let v = Vec2::new(3.0, 4.0);
        let cw = rotate90cw(v);

        // Rotating 90 degrees clockwise then 90 degrees counter-clockwise returns the original.
        let ccw = Vec2::new(-cw.y, cw.x);
        assert!((ccw - v).magnitude() < 1e-10);
    }

    #[test]
    fn cross_of_perpendicular_vectors() {
        let a = Vec2::new(1.0, 0.0);
        let b = Vec2::new(0.0, 1.0);
        assert!((cross(a, b) - 1.0).abs() < 1e-10);
        assert!((cross(b, a) + 1.0).abs() < 1e-10);
    }

    #[test]
    fn try_normalized_zero_vector_stays_zero() {
        assert_eq!(try_normalized(Vec2::zero()), Vec2::zero());
    }
}
