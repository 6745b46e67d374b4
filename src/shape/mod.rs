//! Convex collision primitives and their per-body local placement (§3 "Shape", §4.1).
//!
//! A [`Shape`] is immutable local geometry: vertices for polygons, a
//! radius for circles/capsules, and so on. It sits at a local `offset`
//! and `angle` relative to the body that owns it and carries the
//! collision-filter, sensor and material fields a body/world step needs.
//! The geometry never changes after construction; building a new shape is
//! the only way to change the underlying dimensions (mirrors the
//! teacher's `Shape`/`Rectangle` split in `collision/shape.rs`, extended
//! to the full primitive set the spec requires).

mod heightfield;
mod polygon;

pub use heightfield::Heightfield;
pub use polygon::Polygon;

use crate::material::MaterialId;
use crate::math::{Aabb, Iso, Vec2};

/// Discriminant for narrowphase dispatch (§4.1, §9 "Polymorphism": shapes are a variant,
/// narrowphase dispatch is a 2D table keyed by the discriminant pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ShapeType {
    Circle = 0,
    Particle = 1,
    Capsule = 2,
    Line = 3,
    Plane = 4,
    Convex = 5,
    Heightfield = 6,
}

/// The local geometry of a shape, dispatched by [`ShapeType`].
#[derive(Debug, Clone)]
pub enum ShapeGeometry {
    /// A circle of the given radius, centered on the shape's local offset.
    Circle { radius: f64 },
    /// A zero-size point.
    Particle,
    /// A line segment of `length`, thickened by `radius`, lying along the local x-axis,
    /// centered on the local offset.
    Capsule { radius: f64, length: f64 },
    /// An infinitely thin line segment of `length` along the local x-axis.
    Line { length: f64 },
    /// An infinite half-plane; the surface passes through the local offset with the
    /// outward normal along local +y (rotated by the shape's local angle, then the body's).
    Plane,
    /// A convex polygon, vertices wound counter-clockwise (not re-validated per step, §4.1).
    Convex(Polygon),
    /// A horizontal heightfield sampled at a fixed spacing (local +y is up).
    Heightfield(Heightfield),
}

/// Bitmask used for shape-level collision filtering (§4.2).
pub type CollisionGroup = u32;

/// Everything collides with everything by default.
pub const ALL_GROUPS: CollisionGroup = u32::MAX;

/// Immutable convex geometry plus its per-body local placement and collision filters.
#[derive(Debug, Clone)]
pub struct Shape {
    geometry: ShapeGeometry,
    /// Local offset relative to the owning body's center.
    pub offset: Vec2,
    /// Local angle (radians) relative to the owning body's angle.
    pub angle: f64,
    /// Collision filtering group this shape belongs to.
    pub collision_group: CollisionGroup,
    /// Collision filtering mask: bits this shape is willing to collide with.
    pub collision_mask: CollisionGroup,
    /// Sensors report overlap events but never produce contact/friction equations or impulses.
    pub sensor: bool,
    /// When false, this shape never produces contact/friction equations (still reports overlap).
    pub collision_response: bool,
    /// Optional material, looked up in the world's contact-material table.
    pub material: Option<MaterialId>,
    area: f64,
    bounding_radius: f64,
    /// Non-owning back-link to the owning body, set by [`crate::body::Body::add_shape`]
    /// (§9 "Cyclic graphs": the body owns the shape, the shape only holds an index back).
    body: Option<crate::body::BodyId>,
}

/// Result of a single-shape raycast (§4.1, §4.7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeHit {
    /// World-space hit point.
    pub point: Vec2,
    /// World-space outward surface normal at the hit point.
    pub normal: Vec2,
    /// Distance from the ray origin to the hit point.
    pub distance: f64,
    /// Hit position as a fraction of the `from -> to` segment, in `[0, 1]`.
    pub fraction: f64,
    /// Index of the polygon edge / heightfield segment hit, when applicable.
    pub face_index: Option<usize>,
}

impl Shape {
    fn new(geometry: ShapeGeometry) -> Self {
        let area = geometry.compute_area();
        let bounding_radius = geometry.compute_bounding_radius();
        Self {
            geometry,
            offset: Vec2::zero(),
            angle: 0.0,
            collision_group: ALL_GROUPS,
            collision_mask: ALL_GROUPS,
            sensor: false,
            collision_response: true,
            material: None,
            area,
            bounding_radius,
            body: None,
        }
    }

    /// The body this shape is currently attached to, if any.
    pub fn body(&self) -> Option<crate::body::BodyId> {
        self.body
    }

    pub(crate) fn attach_to(&mut self, body: crate::body::BodyId) {
        self.body = Some(body);
    }

    pub(crate) fn detach(&mut self) {
        self.body = None;
    }

    /// Construct a circle shape.
    pub fn circle(radius: f64) -> Self {
        Self::new(ShapeGeometry::Circle { radius })
    }

    /// Construct a zero-size particle shape.
    pub fn particle() -> Self {
        Self::new(ShapeGeometry::Particle)
    }

    /// Construct a capsule: a segment of `length` along the local x-axis, thickened by `radius`.
    pub fn capsule(radius: f64, length: f64) -> Self {
        Self::new(ShapeGeometry::Capsule { radius, length })
    }

    /// Construct an infinitely thin line segment of `length` along the local x-axis.
    pub fn line(length: f64) -> Self {
        Self::new(ShapeGeometry::Line { length })
    }

    /// Construct an infinite half-plane with outward normal along local +y.
    pub fn plane() -> Self {
        Self::new(ShapeGeometry::Plane)
    }

    /// Construct a convex polygon from counter-clockwise wound vertices.
    pub fn convex(vertices: Vec<Vec2>) -> Self {
        Self::new(ShapeGeometry::Convex(Polygon::new(vertices)))
    }

    /// Construct an axis-aligned rectangle of the given width/height, centered on the origin.
    pub fn rectangle(width: f64, height: f64) -> Self {
        Self::convex(Polygon::rectangle(width, height))
    }

    /// Construct a horizontal heightfield.
    pub fn heightfield(heights: Vec<f64>, spacing: f64) -> Self {
        Self::new(ShapeGeometry::Heightfield(Heightfield::new(
            heights, spacing,
        )))
    }

    /// The shape's local geometry.
    pub fn geometry(&self) -> &ShapeGeometry {
        &self.geometry
    }

    /// Discriminant used for narrowphase dispatch.
    pub fn shape_type(&self) -> ShapeType {
        match &self.geometry {
            ShapeGeometry::Circle { .. } => ShapeType::Circle,
            ShapeGeometry::Particle => ShapeType::Particle,
            ShapeGeometry::Capsule { .. } => ShapeType::Capsule,
            ShapeGeometry::Line { .. } => ShapeType::Line,
            ShapeGeometry::Plane => ShapeType::Plane,
            ShapeGeometry::Convex(_) => ShapeType::Convex,
            ShapeGeometry::Heightfield(_) => ShapeType::Heightfield,
        }
    }

    /// Precomputed area (for density-based mass computation).
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Precomputed bounding radius around the shape's local offset.
    pub fn bounding_radius(&self) -> f64 {
        self.bounding_radius
    }

    /// This shape's placement combined with the owning body's world position/angle.
    pub fn world_transform(&self, body_pos: Vec2, body_angle: f64) -> Iso {
        Iso::new(
            body_pos + crate::math::rotate(self.offset, body_angle),
            body_angle + self.angle,
        )
    }

    /// Axis-aligned bounding box in world space, given the *body's* position and angle.
    pub fn compute_aabb(&self, body_pos: Vec2, body_angle: f64) -> Aabb {
        let iso = self.world_transform(body_pos, body_angle);
        self.geometry.compute_aabb(iso)
    }

    /// Moment of inertia about this shape's local offset, for a shape of the given mass.
    ///
    /// Per the parallel axis theorem, the body adds `mass * offset.magnitude_squared()`
    /// on top of this when combining multiple shapes (see [`crate::body::Body`]).
    pub fn compute_moment_of_inertia(&self, mass: f64) -> f64 {
        self.geometry.compute_moment_of_inertia(mass)
    }

    /// Cast a ray against this shape, expressed in the body's local frame.
    ///
    /// `from`/`to` and the returned hit are in world space; `body_pos`/`body_angle`
    /// place the shape (combined with its own local offset/angle) in the world.
    pub fn raycast(
        &self,
        from: Vec2,
        to: Vec2,
        body_pos: Vec2,
        body_angle: f64,
        skip_backfaces: bool,
    ) -> Option<ShapeHit> {
        let iso = self.world_transform(body_pos, body_angle);
        self.geometry.raycast(from, to, iso, skip_backfaces)
    }
}

impl ShapeGeometry {
    fn compute_area(&self) -> f64 {
        match self {
            ShapeGeometry::Circle { radius } => std::f64::consts::PI * radius * radius,
            ShapeGeometry::Particle => 0.0,
            ShapeGeometry::Capsule { radius, length } => {
                std::f64::consts::PI * radius * radius + 2.0 * radius * length
            }
            ShapeGeometry::Line { .. } => 0.0,
            ShapeGeometry::Plane => 0.0,
            ShapeGeometry::Convex(polygon) => polygon.area(),
            ShapeGeometry::Heightfield(_) => 0.0,
        }
    }

    fn compute_bounding_radius(&self) -> f64 {
        match self {
            ShapeGeometry::Circle { radius } => *radius,
            ShapeGeometry::Particle => 0.0,
            ShapeGeometry::Capsule { radius, length } => length / 2.0 + radius,
            ShapeGeometry::Line { length } => length / 2.0,
            ShapeGeometry::Plane => f64::INFINITY,
            ShapeGeometry::Convex(polygon) => polygon.bounding_radius(),
            ShapeGeometry::Heightfield(_) => f64::INFINITY,
        }
    }

    fn compute_aabb(&self, iso: Iso) -> Aabb {
        match self {
            ShapeGeometry::Circle { radius } => Aabb {
                min: iso.pos - Vec2::new(*radius, *radius),
                max: iso.pos + Vec2::new(*radius, *radius),
            },
            ShapeGeometry::Particle => Aabb {
                min: iso.pos,
                max: iso.pos,
            },
            ShapeGeometry::Capsule { radius, length } => {
                let half = Vec2::new(length / 2.0, 0.0);
                let a = iso.transform_point(-half);
                let b = iso.transform_point(half);
                let min = Vec2::partial_min(a, b) - Vec2::new(*radius, *radius);
                let max = Vec2::partial_max(a, b) + Vec2::new(*radius, *radius);
                Aabb { min, max }
            }
            ShapeGeometry::Line { length } => {
                let half = Vec2::new(length / 2.0, 0.0);
                let a = iso.transform_point(-half);
                let b = iso.transform_point(half);
                Aabb {
                    min: Vec2::partial_min(a, b),
                    max: Vec2::partial_max(a, b),
                }
            }
            ShapeGeometry::Plane => Aabb {
                min: Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
                max: Vec2::new(f64::INFINITY, iso.pos.y),
            },
            ShapeGeometry::Convex(polygon) => polygon.compute_aabb(iso),
            ShapeGeometry::Heightfield(heightfield) => heightfield.compute_aabb(iso),
        }
    }

    fn compute_moment_of_inertia(&self, mass: f64) -> f64 {
        match self {
            ShapeGeometry::Circle { radius } => 0.5 * mass * radius * radius,
            ShapeGeometry::Particle => 0.0,
            // Approximate as a rectangle of width `length + 2r` and height `2r`, the
            // usual box2d-family approximation for a capsule's rotational inertia.
            ShapeGeometry::Capsule { radius, length } => {
                let w = length + 2.0 * radius;
                let h = 2.0 * radius;
                mass * (w * w + h * h) / 12.0
            }
            ShapeGeometry::Line { length } => mass * length * length / 12.0,
            ShapeGeometry::Plane => 0.0,
            ShapeGeometry::Convex(polygon) => polygon.compute_moment_of_inertia(mass),
            ShapeGeometry::Heightfield(_) => 0.0,
        }
    }

    fn raycast(&self, from: Vec2, to: Vec2, iso: Iso, skip_backfaces: bool) -> Option<ShapeHit> {
        match self {
            ShapeGeometry::Circle { radius } => raycast_circle(from, to, iso.pos, *radius),
            ShapeGeometry::Particle => None,
            ShapeGeometry::Capsule { radius, length } => {
                raycast_capsule(from, to, iso, *radius, *length)
            }
            ShapeGeometry::Line { length } => raycast_line(from, to, iso, *length),
            ShapeGeometry::Plane => raycast_plane(from, to, iso, skip_backfaces),
            ShapeGeometry::Convex(polygon) => polygon.raycast(from, to, iso, skip_backfaces),
            ShapeGeometry::Heightfield(heightfield) => {
                heightfield.raycast(from, to, iso, skip_backfaces)
            }
        }
    }
}

fn raycast_circle(from: Vec2, to: Vec2, center: Vec2, radius: f64) -> Option<ShapeHit> {
    let d = to - from;
    let len = d.magnitude();
    if len <= f64::EPSILON {
        return None;
    }
    let dir = d / len;
    let m = from - center;
    let b = m.dot(dir);
    let c = m.magnitude_squared() - radius * radius;
    if c > 0.0 && b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    let t = if t < 0.0 { 0.0 } else { t };
    if t > len {
        return None;
    }
    let point = from + dir * t;
    let normal = try_normalize(point - center);
    Some(ShapeHit {
        point,
        normal,
        distance: t,
        fraction: t / len,
        face_index: None,
    })
}

fn raycast_capsule(from: Vec2, to: Vec2, iso: Iso, radius: f64, length: f64) -> Option<ShapeHit> {
    let half = Vec2::new(length / 2.0, 0.0);
    let a = iso.transform_point(-half);
    let b = iso.transform_point(half);
    closest_point_on_segment_hit(from, to, a, b, radius)
}

fn raycast_line(from: Vec2, to: Vec2, iso: Iso, length: f64) -> Option<ShapeHit> {
    let half = Vec2::new(length / 2.0, 0.0);
    let a = iso.transform_point(-half);
    let b = iso.transform_point(half);
    segment_segment_intersection(from, to, a, b)
}

fn raycast_plane(from: Vec2, to: Vec2, iso: Iso, skip_backfaces: bool) -> Option<ShapeHit> {
    let normal = iso.transform_vector(Vec2::unit_y());
    let d = to - from;
    let denom = normal.dot(d);
    if denom.abs() <= f64::EPSILON {
        return None;
    }
    if skip_backfaces && denom > 0.0 {
        return None;
    }
    let t = normal.dot(iso.pos - from) / denom;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let point = from + d * t;
    Some(ShapeHit {
        point,
        normal: if denom > 0.0 { -normal } else { normal },
        distance: (d * t).magnitude(),
        fraction: t,
        face_index: None,
    })
}

/// Raycast against a thick segment (used by capsules): the ray versus the two
/// end caps and the two side edges, keeping the closest hit.
fn closest_point_on_segment_hit(
    from: Vec2,
    to: Vec2,
    a: Vec2,
    b: Vec2,
    radius: f64,
) -> Option<ShapeHit> {
    let axis = b - a;
    let len = axis.magnitude();
    let mut best: Option<ShapeHit> = None;

    let mut consider = |hit: Option<ShapeHit>| {
        if let Some(hit) = hit {
            if best.as_ref().map_or(true, |b| hit.distance < b.distance) {
                best = Some(hit);
            }
        }
    };

    consider(raycast_circle(from, to, a, radius));
    consider(raycast_circle(from, to, b, radius));

    if len > f64::EPSILON {
        let normal = rotate90cw_vec(axis / len);
        for side in [-1.0, 1.0] {
            let offset = normal * radius * side;
            consider(segment_segment_intersection(
                from,
                to,
                a + offset,
                b + offset,
            ));
        }
    }

    best
}

fn rotate90cw_vec(v: Vec2) -> Vec2 {
    crate::math::rotate90cw(v)
}

fn try_normalize(v: Vec2) -> Vec2 {
    crate::math::try_normalized(v)
}

/// Segment-vs-segment intersection, returning the hit closest to `from` along `from -> to`.
pub(crate) fn segment_segment_intersection(
    from: Vec2,
    to: Vec2,
    a: Vec2,
    b: Vec2,
) -> Option<ShapeHit> {
    let r = to - from;
    let s = b - a;
    let rxs = crate::math::cross(r, s);
    if rxs.abs() <= f64::EPSILON {
        return None;
    }
    let qp = a - from;
    let t = crate::math::cross(qp, s) / rxs;
    let u = crate::math::cross(qp, r) / rxs;
    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }
    let point = from + r * t;
    let edge_normal = try_normalize(crate::math::rotate90cw(s));
    let facing = if edge_normal.dot(r) > 0.0 {
        -edge_normal
    } else {
        edge_normal
    };
    Some(ShapeHit {
        point,
        normal: facing,
        distance: (r * t).magnitude(),
        fraction: t,
        face_index: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_aabb_is_centered_on_offset() {
        let shape = Shape::circle(2.0);
        let aabb = shape.compute_aabb(Vec2::new(5.0, 5.0), 0.0);
        assert_eq!(aabb.min, Vec2::new(3.0, 3.0));
        assert_eq!(aabb.max, Vec2::new(7.0, 7.0));
    }

    #[test]
    fn raycast_circle_hits_closest_point() {
        let hit = raycast_circle(
            Vec2::new(-5.0, 0.0),
            Vec2::new(5.0, 0.0),
            Vec2::zero(),
            1.0,
        )
        .expect("ray should hit circle");
        assert!((hit.point.x + 1.0).abs() < 1e-9);
        assert!((hit.distance - 4.0).abs() < 1e-9);
    }

    #[test]
    fn raycast_circle_misses_when_ray_passes_outside() {
        assert!(raycast_circle(
            Vec2::new(-5.0, 5.0),
            Vec2::new(5.0, 5.0),
            Vec2::zero(),
            1.0
        )
        .is_none());
    }

    #[test]
    fn plane_raycast_respects_skip_backfaces() {
        let iso = Iso::new(Vec2::zero(), 0.0);
        // Ray coming from below (-y), hitting the plane's back face.
        let hit_allowed = raycast_plane(Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0), iso, false);
        let hit_skipped = raycast_plane(Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0), iso, true);
        assert!(hit_allowed.is_some());
        assert!(hit_skipped.is_none());
    }

    #[test]
    fn moment_of_inertia_circle_matches_formula() {
        let shape = Shape::circle(2.0);
        let i = shape.compute_moment_of_inertia(4.0);
        assert!((i - 0.5 * 4.0 * 2.0 * 2.0).abs() < 1e-9);
    }
}
