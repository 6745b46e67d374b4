//! Narrowphase: exact shape-pair collision, producing contact manifolds (§4.3).
//!
//! Dispatch is a table keyed by the shape-type discriminant pair (§9
//! "Polymorphism"), realized here as an exhaustive match over
//! [`crate::shape::ShapeGeometry`] so the compiler checks every pair is
//! accounted for — unimplemented pairs fall through to `None`, exactly
//! the "return zero contacts silently" contract §7 documents.

mod handlers;
mod sat;

use arrayvec::ArrayVec;

use crate::math::{Iso, Vec2};
use crate::shape::ShapeGeometry;

/// Max manifold points for a 2D contact (§4.3).
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// A single contact point, expressed relative to each body's center (world frame),
/// plus the penetration depth along the manifold's shared normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManifoldPoint {
    pub point_a: Vec2,
    pub point_b: Vec2,
    pub depth: f64,
}

/// Up to [`MAX_MANIFOLD_POINTS`] contacts sharing one normal, pointing from A toward B.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifold {
    pub normal: Vec2,
    pub points: ArrayVec<ManifoldPoint, MAX_MANIFOLD_POINTS>,
}

impl Manifold {
    fn single(normal: Vec2, point_a: Vec2, point_b: Vec2, depth: f64) -> Self {
        let mut points = ArrayVec::new();
        points.push(ManifoldPoint {
            point_a,
            point_b,
            depth,
        });
        Self { normal, points }
    }
}

/// Produce a contact manifold for shapes `a` (at `iso_a`) and `b` (at `iso_b`), or
/// `None` if they don't overlap (or the pair has no handler, §7).
///
/// `skin` biases the test toward a slightly positive gap (§4.3 "Contact skin").
pub fn generate_manifold(
    iso_a: Iso,
    geom_a: &ShapeGeometry,
    iso_b: Iso,
    geom_b: &ShapeGeometry,
    skin: f64,
) -> Option<Manifold> {
    use ShapeGeometry::*;
    match (geom_a, geom_b) {
        (Circle { radius: ra }, Circle { radius: rb }) => {
            handlers::circle_circle(iso_a.pos, *ra, iso_b.pos, *rb, skin)
        }
        (Circle { radius: r }, Particle) => handlers::circle_circle(iso_a.pos, *r, iso_b.pos, 0.0, skin),
        (Particle, Circle { radius: r }) => handlers::circle_circle(iso_a.pos, 0.0, iso_b.pos, *r, skin),
        (Particle, Particle) => None,

        (Circle { radius }, Plane) => handlers::circle_plane(iso_b, iso_a.pos, *radius, skin).map(flip),
        (Plane, Circle { radius }) => handlers::circle_plane(iso_a, iso_b.pos, *radius, skin),
        (Particle, Plane) => handlers::circle_plane(iso_b, iso_a.pos, 0.0, skin).map(flip),
        (Plane, Particle) => handlers::circle_plane(iso_a, iso_b.pos, 0.0, skin),

        (Circle { radius }, Capsule { radius: cr, length }) => {
            handlers::circle_capsule(iso_a.pos, *radius, iso_b, *cr, *length, skin)
        }
        (Capsule { radius: cr, length }, Circle { radius }) => {
            handlers::circle_capsule(iso_b.pos, *radius, iso_a, *cr, *length, skin).map(flip)
        }
        (Particle, Capsule { radius: cr, length }) => {
            handlers::circle_capsule(iso_a.pos, 0.0, iso_b, *cr, *length, skin)
        }
        (Capsule { radius: cr, length }, Particle) => {
            handlers::circle_capsule(iso_b.pos, 0.0, iso_a, *cr, *length, skin).map(flip)
        }

        (Circle { radius }, Convex(poly)) => handlers::circle_convex(iso_a.pos, *radius, iso_b, poly, skin),
        (Convex(poly), Circle { radius }) => {
            handlers::circle_convex(iso_b.pos, *radius, iso_a, poly, skin).map(flip)
        }
        (Particle, Convex(poly)) => handlers::circle_convex(iso_a.pos, 0.0, iso_b, poly, skin),
        (Convex(poly), Particle) => handlers::circle_convex(iso_b.pos, 0.0, iso_a, poly, skin).map(flip),

        (Plane, Convex(poly)) => handlers::plane_convex(iso_a, iso_b, poly, skin),
        (Convex(poly), Plane) => handlers::plane_convex(iso_b, iso_a, poly, skin).map(flip),
        (Plane, Line { length }) => handlers::plane_line(iso_a, iso_b, *length, skin),
        (Line { length }, Plane) => handlers::plane_line(iso_b, iso_a, *length, skin).map(flip),
        (Plane, Capsule { radius, length }) => handlers::plane_capsule(iso_a, iso_b, *radius, *length, skin),
        (Capsule { radius, length }, Plane) => {
            handlers::plane_capsule(iso_b, iso_a, *radius, *length, skin).map(flip)
        }

        (Convex(poly_a), Convex(poly_b)) => sat::convex_convex(iso_a, poly_a, iso_b, poly_b, skin),

        (Convex(poly), Capsule { radius, length }) => {
            handlers::convex_capsule(iso_a, poly, iso_b, *radius, *length, skin)
        }
        (Capsule { radius, length }, Convex(poly)) => {
            handlers::convex_capsule(iso_b, poly, iso_a, *radius, *length, skin).map(flip)
        }

        (Capsule { radius: ra, length: la }, Capsule { radius: rb, length: lb }) => {
            handlers::capsule_capsule(iso_a, *ra, *la, iso_b, *rb, *lb, skin)
        }

        (Circle { radius }, Heightfield(hf)) => {
            handlers::circle_heightfield(iso_a.pos, *radius, iso_b, hf, skin)
        }
        (Heightfield(hf), Circle { radius }) => {
            handlers::circle_heightfield(iso_b.pos, *radius, iso_a, hf, skin).map(flip)
        }
        (Convex(poly), Heightfield(hf)) => handlers::convex_heightfield(iso_a, poly, iso_b, hf, skin),
        (Heightfield(hf), Convex(poly)) => {
            handlers::convex_heightfield(iso_b, poly, iso_a, hf, skin).map(flip)
        }

        // Unimplemented shape pairs (line-vs-line and similar): zero contacts, no error (§7).
        _ => None,
    }
}

/// Whether two shapes overlap, without building a manifold (`just_test`, §4.3).
///
/// A dedicated boolean-only fast path is a worthwhile optimization in a production
/// narrowphase; here it is expressed simply in terms of [`generate_manifold`], which
/// is cheap enough at 2D scale and keeps one code path authoritative.
pub fn shapes_overlap(iso_a: Iso, geom_a: &ShapeGeometry, iso_b: Iso, geom_b: &ShapeGeometry) -> bool {
    generate_manifold(iso_a, geom_a, iso_b, geom_b, 0.0).is_some()
}

fn flip(manifold: Manifold) -> Manifold {
    Manifold {
        normal: -manifold.normal,
        points: manifold
            .points
            .into_iter()
            .map(|p| ManifoldPoint {
                point_a: p.point_b,
                point_b: p.point_a,
                depth: p.depth,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Polygon;

    #[test]
    fn two_overlapping_circles_produce_one_point_pointing_a_to_b() {
        let a = ShapeGeometry::Circle { radius: 1.0 };
        let b = ShapeGeometry::Circle { radius: 1.0 };
        let manifold = generate_manifold(
            Iso::from_pos(Vec2::new(0.0, 0.0)),
            &a,
            Iso::from_pos(Vec2::new(1.5, 0.0)),
            &b,
            0.0,
        )
        .expect("circles should overlap");
        assert_eq!(manifold.points.len(), 1);
        assert!(manifold.normal.x > 0.0);
    }

    #[test]
    fn separated_circles_produce_no_manifold() {
        let a = ShapeGeometry::Circle { radius: 1.0 };
        let b = ShapeGeometry::Circle { radius: 1.0 };
        assert!(generate_manifold(
            Iso::from_pos(Vec2::new(0.0, 0.0)),
            &a,
            Iso::from_pos(Vec2::new(5.0, 0.0)),
            &b,
            0.0,
        )
        .is_none());
    }

    #[test]
    fn unimplemented_pair_returns_none_not_panic() {
        let a = ShapeGeometry::Particle;
        let b = ShapeGeometry::Particle;
        assert!(generate_manifold(Iso::from_pos(Vec2::zero()), &a, Iso::from_pos(Vec2::zero()), &b, 0.0).is_none());
    }

    #[test]
    fn box_resting_on_plane_produces_two_contacts() {
        let plane = ShapeGeometry::Plane;
        let poly = ShapeGeometry::Convex(Polygon::new(Polygon::rectangle(1.0, 1.0)));
        let manifold = generate_manifold(
            Iso::from_pos(Vec2::new(0.0, 0.0)),
            &plane,
            Iso::from_pos(Vec2::new(0.0, 0.49)),
            &poly,
            0.01,
        )
        .expect("box should touch the plane");
        assert_eq!(manifold.points.len(), 2);
    }
}
