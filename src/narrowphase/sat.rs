//! Separating-axis tests and the Box2D-family convex-vs-convex clipping
//! algorithm (§4.3 "Convex-Convex").

use arrayvec::ArrayVec;

use super::{Manifold, ManifoldPoint, MAX_MANIFOLD_POINTS};
use crate::math::{Iso, Vec2};
use crate::shape::Polygon;

/// For every face of `poly` (in its own frame `iso`), the minimum signed distance to
/// `other`'s vertices along that face's normal. Returns the *maximum* over faces,
/// i.e. the best separating axis this polygon can offer, with its face index.
fn max_separation(iso: Iso, poly: &Polygon, other_iso: Iso, other: &Polygon) -> (usize, f64) {
    let mut best_index = 0;
    let mut best_separation = f64::NEG_INFINITY;
    for i in 0..poly.vertices().len() {
        let normal = poly.world_normal(iso, i);
        let v1 = poly.world_vertex(iso, i);

        let mut min_dot = f64::INFINITY;
        for j in 0..other.vertices().len() {
            let v2 = other.world_vertex(other_iso, j);
            min_dot = min_dot.min(normal.dot(v2 - v1));
        }
        if min_dot > best_separation {
            best_separation = min_dot;
            best_index = i;
        }
    }
    (best_index, best_separation)
}

/// The edge of `incident` whose outward normal is most anti-parallel to `reference_normal`.
fn incident_edge(incident_iso: Iso, incident: &Polygon, reference_normal: Vec2) -> usize {
    let mut best_index = 0;
    let mut best_dot = f64::INFINITY;
    for i in 0..incident.vertices().len() {
        let dot = incident.world_normal(incident_iso, i).dot(reference_normal);
        if dot < best_dot {
            best_dot = dot;
            best_index = i;
        }
    }
    best_index
}

/// Sutherland-Hodgman clip of segment `v` against the half-plane `{p : p.dot(normal) <= offset}`.
fn clip_segment(v: [Vec2; 2], normal: Vec2, offset: f64) -> ArrayVec<Vec2, 2> {
    let mut out = ArrayVec::new();
    let d0 = normal.dot(v[0]) - offset;
    let d1 = normal.dot(v[1]) - offset;
    if d0 <= 0.0 {
        out.push(v[0]);
    }
    if d1 <= 0.0 {
        out.push(v[1]);
    }
    if d0 * d1 < 0.0 {
        let t = d0 / (d0 - d1);
        out.push(v[0] + (v[1] - v[0]) * t);
    }
    out
}

/// Standard SAT-with-clipping used in Box2D-family engines (§4.3 "Convex-Convex"):
/// find the reference edge by maximum separation, build the incident edge from the
/// opposing polygon, clip it against the two side planes of the reference face, keep
/// the points whose signed distance to the reference face is <= 0.
pub fn convex_convex(iso_a: Iso, poly_a: &Polygon, iso_b: Iso, poly_b: &Polygon, skin: f64) -> Option<Manifold> {
    let (edge_a, sep_a) = max_separation(iso_a, poly_a, iso_b, poly_b);
    let (edge_b, sep_b) = max_separation(iso_b, poly_b, iso_a, poly_a);

    if sep_a > skin || sep_b > skin {
        return None;
    }

    // The polygon with the larger (less penetrating / more reliable) separation
    // becomes the reference; ties favor A for determinism.
    let (flip, ref_iso, ref_poly, ref_edge, inc_iso, inc_poly) = if sep_b > sep_a + 1e-9 {
        (true, iso_b, poly_b, edge_b, iso_a, poly_a)
    } else {
        (false, iso_a, poly_a, edge_a, iso_b, poly_b)
    };

    let n = ref_poly.vertices().len();
    let ref_normal = ref_poly.world_normal(ref_iso, ref_edge);
    let v1 = ref_poly.world_vertex(ref_iso, ref_edge);
    let v2 = ref_poly.world_vertex(ref_iso, (ref_edge + 1) % n);
    let tangent = crate::math::try_normalized(v2 - v1);

    let incident = incident_edge(inc_iso, inc_poly, ref_normal);
    let m = inc_poly.vertices().len();
    let inc_v1 = inc_poly.world_vertex(inc_iso, incident);
    let inc_v2 = inc_poly.world_vertex(inc_iso, (incident + 1) % m);

    let side1_offset = -tangent.dot(v1);
    let clipped = clip_segment([inc_v1, inc_v2], -tangent, side1_offset);
    if clipped.len() < 2 {
        return None;
    }
    let side2_offset = tangent.dot(v2);
    let clipped = clip_segment([clipped[0], clipped[1]], tangent, side2_offset);
    if clipped.len() < 2 {
        return None;
    }

    let front_offset = ref_normal.dot(v1);
    let mut points: ArrayVec<ManifoldPoint, MAX_MANIFOLD_POINTS> = ArrayVec::new();
    for p in clipped {
        let separation = ref_normal.dot(p) - front_offset;
        if separation <= skin {
            // Project the incident point onto the reference face for the reference side.
            let on_reference_face = p - ref_normal * separation;
            let (world_a, world_b) = if flip {
                (p, on_reference_face)
            } else {
                (on_reference_face, p)
            };
            points.push(ManifoldPoint {
                point_a: world_a - iso_a.pos,
                point_b: world_b - iso_b.pos,
                depth: -separation,
            });
        }
    }
    if points.is_empty() {
        return None;
    }

    let normal = if flip { -ref_normal } else { ref_normal };
    Some(Manifold { normal, points })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_boxes_produce_two_points() {
        let a = Polygon::new(Polygon::rectangle(2.0, 2.0));
        let b = Polygon::new(Polygon::rectangle(2.0, 2.0));
        let manifold = convex_convex(
            Iso::from_pos(Vec2::new(0.0, 0.0)),
            &a,
            Iso::from_pos(Vec2::new(1.5, 0.0)),
            &b,
            0.0,
        )
        .expect("boxes should overlap");
        assert_eq!(manifold.points.len(), 2);
        assert!(manifold.normal.x > 0.0);
    }

    #[test]
    fn separated_boxes_produce_no_manifold() {
        let a = Polygon::new(Polygon::rectangle(1.0, 1.0));
        let b = Polygon::new(Polygon::rectangle(1.0, 1.0));
        assert!(convex_convex(
            Iso::from_pos(Vec2::new(0.0, 0.0)),
            &a,
            Iso::from_pos(Vec2::new(10.0, 0.0)),
            &b,
            0.0,
        )
        .is_none());
    }
}
