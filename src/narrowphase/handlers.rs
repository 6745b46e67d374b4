//! Shape-pair handlers other than convex-vs-convex (§4.3).

use arrayvec::ArrayVec;

use super::sat::convex_convex;
use super::{Manifold, ManifoldPoint, MAX_MANIFOLD_POINTS};
use crate::math::{try_normalized, Iso, Vec2};
use crate::shape::Polygon;

pub fn circle_circle(pa: Vec2, ra: f64, pb: Vec2, rb: f64, skin: f64) -> Option<Manifold> {
    let delta = pb - pa;
    let dist = delta.magnitude();
    let depth = ra + rb - dist;
    if depth <= -skin {
        return None;
    }
    let normal = if dist > f64::EPSILON {
        delta / dist
    } else {
        Vec2::new(1.0, 0.0)
    };
    Some(Manifold::single(normal, normal * ra, -normal * rb, depth))
}

/// Circle vs infinite half-plane (outward normal = plane's local +y, world-rotated).
pub fn circle_plane(plane_iso: Iso, center: Vec2, radius: f64, skin: f64) -> Option<Manifold> {
    let normal = plane_iso.transform_vector(Vec2::unit_y());
    let projected = (center - plane_iso.pos).dot(normal);
    let depth = radius - projected;
    if depth <= -skin {
        return None;
    }
    let point_on_plane = center - normal * projected;
    Some(Manifold::single(
        normal,
        point_on_plane - plane_iso.pos,
        -normal * radius,
        depth,
    ))
}

/// Closest point on a world-space segment `[a, b]` to `p`.
fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.magnitude_squared();
    if len_sq <= f64::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

fn capsule_endpoints(iso: Iso, length: f64) -> (Vec2, Vec2) {
    let half = Vec2::new(length / 2.0, 0.0);
    (iso.transform_point(-half), iso.transform_point(half))
}

/// Circle vs capsule: reduced to circle-vs-line-segment, thickened by the capsule radius.
pub fn circle_capsule(
    center: Vec2,
    radius: f64,
    capsule_iso: Iso,
    capsule_radius: f64,
    length: f64,
    skin: f64,
) -> Option<Manifold> {
    let (a, b) = capsule_endpoints(capsule_iso, length);
    let closest = closest_point_on_segment(center, a, b);
    circle_circle(center, radius, closest, capsule_radius, skin)
}

/// Circle vs convex polygon, the Box2D `b2CollideCircle`-style algorithm: find the
/// face of maximum separation, then classify into the face/vertex1/vertex2 Voronoi
/// region.
pub fn circle_convex(center: Vec2, radius: f64, poly_iso: Iso, poly: &Polygon, skin: f64) -> Option<Manifold> {
    let n = poly.vertices().len();
    let mut best_index = 0;
    let mut best_separation = f64::NEG_INFINITY;
    for i in 0..n {
        let normal = poly.world_normal(poly_iso, i);
        let vertex = poly.world_vertex(poly_iso, i);
        let separation = normal.dot(center - vertex);
        if separation > best_separation {
            best_separation = separation;
            best_index = i;
        }
    }

    if best_separation > radius + skin {
        return None;
    }

    let v1 = poly.world_vertex(poly_iso, best_index);
    let v2 = poly.world_vertex(poly_iso, (best_index + 1) % n);

    // `normal` above always points away from the polygon surface, i.e. from the poly
    // toward the circle. The manifold convention here is "first argument (the circle)
    // toward second argument (the poly)", so every return below negates it and swaps
    // the per-body points accordingly.
    if best_separation < f64::EPSILON {
        // Center is inside the polygon: use the face normal directly.
        let normal = poly.world_normal(poly_iso, best_index);
        let point_on_face = center - normal * best_separation;
        let depth = radius - best_separation;
        return Some(Manifold::single(-normal, -normal * radius, point_on_face - poly_iso.pos, depth));
    }

    let u1 = (center - v1).dot(v2 - v1);
    let u2 = (center - v2).dot(v1 - v2);

    if u1 <= 0.0 {
        let depth = radius - (center - v1).magnitude();
        if depth <= -skin {
            return None;
        }
        let normal = try_normalized(center - v1);
        return Some(Manifold::single(-normal, -normal * radius, v1 - poly_iso.pos, depth));
    }
    if u2 <= 0.0 {
        let depth = radius - (center - v2).magnitude();
        if depth <= -skin {
            return None;
        }
        let normal = try_normalized(center - v2);
        return Some(Manifold::single(-normal, -normal * radius, v2 - poly_iso.pos, depth));
    }

    let normal = poly.world_normal(poly_iso, best_index);
    let point_on_face = center - normal * best_separation;
    let depth = radius - best_separation;
    if depth <= -skin {
        return None;
    }
    Some(Manifold::single(-normal, -normal * radius, point_on_face - poly_iso.pos, depth))
}

/// For each convex vertex below the plane, one contact point (up to [`MAX_MANIFOLD_POINTS`],
/// keeping the deepest).
pub fn plane_convex(plane_iso: Iso, poly_iso: Iso, poly: &Polygon, skin: f64) -> Option<Manifold> {
    let normal = plane_iso.transform_vector(Vec2::unit_y());
    let mut candidates: ArrayVec<(f64, Vec2), 16> = ArrayVec::new();
    for i in 0..poly.vertices().len() {
        let vertex = poly.world_vertex(poly_iso, i);
        let depth = -(vertex - plane_iso.pos).dot(normal);
        if depth > -skin && candidates.len() < candidates.capacity() {
            candidates.push((depth, vertex));
        }
    }
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

    let mut points: ArrayVec<ManifoldPoint, MAX_MANIFOLD_POINTS> = ArrayVec::new();
    for (depth, vertex) in candidates.into_iter().take(MAX_MANIFOLD_POINTS) {
        let point_on_plane = vertex - normal * (-depth);
        points.push(ManifoldPoint {
            point_a: point_on_plane - plane_iso.pos,
            point_b: vertex - poly_iso.pos,
            depth,
        });
    }
    Some(Manifold { normal, points })
}

pub fn plane_line(plane_iso: Iso, line_iso: Iso, length: f64, skin: f64) -> Option<Manifold> {
    let normal = plane_iso.transform_vector(Vec2::unit_y());
    let (a, b) = capsule_endpoints(line_iso, length);
    let mut points: ArrayVec<ManifoldPoint, MAX_MANIFOLD_POINTS> = ArrayVec::new();
    for endpoint in [a, b] {
        let depth = -(endpoint - plane_iso.pos).dot(normal);
        if depth > -skin {
            let point_on_plane = endpoint - normal * (-depth);
            points.push(ManifoldPoint {
                point_a: point_on_plane - plane_iso.pos,
                point_b: endpoint - line_iso.pos,
                depth,
            });
        }
    }
    if points.is_empty() {
        return None;
    }
    Some(Manifold { normal, points })
}

/// Plane vs capsule: each endpoint treated as a circle of the capsule's radius.
pub fn plane_capsule(plane_iso: Iso, capsule_iso: Iso, radius: f64, length: f64, skin: f64) -> Option<Manifold> {
    let (a, b) = capsule_endpoints(capsule_iso, length);
    let hit_a = circle_plane(plane_iso, a, radius, skin);
    let hit_b = circle_plane(plane_iso, b, radius, skin);
    match (hit_a, hit_b) {
        (None, None) => None,
        (Some(m), None) | (None, Some(m)) => Some(m),
        (Some(mut ma), Some(mb)) => {
            ma.points.extend(mb.points.into_iter().take(MAX_MANIFOLD_POINTS - ma.points.len()));
            Some(ma)
        }
    }
}

fn capsule_as_rectangle(radius: f64, length: f64) -> Polygon {
    Polygon::new(Polygon::rectangle(length, radius * 2.0))
}

/// Keep the [`MAX_MANIFOLD_POINTS`] deepest distinct points from a combined candidate set.
fn merge_points(mut all: Vec<ManifoldPoint>) -> ArrayVec<ManifoldPoint, MAX_MANIFOLD_POINTS> {
    all.sort_by(|a, b| b.depth.partial_cmp(&a.depth).unwrap());
    let mut out: ArrayVec<ManifoldPoint, MAX_MANIFOLD_POINTS> = ArrayVec::new();
    for point in all {
        if out.len() >= MAX_MANIFOLD_POINTS {
            break;
        }
        if out.iter().any(|existing| (existing.point_a - point.point_a).magnitude() < 1e-6) {
            continue;
        }
        out.push(point);
    }
    out
}

/// Convex vs capsule: two circle-vs-convex tests at the endpoints plus one
/// convex-vs-(rectangular middle) test (§4.3).
pub fn convex_capsule(
    poly_iso: Iso,
    poly: &Polygon,
    capsule_iso: Iso,
    radius: f64,
    length: f64,
    skin: f64,
) -> Option<Manifold> {
    let (a, b) = capsule_endpoints(capsule_iso, length);
    let mut candidates: Vec<(Vec2, Vec<ManifoldPoint>)> = Vec::new();

    if let Some(m) = circle_convex(a, radius, poly_iso, poly, skin) {
        candidates.push((-m.normal, m.points.into_iter().map(|p| flip_point(p)).collect()));
    }
    if let Some(m) = circle_convex(b, radius, poly_iso, poly, skin) {
        candidates.push((-m.normal, m.points.into_iter().map(|p| flip_point(p)).collect()));
    }

    let rect = capsule_as_rectangle(radius, length);
    if let Some(m) = convex_convex(poly_iso, poly, capsule_iso, &rect, skin) {
        candidates.push((m.normal, m.points.to_vec()));
    }

    if candidates.is_empty() {
        return None;
    }
    // Use the deepest contact's normal as the manifold normal (stable & SAT-consistent
    // when one sub-test dominates; ties keep the first candidate, the left endpoint).
    let (normal, _) = candidates
        .iter()
        .max_by(|a, b| {
            let da = a.1.iter().map(|p| p.depth).fold(f64::NEG_INFINITY, f64::max);
            let db = b.1.iter().map(|p| p.depth).fold(f64::NEG_INFINITY, f64::max);
            da.partial_cmp(&db).unwrap()
        })
        .cloned()
        .unwrap();
    let all_points: Vec<ManifoldPoint> = candidates.into_iter().flat_map(|(_, pts)| pts).collect();
    let points = merge_points(all_points);
    if points.is_empty() {
        return None;
    }
    Some(Manifold { normal, points })
}

/// Circle-vs-convex returns `point_a` relative to the circle's own center (since the
/// circle was passed as "A" to `circle_convex`); `convex_capsule` needs it the other
/// way around, with the convex polygon as A and the capsule as B.
fn flip_point(p: ManifoldPoint) -> ManifoldPoint {
    ManifoldPoint {
        point_a: p.point_b,
        point_b: p.point_a,
        depth: p.depth,
    }
}

/// Capsule vs capsule: four endpoint-circle tests plus two convex-vs-capsule tests
/// using the middle rectangles (§4.3).
pub fn capsule_capsule(
    iso_a: Iso,
    radius_a: f64,
    length_a: f64,
    iso_b: Iso,
    radius_b: f64,
    length_b: f64,
    skin: f64,
) -> Option<Manifold> {
    let (a0, a1) = capsule_endpoints(iso_a, length_a);
    let (b0, b1) = capsule_endpoints(iso_b, length_b);

    let mut candidates: Vec<(f64, Manifold)> = Vec::new();
    for pa in [a0, a1] {
        for pb in [b0, b1] {
            if let Some(m) = circle_circle(pa, radius_a, pb, radius_b, skin) {
                let depth = m.points[0].depth;
                candidates.push((depth, m));
            }
        }
    }

    let rect_a = capsule_as_rectangle(radius_a, length_a);
    if let Some(m) = convex_convex(iso_a, &rect_a, iso_b, &capsule_as_rectangle(radius_b, length_b), skin) {
        let depth = m.points.iter().map(|p| p.depth).fold(f64::NEG_INFINITY, f64::max);
        candidates.push((depth, m));
    }
    let _ = &rect_a;

    if candidates.is_empty() {
        return None;
    }
    let (_, best) = candidates
        .iter()
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap())
        .cloned()
        .unwrap();
    let all_points: Vec<ManifoldPoint> = candidates.into_iter().flat_map(|(_, m)| m.points.into_iter()).collect();
    let points = merge_points(all_points);
    if points.is_empty() {
        return None;
    }
    Some(Manifold {
        normal: best.normal,
        points,
    })
}

pub fn circle_heightfield(
    center: Vec2,
    radius: f64,
    hf_iso: Iso,
    hf: &crate::shape::Heightfield,
    skin: f64,
) -> Option<Manifold> {
    let local = crate::math::rotate(center - hf_iso.pos, -hf_iso.angle);
    let (lo, hi) = hf.index_range(local.x - radius, local.x + radius);
    if local.y - radius > hf.height_at(hi) {
        return None;
    }

    let mut best: Option<Manifold> = None;
    for index in lo..hi {
        let (a_local, b_local) = hf.segment(index);
        let a = hf_iso.transform_point(a_local);
        let b = hf_iso.transform_point(b_local);
        let closest = closest_point_on_segment(center, a, b);
        if let Some(m) = circle_circle(center, radius, closest, 0.0, skin) {
            let depth = m.points[0].depth;
            if best.as_ref().map_or(true, |existing| depth > existing.points[0].depth) {
                best = Some(m);
            }
        }
    }
    best
}

pub fn convex_heightfield(
    poly_iso: Iso,
    poly: &Polygon,
    hf_iso: Iso,
    hf: &crate::shape::Heightfield,
    skin: f64,
) -> Option<Manifold> {
    let local_aabb = poly.compute_aabb(Iso::new(
        crate::math::rotate(poly_iso.pos - hf_iso.pos, -hf_iso.angle),
        poly_iso.angle - hf_iso.angle,
    ));
    let (lo, hi) = hf.index_range(local_aabb.min.x, local_aabb.max.x);
    if local_aabb.min.y > hf.height_at(hi) {
        return None;
    }

    /// Depth extruded below each heightfield segment to form a solid quad for SAT.
    const EXTRUSION_DEPTH: f64 = 1000.0;

    let mut best: Option<Manifold> = None;
    for index in lo..hi {
        let (a_local, b_local) = hf.segment(index);
        let a = hf_iso.transform_point(a_local);
        let b = hf_iso.transform_point(b_local);
        let down = hf_iso.transform_vector(Vec2::new(0.0, -EXTRUSION_DEPTH));
        let quad = Polygon::new(vec![a, b, b + down, a + down]);
        if let Some(m) = convex_convex(Iso::from_pos(Vec2::zero()), &quad, poly_iso, poly, skin) {
            let depth = m.points.iter().map(|p| p.depth).fold(f64::NEG_INFINITY, f64::max);
            if best
                .as_ref()
                .map_or(true, |existing| depth > existing.points.iter().map(|p| p.depth).fold(f64::NEG_INFINITY, f64::max))
            {
                // `convex_convex` was called with the extruded quad as its first
                // argument, so its manifold points quad -> poly; this function's own
                // convention is poly (first argument) -> heightfield, so flip both.
                best = Some(Manifold {
                    normal: -m.normal,
                    points: m
                        .points
                        .into_iter()
                        .map(|p| ManifoldPoint {
                            point_a: p.point_b,
                            point_b: p.point_a,
                            depth: p.depth,
                        })
                        .collect(),
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_plane_contact_depth_matches_penetration() {
        let plane_iso = Iso::from_pos(Vec2::zero());
        let manifold = circle_plane(plane_iso, Vec2::new(0.0, 0.5), 1.0, 0.0).expect("should touch");
        assert!((manifold.points[0].depth - 0.5).abs() < 1e-9);
    }

    #[test]
    fn circle_capsule_hits_the_shaft() {
        let capsule_iso = Iso::from_pos(Vec2::zero());
        let manifold = circle_capsule(Vec2::new(0.0, 1.2), 1.0, capsule_iso, 0.5, 4.0, 0.0)
            .expect("circle should touch the capsule shaft");
        assert!(manifold.points[0].depth > 0.0);
    }

    #[test]
    fn circle_inside_box_uses_face_normal() {
        let poly = Polygon::new(Polygon::rectangle(4.0, 4.0));
        let manifold = circle_convex(Vec2::new(0.0, 0.0), 1.0, Iso::from_pos(Vec2::zero()), &poly, 0.0)
            .expect("circle center inside box should collide");
        assert!(manifold.points[0].depth >= 1.0);
    }

    #[test]
    fn plane_box_keeps_two_deepest_vertices() {
        let poly = Polygon::new(Polygon::rectangle(2.0, 1.0));
        let manifold = plane_convex(Iso::from_pos(Vec2::zero()), Iso::from_pos(Vec2::new(0.0, 0.4)), &poly, 0.0)
            .expect("box should rest on the plane");
        assert_eq!(manifold.points.len(), 2);
    }
}
