//! Broadphase collision culling (§4.2): two interchangeable implementations
//! honoring one contract — candidate body pairs, AABB queries, and the
//! static collide-ability predicate shared by both.

mod spatial_hash;
mod sweep_prune;

pub use spatial_hash::SpatialHash;
pub use sweep_prune::SweepAndPrune;

use slotmap::SlotMap;

use crate::body::{Body, BodyId};
use crate::math::Aabb;

/// Shared contract both broadphase implementations honor (§4.2).
pub trait Broadphase {
    /// Every unordered candidate pair at most once, already filtered by [`can_collide`].
    fn collision_pairs(&mut self, bodies: &SlotMap<BodyId, Body>) -> Vec<(BodyId, BodyId)>;

    /// Every body whose AABB intersects `aabb`.
    fn aabb_query(&self, bodies: &SlotMap<BodyId, Body>, aabb: Aabb) -> Vec<BodyId>;
}

/// Two bodies cannot collide when both are static, both kinematic, one static and one
/// kinematic, both sleeping, or one static and the other sleeping (§4.2).
pub fn can_collide(a: &Body, b: &Body) -> bool {
    if a.is_static() && b.is_static() {
        return false;
    }
    if a.is_kinematic() && b.is_kinematic() {
        return false;
    }
    if (a.is_static() && b.is_kinematic()) || (a.is_kinematic() && b.is_static()) {
        return false;
    }
    if a.is_sleeping() && b.is_sleeping() {
        return false;
    }
    if (a.is_static() && b.is_sleeping()) || (a.is_sleeping() && b.is_static()) {
        return false;
    }
    true
}

/// Canonical (min, max) ordering for an unordered body-id pair, keyed by the slotmap's
/// stable `u64` encoding, so pair sets/dedup never depend on iteration order.
pub(crate) fn canonical_pair(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    use slotmap::Key;
    if a.data().as_ffi() <= b.data().as_ffi() {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyOptions;

    #[test]
    fn two_static_bodies_never_collide() {
        let a = Body::new_static(BodyOptions::default());
        let b = Body::new_static(BodyOptions::default());
        assert!(!can_collide(&a, &b));
    }

    #[test]
    fn dynamic_vs_static_can_collide() {
        let a = Body::new_dynamic(BodyOptions::default(), Default::default());
        let b = Body::new_static(BodyOptions::default());
        assert!(can_collide(&a, &b));
        assert!(can_collide(&b, &a));
    }

    #[test]
    fn sleeping_dynamic_vs_static_cannot_collide() {
        let mut a = Body::new_dynamic(BodyOptions::default(), Default::default());
        a.sleep();
        let b = Body::new_static(BodyOptions::default());
        assert!(!can_collide(&a, &b));
        assert!(!can_collide(&b, &a));
    }
}
