//! Sweep-and-prune broadphase: one axis-sorted list, incrementally insertion-sorted (§4.2).

use slotmap::{Key, SlotMap};

use super::{canonical_pair, can_collide, Broadphase};
use crate::body::{Body, BodyId};
use crate::math::Aabb;

/// Maintains a list of bodies sorted by their AABB's lower x-bound. Re-sorting with
/// insertion sort is cheap because the order rarely changes much frame to frame.
#[derive(Default)]
pub struct SweepAndPrune {
    order: Vec<BodyId>,
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self { order: Vec::new() }
    }

    fn insertion_sort(&mut self, bodies: &SlotMap<BodyId, Body>) {
        self.order.retain(|id| bodies.contains_key(*id));
        for id in bodies.keys() {
            if !self.order.contains(&id) {
                self.order.push(id);
            }
        }

        let lower_x = |id: BodyId| bodies[id].get_aabb().min.x;
        for i in 1..self.order.len() {
            let mut j = i;
            while j > 0 && lower_x(self.order[j - 1]) > lower_x(self.order[j]) {
                self.order.swap(j - 1, j);
                j -= 1;
            }
        }
    }
}

impl Broadphase for SweepAndPrune {
    fn collision_pairs(&mut self, bodies: &SlotMap<BodyId, Body>) -> Vec<(BodyId, BodyId)> {
        self.insertion_sort(bodies);

        let mut pairs = Vec::new();
        for i in 0..self.order.len() {
            let a = self.order[i];
            let a_body = &bodies[a];
            let a_aabb = a_body.get_aabb();
            for &b in &self.order[i + 1..] {
                let b_body = &bodies[b];
                let b_aabb = b_body.get_aabb();
                if b_aabb.min.x > a_aabb.max.x {
                    // Sorted by lower x-bound: once the next lower bound exceeds our
                    // upper bound, nothing further right can overlap us either.
                    break;
                }
                if !a_aabb.collides_with_aabr(b_aabb) {
                    continue;
                }
                if !can_collide(a_body, b_body) {
                    continue;
                }
                pairs.push(canonical_pair(a, b));
            }
        }
        pairs.sort_by_key(|(x, y)| (x.data().as_ffi(), y.data().as_ffi()));
        pairs.dedup();
        pairs
    }

    fn aabb_query(&self, bodies: &SlotMap<BodyId, Body>, aabb: Aabb) -> Vec<BodyId> {
        bodies
            .iter()
            .filter(|(_, body)| body.get_aabb().collides_with_aabr(aabb))
            .map(|(id, _)| id)
            .collect()
    }
}
