//! Island splitting: partitions bodies and equations into connected components
//! reachable through dynamic bodies (§4.5, §8 invariant 9).
//!
//! Solved independently of [`crate::solver`]: this module only computes *which*
//! bodies and equation indices belong together; `world.rs` still calls
//! [`crate::solver::solve`] once per island.

use std::collections::{HashMap, HashSet, VecDeque};

use slotmap::SlotMap;

use crate::body::{Body, BodyId};

/// One maximal connected component of dynamic bodies (plus the static/kinematic
/// bodies reached as leaves through them) together with the indices into the
/// step's contact/friction/joint buffers that belong to it.
#[derive(Debug, Default, Clone)]
pub struct Island {
    pub bodies: Vec<BodyId>,
    pub contact_indices: Vec<usize>,
    pub friction_indices: Vec<usize>,
    pub joint_indices: Vec<usize>,
}

#[derive(Clone, Copy)]
enum Kind {
    Contact,
    Friction,
    Joint,
}

/// Build islands from this step's equation set, given as parallel `(body_a, body_b)`
/// pair lists for each equation kind, indexed the same way as the caller's buffers.
///
/// BFS only continues through dynamic neighbors (§4.5): static/kinematic bodies are
/// added to whichever island reaches them but never propagate the traversal further,
/// since they never form the only link between two otherwise-unconnected dynamic
/// components (the broadphase never produces a static-static or static-kinematic
/// candidate pair, so every edge here touches at least one dynamic body).
pub fn split(
    bodies: &SlotMap<BodyId, Body>,
    contact_pairs: &[(BodyId, BodyId)],
    friction_pairs: &[(BodyId, BodyId)],
    joint_pairs: &[(BodyId, BodyId)],
) -> Vec<Island> {
    let mut adjacency: HashMap<BodyId, Vec<(BodyId, Kind, usize)>> = HashMap::new();
    let mut add_edges = |pairs: &[(BodyId, BodyId)], kind: Kind| {
        for (i, &(a, b)) in pairs.iter().enumerate() {
            adjacency.entry(a).or_default().push((b, kind, i));
            adjacency.entry(b).or_default().push((a, kind, i));
        }
    };
    add_edges(contact_pairs, Kind::Contact);
    add_edges(friction_pairs, Kind::Friction);
    add_edges(joint_pairs, Kind::Joint);

    let mut visited: HashSet<BodyId> = HashSet::new();
    let mut islands = Vec::new();

    for (id, body) in bodies.iter() {
        if !body.is_dynamic() || visited.contains(&id) {
            continue;
        }

        let mut island_bodies = Vec::new();
        let mut island_body_set = HashSet::new();
        let mut contact_idx = HashSet::new();
        let mut friction_idx = HashSet::new();
        let mut joint_idx = HashSet::new();

        let mut queue = VecDeque::new();
        queue.push_back(id);
        visited.insert(id);

        while let Some(current) = queue.pop_front() {
            if island_body_set.insert(current) {
                island_bodies.push(current);
            }
            let Some(neighbors) = adjacency.get(&current) else {
                continue;
            };
            for &(other, kind, idx) in neighbors {
                match kind {
                    Kind::Contact => {
                        contact_idx.insert(idx);
                    }
                    Kind::Friction => {
                        friction_idx.insert(idx);
                    }
                    Kind::Joint => {
                        joint_idx.insert(idx);
                    }
                }
                if island_body_set.insert(other) {
                    island_bodies.push(other);
                }
                if bodies[other].is_dynamic() && visited.insert(other) {
                    queue.push_back(other);
                }
            }
        }

        let mut contact_indices: Vec<usize> = contact_idx.into_iter().collect();
        contact_indices.sort_unstable();
        let mut friction_indices: Vec<usize> = friction_idx.into_iter().collect();
        friction_indices.sort_unstable();
        let mut joint_indices: Vec<usize> = joint_idx.into_iter().collect();
        joint_indices.sort_unstable();

        islands.push(Island {
            bodies: island_bodies,
            contact_indices,
            friction_indices,
            joint_indices,
        });
    }

    islands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyOptions;

    #[test]
    fn two_disjoint_contacts_form_two_islands() {
        let mut bodies = SlotMap::<BodyId, Body>::with_key();
        let a = bodies.insert(Body::new_dynamic(BodyOptions::default(), Default::default()));
        let b = bodies.insert(Body::new_dynamic(BodyOptions::default(), Default::default()));
        let c = bodies.insert(Body::new_dynamic(BodyOptions::default(), Default::default()));
        let d = bodies.insert(Body::new_dynamic(BodyOptions::default(), Default::default()));

        let contacts = vec![(a, b), (c, d)];
        let islands = split(&bodies, &contacts, &[], &[]);

        assert_eq!(islands.len(), 2);
        for island in &islands {
            assert_eq!(island.bodies.len(), 2);
        }
    }

    #[test]
    fn static_body_does_not_bridge_two_dynamic_islands() {
        let mut bodies = SlotMap::<BodyId, Body>::with_key();
        let ground = bodies.insert(Body::new_static(BodyOptions::default()));
        let a = bodies.insert(Body::new_dynamic(BodyOptions::default(), Default::default()));
        let b = bodies.insert(Body::new_dynamic(BodyOptions::default(), Default::default()));

        // Both dynamic bodies touch the same static ground, but not each other.
        let contacts = vec![(a, ground), (b, ground)];
        let islands = split(&bodies, &contacts, &[], &[]);

        assert_eq!(islands.len(), 2);
    }

    #[test]
    fn lone_dynamic_body_forms_its_own_island() {
        let mut bodies = SlotMap::<BodyId, Body>::with_key();
        let a = bodies.insert(Body::new_dynamic(BodyOptions::default(), Default::default()));
        let islands = split(&bodies, &[], &[], &[]);
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].bodies, vec![a]);
    }
}
