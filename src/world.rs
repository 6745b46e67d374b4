//! The simulated world: owns every body, shape, constraint, spring and contact
//! material, and drives the fixed twelve-phase step pipeline (§4.8).

use std::collections::{HashMap, HashSet};

use slotmap::SlotMap;

use crate::body::{Body, BodyId, BodyKind, BodyOptions, DynamicBodyOptions, ShapeId, SleepState};
use crate::broadphase::{self, Broadphase, SpatialHash};
use crate::ccd;
use crate::config::{Settings, SleepMode};
use crate::constraint::{Constraint, ConstraintId};
use crate::equation::{ContactEquation, FrictionEquation, JointEquation};
use crate::error::{PhysicsError, PhysicsResult};
use crate::events::Event;
use crate::island;
use crate::material::{canonical_material_pair, ContactMaterial, Material, MaterialId};
use crate::math::Vec2;
use crate::narrowphase;
use crate::overlap::{OverlapKeeper, ShapePair};
use crate::raycast::{self, Hit, RaycastOptions};
use crate::shape::Shape;
use crate::solver;
use crate::spring::{Spring, SpringId};

/// One shape-pair overlap found during narrowphase this step (§4.8 step 3).
struct ShapePairHit {
    body_a: BodyId,
    body_b: BodyId,
    shape_a: ShapeId,
    shape_b: ShapeId,
    manifold: narrowphase::Manifold,
    sensor: bool,
}

fn canonical_shape_pair(a: (BodyId, ShapeId), b: (BodyId, ShapeId)) -> ShapePair {
    use slotmap::Key;
    if a.1.data().as_ffi() <= b.1.data().as_ffi() {
        (a.0, a.1, b.0, b.1)
    } else {
        (b.0, b.1, a.0, a.1)
    }
}

/// Obtain mutable references to two distinct bodies at once, needed to apply a
/// spring's force to both endpoints in the same pass (§4.8 step 1).
fn two_bodies_mut(bodies: &mut SlotMap<BodyId, Body>, a: BodyId, b: BodyId) -> (&mut Body, &mut Body) {
    assert_ne!(a, b, "a spring's two endpoints must be distinct bodies");
    // SAFETY: `a != b` and slotmap never hands out two live keys backed by the
    // same slot, so the two indices below always address disjoint memory.
    unsafe {
        let ptr = bodies as *mut SlotMap<BodyId, Body>;
        (&mut (*ptr)[a], &mut (*ptr)[b])
    }
}

/// The simulated world (§3 "World", §6).
pub struct World {
    bodies: SlotMap<BodyId, Body>,
    constraints: SlotMap<ConstraintId, Constraint>,
    springs: SlotMap<SpringId, Spring>,
    materials: SlotMap<MaterialId, Material>,
    contact_materials: HashMap<(MaterialId, MaterialId), ContactMaterial>,
    default_contact_material: ContactMaterial,
    broadphase: Box<dyn Broadphase>,
    overlap_keeper: OverlapKeeper,
    contacts: Vec<ContactEquation>,
    frictions: Vec<FrictionEquation>,
    events: Vec<Event>,
    pending_removal: Vec<BodyId>,
    settings: Settings,
    time: f64,
    stepped: bool,
}

impl World {
    /// A world using the default [`SpatialHash`] broadphase.
    pub fn new(settings: Settings) -> Self {
        Self::with_broadphase(settings, Box::new(SpatialHash::new(settings.broadphase)))
    }

    /// A world using a caller-supplied broadphase implementation.
    pub fn with_broadphase(settings: Settings, broadphase: Box<dyn Broadphase>) -> Self {
        Self {
            bodies: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            springs: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            contact_materials: HashMap::new(),
            default_contact_material: ContactMaterial::default(),
            broadphase,
            overlap_keeper: OverlapKeeper::new(),
            contacts: Vec::new(),
            frictions: Vec::new(),
            events: Vec::new(),
            pending_removal: Vec::new(),
            settings,
            time: 0.0,
            stepped: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    // --- Bodies -----------------------------------------------------------

    pub fn add_body(&mut self, mut body: Body) -> PhysicsResult<BodyId> {
        if body.in_world {
            return Err(PhysicsError::BodyAlreadyInWorld);
        }
        body.in_world = true;
        body.update_aabb();
        let id = self.bodies.insert(body);
        self.bodies[id].relink_shapes(id);
        self.events.push(Event::AddBody(id));
        Ok(id)
    }

    /// Queue a body for removal; it is actually dropped during this step's deferred
    /// removal phase (§4.8 step 12), so callers may safely call this mid-step.
    pub fn remove_body(&mut self, id: BodyId) -> PhysicsResult<()> {
        if !self.bodies.contains_key(id) {
            return Err(PhysicsError::UnknownBody);
        }
        self.pending_removal.push(id);
        Ok(())
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(id)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &Body)> {
        self.bodies.iter()
    }

    // --- Constraints --------------------------------------------------------

    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintId {
        self.constraints.insert(constraint)
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> PhysicsResult<()> {
        self.constraints.remove(id).map(|_| ()).ok_or(PhysicsError::UnknownConstraint)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id)
    }

    pub fn constraint_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint> {
        self.constraints.get_mut(id)
    }

    // --- Springs -------------------------------------------------------------

    pub fn add_spring(&mut self, spring: Spring) -> SpringId {
        let id = self.springs.insert(spring);
        self.events.push(Event::AddSpring(id));
        id
    }

    pub fn remove_spring(&mut self, id: SpringId) -> PhysicsResult<()> {
        self.springs.remove(id).ok_or(PhysicsError::UnknownSpring)?;
        self.events.push(Event::RemoveSpring(id));
        Ok(())
    }

    pub fn spring(&self, id: SpringId) -> Option<&Spring> {
        self.springs.get(id)
    }

    pub fn spring_mut(&mut self, id: SpringId) -> Option<&mut Spring> {
        self.springs.get_mut(id)
    }

    // --- Materials -------------------------------------------------------------

    /// Mint a new, empty [`Material`] identity.
    pub fn add_material(&mut self) -> MaterialId {
        self.materials.insert(Material)
    }

    pub fn set_default_contact_material(&mut self, material: ContactMaterial) {
        self.default_contact_material = material;
    }

    pub fn default_contact_material(&self) -> ContactMaterial {
        self.default_contact_material
    }

    pub fn add_contact_material(&mut self, material: ContactMaterial) {
        self.contact_materials.insert(material.key(), material);
    }

    pub fn remove_contact_material(&mut self, a: MaterialId, b: MaterialId) -> PhysicsResult<()> {
        self.contact_materials
            .remove(&canonical_material_pair(a, b))
            .map(|_| ())
            .ok_or(PhysicsError::UnknownContactMaterial)
    }

    fn contact_material_for(&self, shape_a: &Shape, shape_b: &Shape) -> ContactMaterial {
        match (shape_a.material, shape_b.material) {
            (Some(ma), Some(mb)) => self
                .contact_materials
                .get(&canonical_material_pair(ma, mb))
                .copied()
                .unwrap_or(self.default_contact_material),
            _ => self.default_contact_material,
        }
    }

    // --- Queries -------------------------------------------------------------

    pub fn raycast(&self, from: Vec2, to: Vec2, options: &RaycastOptions) -> Option<Hit> {
        raycast::raycast(&self.bodies, self.broadphase.as_ref(), from, to, options)
    }

    pub fn raycast_all(&self, from: Vec2, to: Vec2, options: &RaycastOptions) -> Vec<Hit> {
        raycast::raycast_all(&self.bodies, self.broadphase.as_ref(), from, to, options)
    }

    /// Whether these two bodies' shapes were overlapping as of the most recent step.
    pub fn bodies_overlap(&self, a: BodyId, b: BodyId) -> PhysicsResult<bool> {
        if !self.stepped {
            return Err(PhysicsError::WorldNotStepped);
        }
        Ok(self.overlap_keeper.was_body_pair_overlapping(a, b))
    }

    /// Drain every event buffered since the last call (§4.8, events.rs).
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Remove every body, constraint, spring and buffered event, resetting time to zero.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.constraints.clear();
        self.springs.clear();
        self.contacts.clear();
        self.frictions.clear();
        self.events.clear();
        self.pending_removal.clear();
        self.overlap_keeper = OverlapKeeper::new();
        self.time = 0.0;
        self.stepped = false;
    }

    // --- The step pipeline (§4.8) -------------------------------------------

    /// Advance the simulation by `dt` seconds, running the fixed twelve-phase
    /// pipeline described in §4.8. `dt` is not subdivided into substeps here;
    /// callers that want a fixed-rate accumulator loop build it on top of this.
    pub fn step(&mut self, dt: f64) {
        log::trace!("world step starting at t={} dt={dt}", self.time);

        self.apply_forces(dt);

        let candidate_pairs = self.broadphase_phase();
        let hits = self.generate_hits(&candidate_pairs);

        self.overlap_bookkeeping(&hits);
        let contact_indices_by_pair = self.build_equations(&hits);
        self.wake_up_phase(&hits);
        self.emit_collision_events(&contact_indices_by_pair);
        self.overlap_keeper.commit();

        self.solve_phase(dt);
        self.integrate_phase(dt);
        self.impact_events();
        self.sleep_phase(dt);
        self.deferred_removal();

        self.time += dt;
        self.stepped = true;
        self.events.push(Event::PostStep);
        log::trace!("world step finished at t={}", self.time);
    }

    /// §4.8 step 1: gravity, springs, then velocity damping, applied to every
    /// awake dynamic body.
    fn apply_forces(&mut self, h: f64) {
        let gravity = self.settings.gravity;
        for (_, body) in self.bodies.iter_mut() {
            if let BodyKind::Dynamic(_, dp) = &mut body.kind {
                if dp.sleep_state != SleepState::Sleeping {
                    dp.force += gravity * dp.mass;
                }
            }
        }

        let spring_ids: Vec<SpringId> = self.springs.keys().collect();
        for id in spring_ids {
            let spring = self.springs[id];
            if spring.body_a == spring.body_b {
                continue;
            }
            if !self.bodies.contains_key(spring.body_a) || !self.bodies.contains_key(spring.body_b) {
                continue;
            }
            let (body_a, body_b) = two_bodies_mut(&mut self.bodies, spring.body_a, spring.body_b);
            spring.apply_force(body_a, body_b);
        }

        for (_, body) in self.bodies.iter_mut() {
            if let BodyKind::Dynamic(motion, dp) = &mut body.kind {
                if dp.sleep_state == SleepState::Sleeping {
                    continue;
                }
                motion.velocity = motion.velocity * (1.0 - dp.damping).powf(h);
                motion.angular_velocity *= (1.0 - dp.angular_damping).powf(h);
            }
        }
    }

    /// §4.8 step 2: broadphase candidate pairs, filtered by `collide_connected`.
    fn broadphase_phase(&mut self) -> Vec<(BodyId, BodyId)> {
        let raw_pairs = self.broadphase.collision_pairs(&self.bodies);
        let disconnected: HashSet<(BodyId, BodyId)> = self
            .constraints
            .values()
            .filter(|c| !c.collide_connected())
            .map(|c| broadphase::canonical_pair(c.body_a(), c.body_b()))
            .collect();
        let pairs: Vec<(BodyId, BodyId)> = raw_pairs
            .into_iter()
            .filter(|p| !disconnected.contains(p))
            .collect();
        self.events.push(Event::PostBroadphase(pairs.clone()));
        pairs
    }

    /// §4.8 step 3: per-shape-pair manifolds for every broadphase candidate pair,
    /// honoring the shape-level collision group/mask filter (§4.2).
    fn generate_hits(&self, pairs: &[(BodyId, BodyId)]) -> Vec<ShapePairHit> {
        let mut hits = Vec::new();
        for &(a, b) in pairs {
            let body_a = &self.bodies[a];
            let body_b = &self.bodies[b];
            for (shape_a_id, shape_a) in body_a.shapes() {
                for (shape_b_id, shape_b) in body_b.shapes() {
                    if shape_a.collision_group & shape_b.collision_mask == 0 {
                        continue;
                    }
                    if shape_b.collision_group & shape_a.collision_mask == 0 {
                        continue;
                    }
                    let iso_a = shape_a.world_transform(body_a.position, body_a.angle);
                    let iso_b = shape_b.world_transform(body_b.position, body_b.angle);
                    let material = self.contact_material_for(shape_a, shape_b);
                    if let Some(mut manifold) = narrowphase::generate_manifold(
                        iso_a,
                        shape_a.geometry(),
                        iso_b,
                        shape_b.geometry(),
                        material.contact_skin_size,
                    ) {
                        // Narrowphase handlers return points relative to each shape's
                        // own world center (`iso_a.pos`/`iso_b.pos`); rebase them onto
                        // the owning body's center so `ContactEquation`'s rA/rB torque
                        // arms (§3, §4.4) are correct for shapes with a nonzero offset.
                        let shape_to_body_a = iso_a.pos - body_a.position;
                        let shape_to_body_b = iso_b.pos - body_b.position;
                        for point in manifold.points.iter_mut() {
                            point.point_a += shape_to_body_a;
                            point.point_b += shape_to_body_b;
                        }
                        hits.push(ShapePairHit {
                            body_a: a,
                            body_b: b,
                            shape_a: shape_a_id,
                            shape_b: shape_b_id,
                            manifold,
                            sensor: shape_a.sensor || shape_b.sensor,
                        });
                    }
                }
            }
        }
        hits
    }

    /// §4.8 step 4: feed this step's manifolds into the overlap keeper. Must run
    /// before [`Self::build_equations`] so `first_impact` can still consult last
    /// step's membership, and before [`OverlapKeeper::commit`].
    fn overlap_bookkeeping(&mut self, hits: &[ShapePairHit]) {
        for hit in hits {
            self.overlap_keeper
                .set_overlapping(hit.body_a, hit.shape_a, hit.body_b, hit.shape_b);
        }
    }

    /// §4.8 step 5: build this step's contact and friction equations. Returns the
    /// contact-equation indices generated for each shape pair, used to populate
    /// `BeginContact`'s `contact_equations` payload.
    fn build_equations(&mut self, hits: &[ShapePairHit]) -> HashMap<ShapePair, Vec<usize>> {
        self.contacts.clear();
        self.frictions.clear();
        let mut contact_indices_by_pair: HashMap<ShapePair, Vec<usize>> = HashMap::new();
        let friction_reduction = self.settings.world.friction_reduction;

        for hit in hits {
            let key = canonical_shape_pair((hit.body_a, hit.shape_a), (hit.body_b, hit.shape_b));
            if hit.sensor {
                contact_indices_by_pair.entry(key).or_default();
                continue;
            }

            let body_a = &self.bodies[hit.body_a];
            let body_b = &self.bodies[hit.body_b];
            let shape_a = body_a.shape(hit.shape_a).expect("hit shape must exist on body_a");
            let shape_b = body_b.shape(hit.shape_b).expect("hit shape must exist on body_b");
            let material = self.contact_material_for(shape_a, shape_b);
            let enabled = body_a.collision_response
                && body_b.collision_response
                && shape_a.collision_response
                && shape_b.collision_response;
            let first_impact = !self.overlap_keeper.was_body_pair_overlapping(hit.body_a, hit.body_b);

            let mut local_indices = Vec::with_capacity(hit.manifold.points.len());
            for point in &hit.manifold.points {
                let mut contact = ContactEquation::new(hit.body_a, hit.body_b, hit.shape_a, hit.shape_b);
                contact.normal_a = hit.manifold.normal;
                contact.contact_point_a = point.point_a;
                contact.contact_point_b = point.point_b;
                contact.restitution = material.restitution;
                contact.first_impact = first_impact;
                contact.equation.stiffness = material.stiffness;
                contact.equation.relaxation = material.relaxation;
                contact.equation.enabled = enabled;
                contact.update_jacobian();
                contact.update_offset(point.depth, material.contact_skin_size);
                if material.restitution > 0.0 {
                    let closing_velocity = contact.equation.gw(
                        body_a.velocity(),
                        body_a.angular_velocity(),
                        body_b.velocity(),
                        body_b.angular_velocity(),
                    );
                    if closing_velocity < 0.0 {
                        contact.equation.relative_velocity = material.restitution * closing_velocity;
                    }
                }
                let idx = self.contacts.len();
                self.contacts.push(contact);
                local_indices.push(idx);
            }
            contact_indices_by_pair.insert(key, local_indices.clone());

            if local_indices.is_empty() {
                continue;
            }

            if friction_reduction {
                let n = local_indices.len() as f64;
                let point_a_avg = local_indices
                    .iter()
                    .map(|&i| self.contacts[i].contact_point_a)
                    .fold(Vec2::zero(), |acc, p| acc + p)
                    / n;
                let point_b_avg = local_indices
                    .iter()
                    .map(|&i| self.contacts[i].contact_point_b)
                    .fold(Vec2::zero(), |acc, p| acc + p)
                    / n;
                let mut friction = FrictionEquation::new(hit.body_a, hit.body_b, hit.shape_a, hit.shape_b);
                friction.tangent = crate::math::rotate90cw(hit.manifold.normal);
                friction.contact_point_a = point_a_avg;
                friction.contact_point_b = point_b_avg;
                friction.friction_coefficient = material.friction;
                friction.equation.enabled = enabled;
                friction.equation.relative_velocity = material.surface_velocity;
                friction.source_contacts = local_indices.iter().copied().collect();
                friction.update_jacobian();
                self.frictions.push(friction);
            } else {
                for &idx in &local_indices {
                    let source = self.contacts[idx];
                    let mut friction = FrictionEquation::new(hit.body_a, hit.body_b, hit.shape_a, hit.shape_b);
                    friction.tangent = crate::math::rotate90cw(source.normal_a);
                    friction.contact_point_a = source.contact_point_a;
                    friction.contact_point_b = source.contact_point_b;
                    friction.friction_coefficient = material.friction;
                    friction.equation.enabled = enabled;
                    friction.equation.relative_velocity = material.surface_velocity;
                    friction.source_contacts.push(idx);
                    friction.update_jacobian();
                    self.frictions.push(friction);
                }
            }
        }

        contact_indices_by_pair
    }

    /// §4.8 step 6: wake a sleeping body if the awake body it's overlapping is
    /// moving fast enough (speed^2 >= 2 * its own sleep_speed_limit^2).
    fn wake_up_phase(&mut self, hits: &[ShapePairHit]) {
        let mut body_pairs: HashSet<(BodyId, BodyId)> = HashSet::new();
        for hit in hits {
            body_pairs.insert(broadphase::canonical_pair(hit.body_a, hit.body_b));
        }

        for (a, b) in body_pairs {
            let a_sleeping = self.bodies[a].is_sleeping();
            let b_sleeping = self.bodies[b].is_sleeping();
            if a_sleeping == b_sleeping {
                continue;
            }
            let (sleeper, other) = if a_sleeping { (a, b) } else { (b, a) };
            let other_body = &self.bodies[other];
            let other_speed_sq = other_body.velocity().magnitude_squared();
            let other_limit = other_body
                .dynamic_properties()
                .map(|dp| dp.sleep_speed_limit)
                .unwrap_or(0.0);
            if other_speed_sq >= 2.0 * other_limit * other_limit {
                self.bodies[sleeper].wake_up();
                self.events.push(Event::WakeUp(sleeper));
            }
        }
    }

    /// §4.8 step 7: begin/end contact and pre-solve events.
    fn emit_collision_events(&mut self, contact_indices_by_pair: &HashMap<ShapePair, Vec<usize>>) {
        let new_overlaps = self.overlap_keeper.new_overlaps();
        let ended_overlaps = self.overlap_keeper.ended_overlaps();

        for (body_a, shape_a, body_b, shape_b) in new_overlaps {
            let contact_equations = contact_indices_by_pair
                .get(&(body_a, shape_a, body_b, shape_b))
                .map(|indices| indices.iter().map(|&i| self.contacts[i]).collect())
                .unwrap_or_default();
            self.events.push(Event::BeginContact {
                body_a,
                body_b,
                shape_a,
                shape_b,
                contact_equations,
            });
        }
        for (body_a, shape_a, body_b, shape_b) in ended_overlaps {
            self.events.push(Event::EndContact {
                body_a,
                body_b,
                shape_a,
                shape_b,
            });
        }

        self.events.push(Event::PreSolve {
            contacts: self.contacts.clone(),
            frictions: self.frictions.clone(),
        });
    }

    fn contact_body_pairs(&self) -> Vec<(BodyId, BodyId)> {
        self.contacts.iter().map(|c| (c.equation.body_a, c.equation.body_b)).collect()
    }

    fn friction_body_pairs(&self) -> Vec<(BodyId, BodyId)> {
        self.frictions.iter().map(|f| (f.equation.body_a, f.equation.body_b)).collect()
    }

    fn joint_body_pairs(&self) -> Vec<(BodyId, BodyId)> {
        self.constraints.values().map(|c| (c.body_a(), c.body_b())).collect()
    }

    /// §4.8 step 8: refresh every constraint's equations from the current pose,
    /// then solve globally or per-island.
    fn solve_phase(&mut self, h: f64) {
        let ids: Vec<ConstraintId> = self.constraints.keys().collect();
        for id in ids {
            let (a, b) = {
                let c = &self.constraints[id];
                (c.body_a(), c.body_b())
            };
            self.constraints[id].update(&self.bodies[a], &self.bodies[b]);
        }

        if self.settings.world.island_split {
            self.solve_islands(h);
        } else {
            self.solve_global(h);
        }
    }

    fn solve_global(&mut self, h: f64) {
        let mut joint_refs: Vec<&mut JointEquation> = Vec::new();
        for (_, constraint) in self.constraints.iter_mut() {
            for eq in constraint.equations_mut() {
                joint_refs.push(eq);
            }
        }
        solver::solve(
            &mut self.bodies,
            &mut self.contacts,
            &mut self.frictions,
            &mut joint_refs,
            h,
            &self.settings.solver,
        );
    }

    fn solve_islands(&mut self, h: f64) {
        struct JointSlot {
            constraint_id: ConstraintId,
            index: usize,
        }

        let contact_pairs = self.contact_body_pairs();
        let friction_pairs = self.friction_body_pairs();

        let mut joint_pairs: Vec<(BodyId, BodyId)> = Vec::new();
        let mut joint_values: Vec<JointEquation> = Vec::new();
        let mut joint_slots: Vec<JointSlot> = Vec::new();
        for (cid, constraint) in self.constraints.iter() {
            let a = constraint.body_a();
            let b = constraint.body_b();
            for (i, eq) in constraint.equations().iter().enumerate() {
                joint_pairs.push((a, b));
                joint_values.push(*eq);
                joint_slots.push(JointSlot { constraint_id: cid, index: i });
            }
        }

        let islands = island::split(&self.bodies, &contact_pairs, &friction_pairs, &joint_pairs);

        for isl in &islands {
            let mut contacts: Vec<ContactEquation> = isl.contact_indices.iter().map(|&i| self.contacts[i]).collect();
            let mut frictions: Vec<FrictionEquation> =
                isl.friction_indices.iter().map(|&i| self.frictions[i].clone()).collect();
            let mut joints: Vec<JointEquation> = isl.joint_indices.iter().map(|&i| joint_values[i]).collect();
            let mut joint_refs: Vec<&mut JointEquation> = joints.iter_mut().collect();

            solver::solve(
                &mut self.bodies,
                &mut contacts,
                &mut frictions,
                &mut joint_refs,
                h,
                &self.settings.solver,
            );

            for (slot_idx, &orig_idx) in isl.contact_indices.iter().enumerate() {
                self.contacts[orig_idx] = contacts[slot_idx];
            }
            for (slot_idx, &orig_idx) in isl.friction_indices.iter().enumerate() {
                self.frictions[orig_idx] = frictions[slot_idx].clone();
            }
            for (slot_idx, &orig_idx) in isl.joint_indices.iter().enumerate() {
                let slot = &joint_slots[orig_idx];
                self.constraints[slot.constraint_id].equations_mut()[slot.index] = joints[slot_idx];
            }
        }
    }

    /// §4.8 step 9: integrate every kinematic body and every awake dynamic body,
    /// running CCD where a body opted in, then zero accumulated forces.
    fn integrate_phase(&mut self, h: f64) {
        let ids: Vec<BodyId> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.is_kinematic() || (b.is_dynamic() && !b.is_sleeping()))
            .map(|(id, _)| id)
            .collect();

        for id in ids {
            let (velocity, angular_velocity) = {
                let body = &mut self.bodies[id];
                if let BodyKind::Dynamic(motion, dp) = &mut body.kind {
                    dp.previous_position = body.position;
                    dp.previous_angle = body.angle;
                    motion.velocity += dp.force * dp.inv_mass * dp.mass_multiplier * h;
                    motion.angular_velocity += dp.torque * dp.inv_inertia * h;
                    (motion.velocity, motion.angular_velocity)
                } else {
                    (body.velocity(), body.angular_velocity())
                }
            };

            ccd::integrate_pose(id, &mut self.bodies, self.broadphase.as_ref(), velocity, angular_velocity, h);
            self.bodies[id].update_aabb();

            if let Some(dp) = self.bodies[id].dynamic_properties_mut() {
                dp.force = Vec2::zero();
                dp.torque = 0.0;
            }
        }
    }

    /// §4.8 step 10: emit an `Impact` event for every contact whose body pair
    /// was not overlapping at the previous step.
    fn impact_events(&mut self) {
        for contact in &self.contacts {
            if contact.first_impact {
                self.events.push(Event::Impact {
                    body_a: contact.equation.body_a,
                    body_b: contact.equation.body_b,
                    shape_a: contact.shape_a,
                    shape_b: contact.shape_b,
                });
            }
        }
    }

    /// §4.8 step 11: per-body or per-island sleeping, depending on `SleepMode`.
    fn sleep_phase(&mut self, h: f64) {
        match self.settings.world.sleep_mode {
            SleepMode::NoSleep => {}
            SleepMode::PerBody => {
                let ids: Vec<BodyId> = self.bodies.iter().filter(|(_, b)| b.is_dynamic()).map(|(id, _)| id).collect();
                for id in ids {
                    self.tick_idle_time(id, h);
                    let ready = {
                        let body = &self.bodies[id];
                        body.dynamic_properties().is_some_and(|dp| {
                            dp.sleep_state != SleepState::Sleeping && dp.idle_time > dp.sleep_time_limit
                        })
                    };
                    if ready {
                        self.bodies[id].sleep();
                        self.events.push(Event::Sleep(id));
                    }
                }
            }
            SleepMode::PerIsland => {
                let ids: Vec<BodyId> = self.bodies.iter().filter(|(_, b)| b.is_dynamic()).map(|(id, _)| id).collect();
                for id in ids {
                    self.tick_idle_time(id, h);
                    let body = &mut self.bodies[id];
                    if let Some(dp) = body.dynamic_properties_mut() {
                        if dp.sleep_state == SleepState::Awake && dp.idle_time > dp.sleep_time_limit {
                            dp.sleep_state = SleepState::Sleepy;
                        }
                    }
                }

                let islands = island::split(
                    &self.bodies,
                    &self.contact_body_pairs(),
                    &self.friction_body_pairs(),
                    &self.joint_body_pairs(),
                );
                for isl in &islands {
                    let all_ready = isl
                        .bodies
                        .iter()
                        .filter(|id| self.bodies[**id].is_dynamic())
                        .all(|id| matches!(self.bodies[*id].sleep_state(), SleepState::Sleepy | SleepState::Sleeping));
                    if !all_ready {
                        continue;
                    }
                    for id in &isl.bodies {
                        if self.bodies[*id].is_dynamic() && !self.bodies[*id].is_sleeping() {
                            self.bodies[*id].sleep();
                            self.events.push(Event::Sleep(*id));
                        }
                    }
                }
            }
        }
    }

    fn tick_idle_time(&mut self, id: BodyId, h: f64) {
        let body = &mut self.bodies[id];
        let speed_sq = body.velocity().magnitude_squared();
        let Some(dp) = body.dynamic_properties_mut() else {
            return;
        };
        if dp.sleep_state == SleepState::Sleeping {
            return;
        }
        if speed_sq < dp.sleep_speed_limit * dp.sleep_speed_limit {
            dp.idle_time += h;
        } else {
            dp.idle_time = 0.0;
            if dp.sleep_state == SleepState::Sleepy {
                dp.sleep_state = SleepState::Awake;
            }
        }
    }

    /// §4.8 step 12: drop bodies queued via [`Self::remove_body`].
    fn deferred_removal(&mut self) {
        let pending = std::mem::take(&mut self.pending_removal);
        for id in pending {
            if self.bodies.remove(id).is_some() {
                self.events.push(Event::RemoveBody(id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SolverConfig, WorldConfig};
    use crate::shape::Shape;

    fn falling_circle(world: &mut World, y: f64) -> BodyId {
        let mut body = Body::new_dynamic(
            BodyOptions {
                position: Vec2::new(0.0, y),
                ..Default::default()
            },
            DynamicBodyOptions::default(),
        );
        body.add_shape(Shape::circle(0.5), None, None).unwrap();
        world.add_body(body).unwrap()
    }

    #[test]
    fn manifold_points_are_rebased_onto_body_centers_not_shape_centers() {
        // Body A is static, body-position == its shape's world center (zero offset).
        // Body B is dynamic, its shape is offset -1.5 on x from the body center, so
        // the shape's world center sits well away from `body_b.position`.
        let mut world = World::new(Settings::default());

        let mut body_a = Body::new_static(BodyOptions {
            position: Vec2::new(0.0, 0.0),
            ..Default::default()
        });
        body_a.add_shape(Shape::circle(1.0), None, None).unwrap();
        let id_a = world.add_body(body_a).unwrap();

        let mut body_b = Body::new_dynamic(
            BodyOptions {
                position: Vec2::new(3.0, 0.0),
                ..Default::default()
            },
            DynamicBodyOptions::default(),
        );
        body_b.add_shape(Shape::circle(1.0), Some(Vec2::new(-1.5, 0.0)), None).unwrap();
        let id_b = world.add_body(body_b).unwrap();

        let pairs = vec![(id_a, id_b)];
        let hits = world.generate_hits(&pairs);
        assert_eq!(hits.len(), 1, "the offset shapes should overlap");
        world.build_equations(&hits);

        assert_eq!(world.contacts.len(), 1);
        let contact = &world.contacts[0];

        // Shape A's world center coincides with body A's position, so its
        // body-relative contact point is unaffected by the rebasing fix.
        assert!((contact.contact_point_a - Vec2::new(1.0, 0.0)).magnitude() < 1e-9);

        // Shape B's world center is (3.0, 0.0) + (-1.5, 0.0) = (1.5, 0.0); the
        // world contact point sits one radius short of it along the shared
        // normal, at (0.5, 0.0). Relative to body B's *center* (3.0, 0.0) that
        // is (-2.5, 0.0) -- not (-1.0, 0.0), which is what the point would be
        // if it were left relative to the shape's own center instead.
        assert!(
            (contact.contact_point_b - Vec2::new(-2.5, 0.0)).magnitude() < 1e-9,
            "contact_point_b should be relative to the body center, got {:?}",
            contact.contact_point_b
        );
    }

    #[test]
    fn gravity_pulls_a_dynamic_body_down_over_one_step() {
        let mut world = World::new(Settings::default());
        let id = falling_circle(&mut world, 10.0);
        world.step(1.0 / 60.0);
        assert!(world.body(id).unwrap().velocity().y < 0.0);
    }

    #[test]
    fn static_body_never_moves() {
        let mut world = World::new(Settings::default());
        let mut ground = Body::new_static(BodyOptions::default());
        ground.add_shape(Shape::plane(), None, None).unwrap();
        let id = world.add_body(ground).unwrap();
        for _ in 0..10 {
            world.step(1.0 / 60.0);
        }
        assert_eq!(world.body(id).unwrap().position, Vec2::zero());
    }

    #[test]
    fn box_resting_on_a_plane_eventually_sleeps() {
        let mut settings = Settings::default();
        settings.world.sleep_mode = SleepMode::PerBody;
        settings.solver = SolverConfig {
            iterations: 40,
            ..SolverConfig::default()
        };
        let mut world = World::new(settings);

        let mut ground = Body::new_static(BodyOptions::default());
        ground.add_shape(Shape::plane(), None, None).unwrap();
        world.add_body(ground).unwrap();

        let mut dyn_opts = DynamicBodyOptions::default();
        dyn_opts.sleep_time_limit = 0.1;
        let mut box_body = Body::new_dynamic(
            BodyOptions {
                position: Vec2::new(0.0, 0.55),
                ..Default::default()
            },
            dyn_opts,
        );
        box_body.add_shape(Shape::rectangle(1.0, 1.0), None, None).unwrap();
        let id = world.add_body(box_body).unwrap();

        for _ in 0..600 {
            world.step(1.0 / 60.0);
        }
        assert!(world.body(id).unwrap().is_sleeping(), "resting box should fall asleep");
    }

    #[test]
    fn begin_and_end_contact_events_fire_once_each() {
        let mut world = World::new(Settings::default());
        let mut ground = Body::new_static(BodyOptions::default());
        ground.add_shape(Shape::plane(), None, None).unwrap();
        world.add_body(ground).unwrap();

        let id = falling_circle(&mut world, 0.6);
        let mut saw_begin = false;
        for _ in 0..5 {
            world.step(1.0 / 240.0);
            for event in world.drain_events() {
                if let Event::BeginContact { body_a, body_b, .. } = event {
                    assert!(body_a == id || body_b == id);
                    saw_begin = true;
                }
            }
        }
        assert!(saw_begin, "falling circle should eventually touch the ground");
    }

    #[test]
    fn island_split_solves_two_separate_piles_independently() {
        let mut settings = Settings::default();
        settings.world.island_split = true;
        let mut world = World::new(settings);

        let mut ground = Body::new_static(BodyOptions::default());
        ground.add_shape(Shape::plane(), None, None).unwrap();
        world.add_body(ground).unwrap();

        let left = falling_circle(&mut world, 0.6);
        let mut opts = DynamicBodyOptions::default();
        opts.velocity = Vec2::new(0.0, 0.0);
        let mut far_body = Body::new_dynamic(
            BodyOptions {
                position: Vec2::new(100.0, 0.6),
                ..Default::default()
            },
            opts,
        );
        far_body.add_shape(Shape::circle(0.5), None, None).unwrap();
        let right = world.add_body(far_body).unwrap();

        for _ in 0..10 {
            world.step(1.0 / 60.0);
        }
        assert!(world.body(left).unwrap().position.x.abs() < 1.0);
        assert!((world.body(right).unwrap().position.x - 100.0).abs() < 1.0);
    }

    #[test]
    fn remove_body_is_deferred_to_the_end_of_the_step() {
        let mut world = World::new(Settings::default());
        let id = falling_circle(&mut world, 5.0);
        world.remove_body(id).unwrap();
        assert!(world.body(id).is_some(), "body should still exist mid-step setup");
        world.step(1.0 / 60.0);
        assert!(world.body(id).is_none(), "body should be gone after the step completes");
    }

    #[test]
    fn raycast_hits_a_body_added_to_the_world() {
        let mut world = World::new(Settings::default());
        let mut body = Body::new_static(BodyOptions {
            position: Vec2::new(5.0, 0.0),
            ..Default::default()
        });
        body.add_shape(Shape::circle(1.0), None, None).unwrap();
        let id = world.add_body(body).unwrap();
        world.step(1.0 / 60.0);

        let hit = world
            .raycast(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), &RaycastOptions::default())
            .expect("ray should hit the body");
        assert_eq!(hit.body, id);
    }

    #[test]
    fn add_and_remove_unknown_constraint_errors() {
        let mut world = World::new(Settings::default());
        assert_eq!(
            world.remove_constraint(ConstraintId::default()),
            Err(PhysicsError::UnknownConstraint)
        );
    }

    #[test]
    fn default_world_config_has_collision_response_enabled_by_default() {
        let world = World::new(Settings::default());
        assert_eq!(world.settings().world, WorldConfig::default());
    }
}
