//! Rigid bodies (§3 "Body"/"Sleep state", §4.1, §6 Body API).
//!
//! `Body` is deliberately a tagged variant over [`BodyKind`] rather than one
//! monolithic struct with a `kind` field: per §9's design notes, a static body
//! carries none of the velocity/sleep/CCD bookkeeping a dynamic one needs.

use slotmap::{new_key_type, SlotMap};

use crate::error::{PhysicsError, PhysicsResult};
use crate::math::{rotate, Aabb, Vec2};
use crate::shape::Shape;

new_key_type! {
    /// Process-unique (in practice, world-scoped: §9 "Global mutable state") body id.
    pub struct BodyId;
}

new_key_type! {
    /// Identifies a [`Shape`] attached to a particular [`Body`].
    pub struct ShapeId;
}

/// Sleep state machine (§3 "Sleep state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepState {
    Awake,
    Sleepy,
    Sleeping,
}

/// Linear/angular velocity, shared by dynamic and kinematic bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Motion {
    pub velocity: Vec2,
    pub angular_velocity: f64,
}

/// Everything a dynamic body needs that static and kinematic bodies don't:
/// mass properties, accumulated force, sleep bookkeeping, CCD opt-in.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicProperties {
    pub mass: f64,
    pub inv_mass: f64,
    pub inertia: f64,
    pub inv_inertia: f64,
    pub force: Vec2,
    pub torque: f64,
    pub fixed_rotation: bool,
    /// Zeroes the x/y component of `force * inv_mass` during integration when either
    /// axis is fixed (`fixed_x`/`fixed_y`).
    pub mass_multiplier: Vec2,
    pub damping: f64,
    pub angular_damping: f64,
    pub sleep_state: SleepState,
    pub idle_time: f64,
    pub sleep_speed_limit: f64,
    pub sleep_time_limit: f64,
    /// `Some(threshold)` opts the body into CCD (§4.6); compared against speed^2.
    pub ccd_speed_threshold: Option<f64>,
    pub ccd_iterations: u32,
    pub previous_position: Vec2,
    pub previous_angle: f64,
}

impl DynamicProperties {
    fn new(options: &DynamicBodyOptions) -> Self {
        let mass = options.mass.max(0.0);
        let inv_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        Self {
            mass,
            inv_mass,
            inertia: 0.0,
            inv_inertia: 0.0,
            force: Vec2::zero(),
            torque: 0.0,
            fixed_rotation: options.fixed_rotation,
            mass_multiplier: Vec2::new(
                if options.fixed_x { 0.0 } else { 1.0 },
                if options.fixed_y { 0.0 } else { 1.0 },
            ),
            damping: options.damping,
            angular_damping: options.angular_damping,
            sleep_state: SleepState::Awake,
            idle_time: 0.0,
            sleep_speed_limit: options.sleep_speed_limit,
            sleep_time_limit: options.sleep_time_limit,
            ccd_speed_threshold: options.ccd_speed_threshold,
            ccd_iterations: options.ccd_iterations,
            previous_position: Vec2::zero(),
            previous_angle: 0.0,
        }
    }
}

/// Tagged variant over the three body kinds (§3, §9 "Polymorphism").
#[derive(Debug, Clone, PartialEq)]
pub enum BodyKind {
    /// Zero velocity always; never integrated; never sleeps.
    Static,
    /// Scripted velocity, integrated, never responds to impulses, never sleeps.
    Kinematic(Motion),
    /// Full physical response: mass, force accumulation, sleep, optional CCD.
    Dynamic(Motion, DynamicProperties),
}

/// Shared construction options (position/angle/collision_response, §6 Body API).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyOptions {
    pub position: Vec2,
    pub angle: f64,
    pub collision_response: bool,
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            position: Vec2::zero(),
            angle: 0.0,
            collision_response: true,
        }
    }
}

/// Dynamic-only construction options (§6 Body API).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicBodyOptions {
    pub velocity: Vec2,
    pub angular_velocity: f64,
    pub mass: f64,
    pub damping: f64,
    pub angular_damping: f64,
    pub fixed_rotation: bool,
    pub fixed_x: bool,
    pub fixed_y: bool,
    pub sleep_speed_limit: f64,
    pub sleep_time_limit: f64,
    pub ccd_speed_threshold: Option<f64>,
    pub ccd_iterations: u32,
}

impl Default for DynamicBodyOptions {
    fn default() -> Self {
        Self {
            velocity: Vec2::zero(),
            angular_velocity: 0.0,
            mass: 1.0,
            damping: 0.1,
            angular_damping: 0.1,
            fixed_rotation: false,
            fixed_x: false,
            fixed_y: false,
            sleep_speed_limit: 0.2,
            sleep_time_limit: 1.0,
            ccd_speed_threshold: None,
            ccd_iterations: 10,
        }
    }
}

/// A rigid body: position/angle, kind-specific motion state, and the shapes attached to it.
#[derive(Debug, Clone)]
pub struct Body {
    pub position: Vec2,
    pub angle: f64,
    pub collision_response: bool,
    pub kind: BodyKind,
    shapes: SlotMap<ShapeId, Shape>,
    aabb: Aabb,
    aabb_dirty: bool,
    pub(crate) in_world: bool,
}

impl Body {
    fn new(kind: BodyKind, options: BodyOptions) -> Self {
        Self {
            position: options.position,
            angle: options.angle,
            collision_response: options.collision_response,
            kind,
            shapes: SlotMap::with_key(),
            aabb: Aabb {
                min: options.position,
                max: options.position,
            },
            aabb_dirty: true,
            in_world: false,
        }
    }

    /// A body with zero velocity, never integrated, never responding to impulses.
    pub fn new_static(options: BodyOptions) -> Self {
        Self::new(BodyKind::Static, options)
    }

    /// A body with scripted velocity that integrates but never responds to impulses.
    pub fn new_kinematic(options: BodyOptions) -> Self {
        Self::new(
            BodyKind::Kinematic(Motion {
                velocity: Vec2::zero(),
                angular_velocity: 0.0,
            }),
            options,
        )
    }

    /// A fully simulated body with finite mass.
    pub fn new_dynamic(options: BodyOptions, dynamic: DynamicBodyOptions) -> Self {
        let motion = Motion {
            velocity: dynamic.velocity,
            angular_velocity: dynamic.angular_velocity,
        };
        let mut body = Self::new(
            BodyKind::Dynamic(motion, DynamicProperties::new(&dynamic)),
            options,
        );
        body.update_mass_properties();
        body
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, BodyKind::Static)
    }

    pub fn is_kinematic(&self) -> bool {
        matches!(self.kind, BodyKind::Kinematic(_))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, BodyKind::Dynamic(..))
    }

    /// Current velocity; always zero for static bodies.
    pub fn velocity(&self) -> Vec2 {
        match &self.kind {
            BodyKind::Static => Vec2::zero(),
            BodyKind::Kinematic(motion) => motion.velocity,
            BodyKind::Dynamic(motion, _) => motion.velocity,
        }
    }

    /// Sets velocity; a no-op on static bodies.
    pub fn set_velocity(&mut self, v: Vec2) {
        match &mut self.kind {
            BodyKind::Static => {}
            BodyKind::Kinematic(motion) => motion.velocity = v,
            BodyKind::Dynamic(motion, _) => motion.velocity = v,
        }
    }

    pub fn angular_velocity(&self) -> f64 {
        match &self.kind {
            BodyKind::Static => 0.0,
            BodyKind::Kinematic(motion) => motion.angular_velocity,
            BodyKind::Dynamic(motion, _) => motion.angular_velocity,
        }
    }

    pub fn set_angular_velocity(&mut self, w: f64) {
        match &mut self.kind {
            BodyKind::Static => {}
            BodyKind::Kinematic(motion) => motion.angular_velocity = w,
            BodyKind::Dynamic(motion, _) => motion.angular_velocity = w,
        }
    }

    pub fn inv_mass(&self) -> f64 {
        match &self.kind {
            BodyKind::Dynamic(_, dyn_props) => dyn_props.inv_mass,
            _ => 0.0,
        }
    }

    pub fn inv_inertia(&self) -> f64 {
        match &self.kind {
            BodyKind::Dynamic(_, dyn_props) => {
                if dyn_props.fixed_rotation {
                    0.0
                } else {
                    dyn_props.inv_inertia
                }
            }
            _ => 0.0,
        }
    }

    pub fn dynamic_properties(&self) -> Option<&DynamicProperties> {
        match &self.kind {
            BodyKind::Dynamic(_, dyn_props) => Some(dyn_props),
            _ => None,
        }
    }

    pub fn dynamic_properties_mut(&mut self) -> Option<&mut DynamicProperties> {
        match &mut self.kind {
            BodyKind::Dynamic(_, dyn_props) => Some(dyn_props),
            _ => None,
        }
    }

    pub fn sleep_state(&self) -> SleepState {
        match &self.kind {
            BodyKind::Dynamic(_, dyn_props) => dyn_props.sleep_state,
            _ => SleepState::Awake,
        }
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleep_state() == SleepState::Sleeping
    }

    /// Wake this body immediately, resetting its idle clock (§3 "Sleep state").
    pub fn wake_up(&mut self) {
        if let BodyKind::Dynamic(_, dyn_props) = &mut self.kind {
            dyn_props.sleep_state = SleepState::Awake;
            dyn_props.idle_time = 0.0;
        }
    }

    /// Force this body to sleep immediately, clearing its velocity and force.
    pub fn sleep(&mut self) {
        if let BodyKind::Dynamic(motion, dyn_props) = &mut self.kind {
            dyn_props.sleep_state = SleepState::Sleeping;
            motion.velocity = Vec2::zero();
            motion.angular_velocity = 0.0;
            dyn_props.force = Vec2::zero();
            dyn_props.torque = 0.0;
        }
    }

    /// Apply a force at an optional offset `r` from the body center (world-space).
    /// Static and kinematic bodies ignore this (§7 "no-oping force/impulse application
    /// on static/kinematic bodies").
    pub fn apply_force(&mut self, force: Vec2, r: Option<Vec2>) {
        if let BodyKind::Dynamic(_, dyn_props) = &mut self.kind {
            dyn_props.force += force;
            if let Some(r) = r {
                dyn_props.torque += crate::math::cross(r, force);
            }
        }
    }

    /// Apply an instantaneous impulse at an optional offset `r` from the body center.
    pub fn apply_impulse(&mut self, impulse: Vec2, r: Option<Vec2>) {
        if let BodyKind::Dynamic(motion, dyn_props) = &mut self.kind {
            motion.velocity += impulse * dyn_props.inv_mass * dyn_props.mass_multiplier;
            if let Some(r) = r {
                motion.angular_velocity += crate::math::cross(r, impulse) * dyn_props.inv_inertia;
            }
        }
    }

    /// Transform a world-space point into this body's local frame.
    pub fn to_local(&self, world_point: Vec2) -> Vec2 {
        rotate(world_point - self.position, -self.angle)
    }

    /// Transform a local-space point into world space.
    pub fn to_world(&self, local_point: Vec2) -> Vec2 {
        self.position + rotate(local_point, self.angle)
    }

    /// Attach a shape, recomputing mass properties and marking the AABB dirty (§3 Lifecycle).
    pub fn add_shape(
        &mut self,
        mut shape: Shape,
        offset: Option<Vec2>,
        angle: Option<f64>,
    ) -> PhysicsResult<ShapeId> {
        if shape.body().is_some() {
            return Err(PhysicsError::ShapeAlreadyOwned);
        }
        if let Some(offset) = offset {
            shape.offset = offset;
        }
        if let Some(angle) = angle {
            shape.angle = angle;
        }
        let id = self.shapes.insert(shape);
        // Safe: the key was just produced by this body's own slotmap.
        self.shapes[id].attach_to(self.id_placeholder());
        self.update_mass_properties();
        self.aabb_dirty = true;
        Ok(id)
    }

    /// Placeholder body-id stamped onto a shape at attach time; the real id is
    /// assigned by `World::add_body`/`relink_shapes`, since a body does not know
    /// its own id until the world's slotmap hands one out.
    fn id_placeholder(&self) -> BodyId {
        BodyId::default()
    }

    /// Stamp the world-assigned id onto every attached shape's back-link.
    pub(crate) fn relink_shapes(&mut self, id: BodyId) {
        for (_, shape) in self.shapes.iter_mut() {
            shape.attach_to(id);
        }
    }

    pub fn remove_shape(&mut self, id: ShapeId) -> PhysicsResult<Shape> {
        let mut shape = self.shapes.remove(id).ok_or(PhysicsError::UnknownShape)?;
        shape.detach();
        self.update_mass_properties();
        self.aabb_dirty = true;
        Ok(shape)
    }

    pub fn shapes(&self) -> impl Iterator<Item = (ShapeId, &Shape)> {
        self.shapes.iter()
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn shape_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.shapes.get_mut(id)
    }

    /// Recompute mass/inertia from the attached shapes, sharing the body's mass equally
    /// among them and using the parallel axis theorem to account for shape offsets.
    pub fn update_mass_properties(&mut self) {
        let n = self.shapes.len().max(1) as f64;
        if let BodyKind::Dynamic(_, dyn_props) = &mut self.kind {
            let mass_per_shape = dyn_props.mass / n;
            let mut inertia = 0.0;
            for (_, shape) in self.shapes.iter() {
                let local_inertia = shape.compute_moment_of_inertia(mass_per_shape);
                inertia += local_inertia + mass_per_shape * shape.offset.magnitude_squared();
            }
            dyn_props.inertia = inertia;
            dyn_props.inv_inertia = if inertia > 0.0 { 1.0 / inertia } else { 0.0 };
        }
    }

    /// Recompute the body's AABB as the union of its shapes' AABBs at the current pose
    /// (invariant 3, §8: "After step, each body's AABB contains every shape's AABB").
    pub fn update_aabb(&mut self) {
        if self.shapes.is_empty() {
            self.aabb = Aabb {
                min: self.position,
                max: self.position,
            };
            self.aabb_dirty = false;
            return;
        }
        let mut min = Vec2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (_, shape) in self.shapes.iter() {
            let shape_aabb = shape.compute_aabb(self.position, self.angle);
            min = Vec2::partial_min(min, shape_aabb.min);
            max = Vec2::partial_max(max, shape_aabb.max);
        }
        self.aabb = Aabb { min, max };
        self.aabb_dirty = false;
    }

    pub fn aabb_dirty(&self) -> bool {
        self.aabb_dirty
    }

    pub fn mark_aabb_dirty(&mut self) {
        self.aabb_dirty = true;
    }

    pub fn get_aabb(&self) -> Aabb {
        self.aabb
    }

    /// Cheap AABB-only overlap check; the authoritative per-step shape-pair overlap
    /// (used for `begin_contact`/`end_contact`) lives in the world's `OverlapKeeper`.
    pub fn overlaps(&self, other: &Body) -> bool {
        self.aabb.collides_with_aabr(other.aabb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_body_ignores_force_and_impulse() {
        let mut body = Body::new_static(BodyOptions::default());
        body.apply_force(Vec2::new(10.0, 0.0), None);
        body.apply_impulse(Vec2::new(10.0, 0.0), None);
        assert_eq!(body.velocity(), Vec2::zero());
    }

    #[test]
    fn dynamic_body_mass_properties_use_circle_formula_for_single_shape() {
        let mut options = DynamicBodyOptions::default();
        options.mass = 4.0;
        let mut body = Body::new_dynamic(BodyOptions::default(), options);
        body.add_shape(Shape::circle(2.0), None, None).unwrap();
        let dyn_props = body.dynamic_properties().unwrap();
        assert!((dyn_props.inertia - 0.5 * 4.0 * 2.0 * 2.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_rotation_zeroes_inverse_inertia() {
        let mut options = DynamicBodyOptions::default();
        options.fixed_rotation = true;
        let mut body = Body::new_dynamic(BodyOptions::default(), options);
        body.add_shape(Shape::circle(1.0), None, None).unwrap();
        assert_eq!(body.inv_inertia(), 0.0);
    }

    #[test]
    fn sleep_clears_velocity_and_force() {
        let mut body = Body::new_dynamic(BodyOptions::default(), DynamicBodyOptions::default());
        body.set_velocity(Vec2::new(5.0, 0.0));
        body.apply_force(Vec2::new(1.0, 0.0), None);
        body.sleep();
        assert_eq!(body.velocity(), Vec2::zero());
        assert_eq!(body.dynamic_properties().unwrap().force, Vec2::zero());
    }

    #[test]
    fn to_local_then_to_world_round_trips() {
        let mut body = Body::new_static(BodyOptions {
            position: Vec2::new(3.0, 4.0),
            angle: 0.7,
            collision_response: true,
        });
        body.update_aabb();
        let world_point = Vec2::new(10.0, -2.0);
        let local = body.to_local(world_point);
        let back = body.to_world(local);
        assert!((back - world_point).magnitude() < 1e-9);
    }

    #[test]
    fn remove_unknown_shape_errors() {
        let mut body = Body::new_static(BodyOptions::default());
        assert_eq!(
            body.remove_shape(ShapeId::default()),
            Err(PhysicsError::UnknownShape)
        );
    }
}
