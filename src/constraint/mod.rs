//! Joint constraints: bundles of [`crate::equation::JointEquation`]s sharing two
//! bodies, refreshed once per step by `update()` (§3 "Constraint", §4.8 step 8).

mod distance;
mod gear;
mod lock;
mod revolute;

pub use distance::DistanceConstraint;
pub use gear::GearConstraint;
pub use lock::LockConstraint;
pub use revolute::RevoluteConstraint;

use slotmap::new_key_type;

use crate::body::{Body, BodyId};
use crate::equation::JointEquation;

new_key_type! {
    /// Identifies a [`Constraint`] registered with a [`crate::world::World`].
    pub struct ConstraintId;
}

/// Tagged variant over the joint kinds this crate supports (§9 "Polymorphism").
#[derive(Debug, Clone)]
pub enum Constraint {
    Distance(DistanceConstraint),
    Revolute(RevoluteConstraint),
    Lock(LockConstraint),
    Gear(GearConstraint),
}

impl Constraint {
    pub fn body_a(&self) -> BodyId {
        match self {
            Constraint::Distance(c) => c.body_a,
            Constraint::Revolute(c) => c.body_a,
            Constraint::Lock(c) => c.body_a,
            Constraint::Gear(c) => c.body_a,
        }
    }

    pub fn body_b(&self) -> BodyId {
        match self {
            Constraint::Distance(c) => c.body_b,
            Constraint::Revolute(c) => c.body_b,
            Constraint::Lock(c) => c.body_b,
            Constraint::Gear(c) => c.body_b,
        }
    }

    /// Whether the broadphase should still emit this pair as a collision candidate
    /// (§4.8 step 2 "collide_connected").
    pub fn collide_connected(&self) -> bool {
        match self {
            Constraint::Distance(c) => c.collide_connected,
            Constraint::Revolute(c) => c.collide_connected,
            Constraint::Lock(c) => c.collide_connected,
            Constraint::Gear(c) => c.collide_connected,
        }
    }

    /// Refresh every equation's Jacobian and gating (e.g. enable limit rows only when
    /// violated) from the two bodies' current pose.
    pub fn update(&mut self, body_a: &Body, body_b: &Body) {
        match self {
            Constraint::Distance(c) => c.update(body_a, body_b),
            Constraint::Revolute(c) => c.update(body_a, body_b),
            Constraint::Lock(c) => c.update(body_a, body_b),
            Constraint::Gear(c) => c.update(body_a, body_b),
        }
    }

    pub fn equations(&self) -> &[JointEquation] {
        match self {
            Constraint::Distance(c) => &c.equations,
            Constraint::Revolute(c) => &c.equations,
            Constraint::Lock(c) => &c.equations,
            Constraint::Gear(c) => &c.equations,
        }
    }

    pub fn equations_mut(&mut self) -> &mut [JointEquation] {
        match self {
            Constraint::Distance(c) => &mut c.equations,
            Constraint::Revolute(c) => &mut c.equations,
            Constraint::Lock(c) => &mut c.equations,
            Constraint::Gear(c) => &mut c.equations,
        }
    }
}
