//! A deterministic, fixed-step 2D rigid-body physics engine with
//! impulse-based contact resolution.
//!
//! [`world::World::step`] drives one fixed pipeline per call: apply forces,
//! broadphase culling, narrowphase manifold generation, contact/friction
//! equation generation, a Baumgarte-stabilized Projected Gauss-Seidel solve
//! (optionally split into independent islands), integration (with
//! continuous collision detection for bodies that opt in), sleeping, and
//! deferred removal. See [`world::World`] for the full API.

pub mod body;
pub mod broadphase;
mod ccd;
pub mod config;
pub mod constraint;
pub mod equation;
pub mod error;
pub mod events;
mod island;
pub mod material;
pub mod math;
pub mod narrowphase;
mod overlap;
pub mod raycast;
pub mod shape;
mod solver;
pub mod spring;
pub mod world;

pub use body::{
    Body, BodyId, BodyKind, BodyOptions, DynamicBodyOptions, DynamicProperties, Motion, ShapeId,
    SleepState,
};
pub use broadphase::{Broadphase, SpatialHash, SweepAndPrune};
pub use config::{BroadphaseConfig, Settings, SleepMode, SolverConfig, WorldConfig};
pub use constraint::{
    Constraint, ConstraintId, DistanceConstraint, GearConstraint, LockConstraint,
    RevoluteConstraint,
};
pub use equation::{ContactEquation, Equation, EquationRow, FrictionEquation, JointEquation};
pub use error::{PhysicsError, PhysicsResult};
pub use events::Event;
pub use material::{ContactMaterial, Material, MaterialId};
pub use math::{Aabb, Iso, Vec2};
pub use narrowphase::{Manifold, ManifoldPoint};
pub use raycast::{Hit, RaycastOptions};
pub use shape::{
    CollisionGroup, Heightfield, Polygon, Shape, ShapeGeometry, ShapeHit, ShapeType, ALL_GROUPS,
};
pub use spring::{Spring, SpringId};
pub use world::World;
