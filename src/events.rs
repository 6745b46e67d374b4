//! Events emitted by a [`crate::world::World`] step (§3, §6 "Events emitted").
//!
//! The core only owns *what* gets emitted and *when* (§4.8's fixed ordering
//! pins that down precisely); the generic pub/sub plumbing a game layer might
//! wrap around this is the "outer event-emitter plumbing" §1 places out of
//! scope. `World` instead appends to an in-order buffer during `step()` and
//! hands it to the caller via [`crate::world::World::drain_events`] — callers
//! that want push-based dispatch can trivially iterate the drained buffer and
//! fan it out to their own listeners.

use crate::body::{BodyId, ShapeId};
use crate::equation::ContactEquation;
use crate::spring::SpringId;

/// One event emitted during a world step, in the order §4.8 produces them.
#[derive(Debug, Clone)]
pub enum Event {
    AddBody(BodyId),
    RemoveBody(BodyId),
    AddSpring(SpringId),
    RemoveSpring(SpringId),
    /// Broadphase candidate pairs, after constraint `collide_connected` filtering.
    PostBroadphase(Vec<(BodyId, BodyId)>),
    BeginContact {
        body_a: BodyId,
        body_b: BodyId,
        shape_a: ShapeId,
        shape_b: ShapeId,
        /// The contact equations generated for this shape pair this step (empty for
        /// a sensor-only overlap, §4.3 "Sensor shapes never produce contact ... equations").
        contact_equations: Vec<ContactEquation>,
    },
    EndContact {
        body_a: BodyId,
        body_b: BodyId,
        shape_a: ShapeId,
        shape_b: ShapeId,
    },
    /// Every contact/friction equation generated this step, right before solving.
    PreSolve {
        contacts: Vec<ContactEquation>,
        frictions: Vec<crate::equation::FrictionEquation>,
    },
    Impact {
        body_a: BodyId,
        body_b: BodyId,
        shape_a: ShapeId,
        shape_b: ShapeId,
    },
    PostStep,
    Sleep(BodyId),
    WakeUp(BodyId),
}
