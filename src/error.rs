//! Errors returned by fallible mutation APIs.
//!
//! Per §7 of the spec, only invariant violations *at mutation time* are
//! treated as recoverable errors. Unsupported shape pairs, degenerate
//! geometry and solver non-convergence are deliberately not represented
//! here — they are handled locally (zero contacts, undefined behavior the
//! caller must avoid, or a best-effort `multiplier`).

use slotmap::KeyData;
use thiserror::Error;

/// Errors produced by [`crate::world::World`] and [`crate::body::Body`] mutation APIs.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsError {
    /// Attempted to attach a shape that is already owned by another body.
    #[error("shape is already owned by another body")]
    ShapeAlreadyOwned,
    /// Attempted to add a body that already belongs to a world.
    #[error("body already belongs to a world")]
    BodyAlreadyInWorld,
    /// Referenced a body id that does not exist in this world.
    #[error("unknown body id")]
    UnknownBody,
    /// Referenced a shape id that does not exist on the body.
    #[error("unknown shape id")]
    UnknownShape,
    /// Attempted to remove a constraint that isn't registered with this world.
    #[error("unknown constraint id")]
    UnknownConstraint,
    /// Attempted to remove a spring that isn't registered with this world.
    #[error("unknown spring id")]
    UnknownSpring,
    /// Referenced a contact material pairing that hasn't been registered.
    #[error("unknown contact material id")]
    UnknownContactMaterial,
    /// Queried body-vs-body overlap before the world has completed at least one step.
    #[error("world has not completed a step yet")]
    WorldNotStepped,
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;

/// Opaque key-data accessor used by id types that wrap a [`slotmap`] key.
///
/// Exists purely so downstream ids can expose a stable `u64` without
/// leaking the `slotmap` type in their public API.
pub(crate) fn key_to_u64(data: KeyData) -> u64 {
    data.as_ffi()
}
