//! Materials and per-pair contact overrides (§3 "Material"/"ContactMaterial", §6).

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a [`Material`] registered with a [`crate::world::World`].
    pub struct MaterialId;
}

/// A named surface property bucket. Carries no data of its own beyond identity;
/// all tunables live on the [`ContactMaterial`] for a *pair* of materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material;

/// Per-contact tunables used when two shapes with materials `a`/`b` touch.
///
/// Registered with a [`crate::world::World`] keyed by the unordered pair
/// `(material_a, material_b)`; when no entry matches, the world's default
/// contact material is used instead (§6 configuration table).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactMaterial {
    pub material_a: MaterialId,
    pub material_b: MaterialId,
    pub friction: f64,
    pub restitution: f64,
    pub stiffness: f64,
    pub relaxation: f64,
    /// Relative tangential velocity added to friction equations (e.g. conveyor belts).
    pub surface_velocity: f64,
    /// Contact equation `offset`: biases the solver toward a slightly positive gap.
    pub contact_skin_size: f64,
}

impl ContactMaterial {
    /// A contact material for the pair `(material_a, material_b)`, starting from the
    /// engine's baseline tuning.
    pub fn new(material_a: MaterialId, material_b: MaterialId) -> Self {
        Self {
            material_a,
            material_b,
            ..Self::default_values()
        }
    }

    fn default_values() -> Self {
        Self {
            material_a: MaterialId::default(),
            material_b: MaterialId::default(),
            friction: 0.3,
            restitution: 0.0,
            stiffness: 1e7,
            relaxation: 3.0,
            surface_velocity: 0.0,
            contact_skin_size: 0.01,
        }
    }

    /// Unordered key this contact material is registered under.
    pub(crate) fn key(&self) -> (MaterialId, MaterialId) {
        canonical_material_pair(self.material_a, self.material_b)
    }
}

impl Default for ContactMaterial {
    fn default() -> Self {
        Self::default_values()
    }
}

/// Canonical (min, max) ordering for an unordered material-id pair (mirrors
/// [`crate::broadphase::canonical_pair`] for body ids).
pub fn canonical_material_pair(a: MaterialId, b: MaterialId) -> (MaterialId, MaterialId) {
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

    #[test]
    fn default_contact_material_has_no_bounce_and_some_friction() {
        let cm = ContactMaterial::default();
        assert_eq!(cm.restitution, 0.0);
        assert!(cm.friction > 0.0);
    }
}
