//! Linearized constraint rows (§3 "Equation", §4.4 Baumgarte parameters).
//!
//! An [`Equation`] is the shared solver-row struct every specialization
//! (contact, friction, joint-axis, rotational-lock, rotational-velocity)
//! embeds; the solver only ever touches this shared part plus the Jacobian
//! each specialization refreshes in its own `update()`.

use crate::body::BodyId;
use crate::math::Vec2;

/// Length-6 Jacobian: `[nA.x, nA.y, rA x n, nB.x, nB.y, rB x n]` (§3 "Equation").
pub type Jacobian = [f64; 6];

/// The solver-row shared by every equation kind (§3 "Equation", §4.4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equation {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub jacobian: Jacobian,
    pub min_force: f64,
    pub max_force: f64,
    pub stiffness: f64,
    pub relaxation: f64,
    /// The position-error term `Gq` the pre-pass folds into `B` (§4.4): the
    /// constraint's current violation along its own Jacobian, plus any fixed bias
    /// (e.g. contact_skin_size). Each specialization computes this directly from its
    /// own geometry in `update()`/`update_jacobian()` rather than re-deriving it by
    /// dotting `G` against raw position vectors.
    pub offset: f64,
    /// Extra term folded into `GW` (e.g. conveyor-belt surface velocity).
    pub relative_velocity: f64,
    /// Baumgarte `a` coefficient, recomputed whenever stiffness/relaxation/timestep changes.
    pub a: f64,
    /// Baumgarte `b` coefficient.
    pub b: f64,
    /// Baumgarte `epsilon` coefficient.
    pub epsilon: f64,
    /// Cached right-hand side from the pre-pass.
    pub b_cached: f64,
    /// Cached `1 / (sum G^2 * invMass + epsilon)`.
    pub inv_c: f64,
    /// Impulse accumulator (units of impulse: force * h).
    pub lambda: f64,
    /// `lambda / h` from the last solve, the equation's reported force.
    pub multiplier: f64,
    /// Recompute `a`/`b`/`epsilon` on the next pre-pass.
    pub needs_update: bool,
    pub enabled: bool,
}

impl Equation {
    pub fn new(body_a: BodyId, body_b: BodyId, min_force: f64, max_force: f64) -> Self {
        Self {
            body_a,
            body_b,
            jacobian: [0.0; 6],
            min_force,
            max_force,
            stiffness: 1e7,
            relaxation: 3.0,
            offset: 0.0,
            relative_velocity: 0.0,
            a: 0.0,
            b: 0.0,
            epsilon: 0.0,
            b_cached: 0.0,
            inv_c: 0.0,
            lambda: 0.0,
            multiplier: 0.0,
            needs_update: true,
            enabled: true,
        }
    }

    /// Recompute the Baumgarte `a`, `b`, `epsilon` coefficients from stiffness,
    /// relaxation and the timestep (§3 "Equation": `a = 4/(h(1+4d))`, etc).
    pub fn update_spook_params(&mut self, h: f64) {
        let d = self.relaxation;
        let k = self.stiffness;
        self.a = 4.0 / (h * (1.0 + 4.0 * d));
        self.b = 4.0 * d / (1.0 + 4.0 * d);
        self.epsilon = 4.0 / (h * h * k * (1.0 + 4.0 * d));
        self.needs_update = false;
    }

    /// Jacobian dotted with a per-body (linear, angular) velocity pair.
    #[inline]
    pub fn gw(&self, va: Vec2, wa: f64, vb: Vec2, wb: f64) -> f64 {
        self.jacobian[0] * va.x
            + self.jacobian[1] * va.y
            + self.jacobian[2] * wa
            + self.jacobian[3] * vb.x
            + self.jacobian[4] * vb.y
            + self.jacobian[5] * wb
    }
}

/// A contact equation: pushes the two bodies apart along `normal_a` (§3 "Contact equation").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEquation {
    pub equation: Equation,
    /// World-space contact normal, pointing from A toward B.
    pub normal_a: Vec2,
    /// Contact point relative to body A's center.
    pub contact_point_a: Vec2,
    /// Contact point relative to body B's center.
    pub contact_point_b: Vec2,
    pub restitution: f64,
    /// True iff the owning body pair was *not* overlapping at the previous step (§3, §9).
    pub first_impact: bool,
    pub shape_a: crate::body::ShapeId,
    pub shape_b: crate::body::ShapeId,
}

impl ContactEquation {
    pub fn new(body_a: BodyId, body_b: BodyId, shape_a: crate::body::ShapeId, shape_b: crate::body::ShapeId) -> Self {
        Self {
            equation: Equation::new(body_a, body_b, 0.0, f64::INFINITY),
            normal_a: Vec2::zero(),
            contact_point_a: Vec2::zero(),
            contact_point_b: Vec2::zero(),
            restitution: 0.0,
            first_impact: false,
            shape_a,
            shape_b,
        }
    }

    /// Refresh the Jacobian from the current normal and contact points (§4.3/§4.4).
    pub fn update_jacobian(&mut self) {
        let n = self.normal_a;
        let ra = self.contact_point_a;
        let rb = self.contact_point_b;
        self.equation.jacobian = [
            -n.x,
            -n.y,
            -crate::math::cross(ra, n),
            n.x,
            n.y,
            crate::math::cross(rb, n),
        ];
    }

    /// Set `Gq` from the manifold's penetration depth, biased by the active contact
    /// material's skin (§4.3 "Contact skin"): negative depth (overlap) pulls the
    /// bodies apart, a positive skin tolerates a small resting gap.
    pub fn update_offset(&mut self, depth: f64, skin: f64) {
        self.equation.offset = -(depth - skin);
        self.equation.needs_update = true;
    }
}

/// A friction equation: resists relative tangential motion at a contact (§3 "Friction equation").
#[derive(Debug, Clone, PartialEq)]
pub struct FrictionEquation {
    pub equation: Equation,
    /// World-space tangent direction.
    pub tangent: Vec2,
    pub contact_point_a: Vec2,
    pub contact_point_b: Vec2,
    pub friction_coefficient: f64,
    /// Indices into the step's contact-equation buffer this friction row derives its
    /// slip bound from (§4.3 "Slip bound derivation").
    pub source_contacts: smallvec::SmallVec<[usize; 2]>,
    pub shape_a: crate::body::ShapeId,
    pub shape_b: crate::body::ShapeId,
}

impl FrictionEquation {
    pub fn new(body_a: BodyId, body_b: BodyId, shape_a: crate::body::ShapeId, shape_b: crate::body::ShapeId) -> Self {
        Self {
            equation: Equation::new(body_a, body_b, 0.0, 0.0),
            tangent: Vec2::zero(),
            contact_point_a: Vec2::zero(),
            contact_point_b: Vec2::zero(),
            friction_coefficient: 0.3,
            source_contacts: smallvec::SmallVec::new(),
            shape_a,
            shape_b,
        }
    }

    pub fn update_jacobian(&mut self) {
        let t = self.tangent;
        let ra = self.contact_point_a;
        let rb = self.contact_point_b;
        self.equation.jacobian = [
            -t.x,
            -t.y,
            -crate::math::cross(ra, t),
            t.x,
            t.y,
            crate::math::cross(rb, t),
        ];
    }

    /// Derive `min_force`/`max_force` from the source contacts' multipliers
    /// (§4.3 "Slip bound derivation"): `bound = (mu / n) * sum(multiplier)`.
    pub fn update_bounds(&mut self, contacts: &[ContactEquation]) {
        let n = self.source_contacts.len().max(1) as f64;
        let sum: f64 = self
            .source_contacts
            .iter()
            .filter_map(|&i| contacts.get(i))
            .map(|c| c.equation.multiplier.max(0.0))
            .sum();
        let bound = self.friction_coefficient * sum / n;
        self.equation.max_force = bound;
        self.equation.min_force = -bound;
    }
}

/// A generic joint-axis/rotational-lock/rotational-velocity row owned by a
/// [`crate::constraint::Constraint`] and persisting across steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointEquation {
    pub equation: Equation,
}

impl JointEquation {
    pub fn new(body_a: BodyId, body_b: BodyId, min_force: f64, max_force: f64) -> Self {
        Self {
            equation: Equation::new(body_a, body_b, min_force, max_force),
        }
    }
}

/// Common access to the shared solver row, implemented by every equation
/// specialization so the solver (§4.4) can iterate contacts, friction rows and
/// joint rows as one ordered sequence without knowing which kind each is.
pub trait EquationRow {
    fn equation(&self) -> &Equation;
    fn equation_mut(&mut self) -> &mut Equation;
}

impl EquationRow for ContactEquation {
    fn equation(&self) -> &Equation {
        &self.equation
    }
    fn equation_mut(&mut self) -> &mut Equation {
        &mut self.equation
    }
}

impl EquationRow for FrictionEquation {
    fn equation(&self) -> &Equation {
        &self.equation
    }
    fn equation_mut(&mut self) -> &mut Equation {
        &mut self.equation
    }
}

impl EquationRow for JointEquation {
    fn equation(&self) -> &Equation {
        &self.equation
    }
    fn equation_mut(&mut self) -> &mut Equation {
        &mut self.equation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn dummy_id() -> BodyId {
        BodyId::from(KeyData::from_ffi(1))
    }

    #[test]
    fn spook_params_are_positive_for_sane_inputs() {
        let mut eq = Equation::new(dummy_id(), dummy_id(), 0.0, f64::INFINITY);
        eq.stiffness = 1e7;
        eq.relaxation = 3.0;
        eq.update_spook_params(1.0 / 60.0);
        assert!(eq.a > 0.0);
        assert!(eq.b > 0.0 && eq.b < 1.0);
        assert!(eq.epsilon > 0.0);
    }

    #[test]
    fn contact_jacobian_points_away_from_normal_for_body_a() {
        let mut contact = ContactEquation::new(dummy_id(), dummy_id(), Default::default(), Default::default());
        contact.normal_a = Vec2::new(1.0, 0.0);
        contact.update_jacobian();
        assert_eq!(contact.equation.jacobian[0], -1.0);
        assert_eq!(contact.equation.jacobian[3], 1.0);
    }

    #[test]
    fn friction_bound_scales_with_coefficient_and_multiplier_sum() {
        let mut friction = FrictionEquation::new(dummy_id(), dummy_id(), Default::default(), Default::default());
        friction.friction_coefficient = 0.5;
        friction.source_contacts.push(0);
        let mut contact = ContactEquation::new(dummy_id(), dummy_id(), Default::default(), Default::default());
        contact.equation.multiplier = 10.0;
        friction.update_bounds(&[contact]);
        assert!((friction.equation.max_force - 5.0).abs() < 1e-9);
        assert!((friction.equation.min_force + 5.0).abs() < 1e-9);
    }
}
