//! Projected Gauss-Seidel constraint solver (§4.4).
//!
//! Operates on whatever equation set `world.rs` hands it — the whole world, or
//! one island's slice — so this module has no notion of islands itself.

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::body::{Body, BodyId};
use crate::config::SolverConfig;
use crate::equation::{ContactEquation, EquationRow, FrictionEquation, JointEquation};
use crate::math::Vec2;

/// Per-body solver scratch (§4.4 "Per-body solver scratch"): lambda accumulators,
/// plus the inverse mass/inertia used while solving, which are zeroed for
/// sleeping or kinematic bodies so they act as force sinks.
#[derive(Debug, Clone, Copy, Default)]
struct BodyScratch {
    vlambda: Vec2,
    wlambda: f64,
    inv_mass: f64,
    inv_inertia: f64,
}

fn gather_scratch<'a>(
    bodies: &SlotMap<BodyId, Body>,
    ids: impl Iterator<Item = &'a BodyId>,
) -> HashMap<BodyId, BodyScratch> {
    let mut map = HashMap::new();
    for &id in ids {
        map.entry(id).or_insert_with(|| {
            let body = &bodies[id];
            let solving = body.is_dynamic() && !body.is_sleeping();
            BodyScratch {
                vlambda: Vec2::zero(),
                wlambda: 0.0,
                inv_mass: if solving { body.inv_mass() } else { 0.0 },
                inv_inertia: if solving { body.inv_inertia() } else { 0.0 },
            }
        });
    }
    map
}

fn body_force_torque(body: &Body) -> (Vec2, f64) {
    match body.dynamic_properties() {
        Some(dp) => (dp.force, dp.torque),
        None => (Vec2::zero(), 0.0),
    }
}

/// Refresh Baumgarte params and cached `B`/`invC`, and zero every lambda and body
/// accumulator (§4.4 "Pre-pass").
fn prepare<'a>(
    equations: &mut [&'a mut dyn EquationRow],
    bodies: &SlotMap<BodyId, Body>,
    scratch: &mut HashMap<BodyId, BodyScratch>,
    h: f64,
) {
    for row in equations.iter_mut() {
        let eq = row.equation_mut();
        if eq.needs_update {
            eq.update_spook_params(h);
        }

        let body_a = &bodies[eq.body_a];
        let body_b = &bodies[eq.body_b];
        let (force_a, torque_a) = body_force_torque(body_a);
        let (force_b, torque_b) = body_force_torque(body_b);
        let inv_mass_a = body_a.inv_mass();
        let inv_inertia_a = body_a.inv_inertia();
        let inv_mass_b = body_b.inv_mass();
        let inv_inertia_b = body_b.inv_inertia();
        let g = eq.jacobian;

        let gw = g[0] * body_a.velocity().x
            + g[1] * body_a.velocity().y
            + g[2] * body_a.angular_velocity()
            + g[3] * body_b.velocity().x
            + g[4] * body_b.velocity().y
            + g[5] * body_b.angular_velocity()
            + eq.relative_velocity;

        let gimf = g[0] * inv_mass_a * force_a.x
            + g[1] * inv_mass_a * force_a.y
            + g[2] * inv_inertia_a * torque_a
            + g[3] * inv_mass_b * force_b.x
            + g[4] * inv_mass_b * force_b.y
            + g[5] * inv_inertia_b * torque_b;

        eq.b_cached = -eq.offset * eq.a - gw * eq.b - gimf * h;

        let sa = scratch[&eq.body_a];
        let sb = scratch[&eq.body_b];
        let gg_inv_mass = g[0] * g[0] * sa.inv_mass
            + g[1] * g[1] * sa.inv_mass
            + g[2] * g[2] * sa.inv_inertia
            + g[3] * g[3] * sb.inv_mass
            + g[4] * g[4] * sb.inv_mass
            + g[5] * g[5] * sb.inv_inertia;
        eq.inv_c = 1.0 / (gg_inv_mass + eq.epsilon);

        eq.lambda = 0.0;
    }
    for s in scratch.values_mut() {
        s.vlambda = Vec2::zero();
        s.wlambda = 0.0;
    }
}

/// One pass over every enabled equation (§4.4 "Main iteration" steps 1-5). Returns
/// the sum of squared deltas, used for the convergence check.
fn pass(
    equations: &mut [&mut dyn EquationRow],
    scratch: &mut HashMap<BodyId, BodyScratch>,
    use_zero_rhs: bool,
    h: f64,
) -> f64 {
    let mut total = 0.0;
    for row in equations.iter_mut() {
        let eq = row.equation_mut();
        if !eq.enabled {
            continue;
        }
        let g = eq.jacobian;
        let sa = scratch[&eq.body_a];
        let sb = scratch[&eq.body_b];

        let gwlambda = g[0] * sa.vlambda.x
            + g[1] * sa.vlambda.y
            + g[2] * sa.wlambda
            + g[3] * sb.vlambda.x
            + g[4] * sb.vlambda.y
            + g[5] * sb.wlambda;

        let b = if use_zero_rhs { 0.0 } else { eq.b_cached };
        let mut delta = eq.inv_c * (b - gwlambda - eq.epsilon * eq.lambda);

        let lo = eq.min_force * h;
        let hi = eq.max_force * h;
        let new_lambda = (eq.lambda + delta).clamp(lo, hi);
        delta = new_lambda - eq.lambda;
        eq.lambda = new_lambda;

        let sa = scratch.get_mut(&eq.body_a).unwrap();
        sa.vlambda += Vec2::new(g[0], g[1]) * sa.inv_mass * delta;
        sa.wlambda += sa.inv_inertia * g[2] * delta;
        let sb = scratch.get_mut(&eq.body_b).unwrap();
        sb.vlambda += Vec2::new(g[3], g[4]) * sb.inv_mass * delta;
        sb.wlambda += sb.inv_inertia * g[5] * delta;

        total += delta * delta;
    }
    total
}

fn run_iterations(
    equations: &mut [&mut dyn EquationRow],
    scratch: &mut HashMap<BodyId, BodyScratch>,
    iterations: u32,
    tolerance: f64,
    use_zero_rhs: bool,
    h: f64,
) {
    let n = equations.len() as f64;
    let bound = (tolerance * n) * (tolerance * n);
    for _ in 0..iterations {
        let total = pass(equations, scratch, use_zero_rhs, h);
        if total <= bound {
            break;
        }
    }
}

/// Apply each touched dynamic-awake body's accumulated `vlambda`/`wlambda` to its
/// actual velocity (§4.4 "After all iterations, apply ... to its actual velocity").
fn apply_to_bodies(scratch: &HashMap<BodyId, BodyScratch>, bodies: &mut SlotMap<BodyId, Body>) {
    for (&id, s) in scratch.iter() {
        let body = &mut bodies[id];
        if body.is_dynamic() && !body.is_sleeping() {
            body.set_velocity(body.velocity() + s.vlambda);
            body.set_angular_velocity(body.angular_velocity() + s.wlambda);
        }
    }
}

/// Run the Projected Gauss-Seidel solve over contacts, friction rows and joint
/// rows together, in that order, exactly as §4.4 describes (pre-pass, optional
/// friction-calibration pre-pass, main iteration, velocity writeback).
pub fn solve(
    bodies: &mut SlotMap<BodyId, Body>,
    contacts: &mut [ContactEquation],
    frictions: &mut [FrictionEquation],
    joints: &mut [&mut JointEquation],
    h: f64,
    config: &SolverConfig,
) {
    let body_ids: Vec<BodyId> = contacts
        .iter()
        .flat_map(|c| [c.equation.body_a, c.equation.body_b])
        .chain(frictions.iter().flat_map(|f| [f.equation.body_a, f.equation.body_b]))
        .chain(joints.iter().flat_map(|j| [j.equation.body_a, j.equation.body_b]))
        .collect();
    if body_ids.is_empty() {
        return;
    }
    let mut scratch = gather_scratch(bodies, body_ids.iter());

    let mut rows: Vec<&mut dyn EquationRow> = Vec::with_capacity(contacts.len() + frictions.len() + joints.len());
    for c in contacts.iter_mut() {
        rows.push(c);
    }
    for f in frictions.iter_mut() {
        rows.push(f);
    }
    for j in joints.iter_mut() {
        rows.push(&mut **j);
    }

    prepare(&mut rows, bodies, &mut scratch, h);

    if config.friction_iterations > 0 {
        run_iterations(&mut rows, &mut scratch, config.friction_iterations, config.tolerance, false, h);
        for row in rows.iter_mut() {
            let eq = row.equation_mut();
            eq.multiplier = eq.lambda / h;
        }
        drop(rows);
        let contact_snapshot: Vec<ContactEquation> = contacts.to_vec();
        for friction in frictions.iter_mut() {
            friction.update_bounds(&contact_snapshot);
        }
        rows = Vec::with_capacity(contacts.len() + frictions.len() + joints.len());
        for c in contacts.iter_mut() {
            rows.push(c as &mut dyn EquationRow);
        }
        for f in frictions.iter_mut() {
            rows.push(f as &mut dyn EquationRow);
        }
        for j in joints.iter_mut() {
            rows.push(&mut **j as &mut dyn EquationRow);
        }
        for row in rows.iter_mut() {
            row.equation_mut().lambda = 0.0;
        }
        for s in scratch.values_mut() {
            s.vlambda = Vec2::zero();
            s.wlambda = 0.0;
        }
    }

    run_iterations(&mut rows, &mut scratch, config.iterations, config.tolerance, config.use_zero_rhs, h);

    for row in rows.iter_mut() {
        let eq = row.equation_mut();
        eq.multiplier = eq.lambda / h;
    }

    apply_to_bodies(&scratch, bodies);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyOptions, DynamicBodyOptions};
    use crate::equation::ContactEquation;
    use crate::shape::Shape;

    fn dynamic_circle(bodies: &mut SlotMap<BodyId, Body>, x: f64, vx: f64) -> BodyId {
        let mut body = Body::new_dynamic(
            BodyOptions {
                position: Vec2::new(x, 0.0),
                ..Default::default()
            },
            DynamicBodyOptions {
                velocity: Vec2::new(vx, 0.0),
                ..Default::default()
            },
        );
        body.add_shape(Shape::circle(1.0), None, None).unwrap();
        bodies.insert(body)
    }

    #[test]
    fn head_on_contact_separates_approaching_bodies() {
        let mut bodies = SlotMap::<BodyId, Body>::with_key();
        let a = dynamic_circle(&mut bodies, -0.4, 1.0);
        let b = dynamic_circle(&mut bodies, 0.4, -1.0);

        let mut contact = ContactEquation::new(a, b, Default::default(), Default::default());
        contact.normal_a = Vec2::new(1.0, 0.0);
        contact.contact_point_a = Vec2::new(1.0, 0.0);
        contact.contact_point_b = Vec2::new(-1.0, 0.0);
        contact.update_jacobian();
        contact.update_offset(0.2, 0.0);
        contact.equation.max_force = f64::INFINITY;

        let mut contacts = [contact];
        let mut frictions: [crate::equation::FrictionEquation; 0] = [];
        let mut joints: [&mut JointEquation; 0] = [];
        solve(&mut bodies, &mut contacts, &mut frictions, &mut joints, 1.0 / 60.0, &SolverConfig::default());

        assert!(bodies[a].velocity().x < 1.0, "A should be pushed back by the contact");
        assert!(bodies[b].velocity().x > -1.0, "B should be pushed back by the contact");
    }

    #[test]
    fn solve_with_no_equations_is_a_no_op() {
        let mut bodies = SlotMap::<BodyId, Body>::with_key();
        let mut contacts: [ContactEquation; 0] = [];
        let mut frictions: [FrictionEquation; 0] = [];
        let mut joints: [&mut JointEquation; 0] = [];
        solve(&mut bodies, &mut contacts, &mut frictions, &mut joints, 1.0 / 60.0, &SolverConfig::default());
    }
}
