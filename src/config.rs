//! Hot-reloadable tuning knobs (§6 configuration table), grouped the way the
//! teacher's `physics::Settings` groups `substeps`/`gravity`/`air_friction` into
//! one `serde`-deserializable record.

use serde::{Deserialize, Serialize};

/// Default spatial-hash cell count beyond which a body is filed into the "huge" set
/// instead of being inserted per-cell (§4.2).
pub const HUGE_LIMIT: usize = 200;

/// Solver tuning (§4.4, §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Max PGS passes per solve.
    pub iterations: u32,
    /// Early-exit tolerance per equation; the main iteration stops when the sum of
    /// squared deltas for a pass is at or below `(tolerance * equation_count)^2`.
    pub tolerance: f64,
    /// Extra passes run before the main iteration to calibrate friction bounds.
    pub friction_iterations: u32,
    /// Replace `B` with 0 during the main iteration (position-correction pass).
    pub use_zero_rhs: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            tolerance: 1e-6,
            friction_iterations: 0,
            use_zero_rhs: false,
        }
    }
}

/// Spatial-hash broadphase sizing (§4.2, §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BroadphaseConfig {
    pub cell_size: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for BroadphaseConfig {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            width: 128,
            height: 128,
        }
    }
}

/// Per-body sleep policy (§3 "Sleep state", §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SleepMode {
    /// Bodies never sleep.
    NoSleep,
    /// Each body's idle time is tracked and it sleeps independently.
    PerBody,
    /// A whole island sleeps at once, once every dynamic member wants to.
    PerIsland,
}

/// World-level step policy (§4.5, §4.8, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Partition bodies/equations into islands and solve each independently.
    pub island_split: bool,
    pub sleep_mode: SleepMode,
    /// Build one averaged friction equation per manifold instead of one per contact.
    pub friction_reduction: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            island_split: false,
            sleep_mode: SleepMode::PerBody,
            friction_reduction: false,
        }
    }
}

/// The engine's full tuning surface, composed the way the teacher's `Settings`
/// record groups its own per-subsystem knobs into one hot-reloadable value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub solver: SolverConfig,
    pub broadphase: BroadphaseConfig,
    pub world: WorldConfig,
    /// Bodies with speed^2 below this limit start accumulating idle time.
    pub sleep_speed_limit: f64,
    /// Idle time required, in seconds, before a body may sleep.
    pub sleep_time_limit: f64,
    /// Default CCD iteration count for bodies that opt in with `ccd_speed_threshold`.
    pub ccd_iterations: u32,
    pub gravity: crate::math::Vec2,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            broadphase: BroadphaseConfig::default(),
            world: WorldConfig::default(),
            sleep_speed_limit: 0.2,
            sleep_time_limit: 1.0,
            ccd_iterations: 10,
            gravity: crate::math::Vec2::new(0.0, -10.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_has_finite_positive_tolerances() {
        let settings = Settings::default();
        assert!(settings.solver.tolerance > 0.0);
        assert!(settings.solver.iterations > 0);
        assert!(settings.sleep_speed_limit > 0.0);
    }
}
