//! Mechanical energy queries.
//!
//! Kinetic energy comes from the joint-space inertia matrix
//! (`½ vᵀ M v`); since `M` carries the motor rotor inertias on its
//! diagonal, the rotor term `½·I_rotor·v²` is included automatically.
//! Potential energy is gravitational: `−Σ mᵢ g·comᵢ`.

use nalgebra::DVector;

use crate::types::data::Data;
use crate::types::model::Model;

/// Kinetic energy `½ vᵀ M v`. Requires a fresh mass matrix from
/// [`crate::dynamics::crba`].
#[must_use]
pub fn kinetic_energy(data: &Data, v: &DVector<f64>) -> f64 {
    0.5 * v.dot(&(&data.qM * v))
}

/// Gravitational potential energy, zero at the world origin. Requires fresh
/// kinematics.
#[must_use]
pub fn potential_energy(model: &Model, data: &Data) -> f64 {
    let mut potential = 0.0;
    for body_id in 1..model.nbody {
        potential -= model.body_mass[body_id] * model.gravity.dot(&data.xipos[body_id]);
    }
    potential
}
