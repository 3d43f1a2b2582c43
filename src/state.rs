//! Stepper state buffer.
//!
//! Owns everything the integration loop mutates: time, timestep, the state
//! vector and its derivative, the torque accumulators, and the per-body
//! external force register. The engine keeps two copies: the current state
//! and the last-accepted snapshot, which the dynamics reads for quantities
//! that are not yet known at evaluation time (acceleration, motor torques).

use nalgebra::{DVector, DVectorView, DVectorViewMut};

use crate::dynamics::spatial::SpatialForce;
use crate::types::model::Model;

/// Mutable state of the integration loop.
#[derive(Debug, Clone)]
pub struct StepperState {
    /// Number of accepted integrator steps since `start`.
    pub iter: u32,
    /// Current time \[s\].
    pub t: f64,
    /// Current integrator timestep \[s\].
    pub dt: f64,
    /// Kahan compensation term accumulated over `step` calls.
    pub t_err: f64,
    /// State vector `x = [q; v]`.
    pub x: DVector<f64>,
    /// State derivative `dx/dt = [q̇; v̇]`.
    pub dxdt: DVector<f64>,
    /// Total joint torque (length `nv`).
    pub u: DVector<f64>,
    /// Controller command, one entry per motor.
    pub u_command: DVector<f64>,
    /// Actual motor torque, one entry per motor.
    pub u_motor: DVector<f64>,
    /// Internal joint torques: limits, flexibility, passive (length `nv`).
    pub u_internal: DVector<f64>,
    /// External spatial force per body, local frame, re-zeroed each RHS
    /// evaluation.
    pub f_external: Vec<SpatialForce>,

    nq: usize,
    nv: usize,
    is_initialized: bool,
}

impl Default for StepperState {
    fn default() -> Self {
        Self {
            iter: 0,
            t: 0.0,
            dt: 0.0,
            t_err: 0.0,
            x: DVector::zeros(0),
            dxdt: DVector::zeros(0),
            u: DVector::zeros(0),
            u_command: DVector::zeros(0),
            u_motor: DVector::zeros(0),
            u_internal: DVector::zeros(0),
            f_external: Vec::new(),
            nq: 0,
            nv: 0,
            is_initialized: false,
        }
    }
}

impl StepperState {
    /// Size buffers for `model`, seed the state with `x0`, and compute the
    /// initial configuration derivative so quaternion slots are correct from
    /// the first evaluation.
    pub fn initialize(&mut self, model: &Model, x0: &DVector<f64>, dt0: f64) {
        self.nq = model.nq;
        self.nv = model.nv;

        self.iter = 0;
        self.t = 0.0;
        self.dt = dt0;
        self.t_err = 0.0;
        self.x = x0.clone();
        self.dxdt = DVector::zeros(model.nx());

        let q = x0.rows(0, model.nq).into_owned();
        let v = x0.rows(model.nq, model.nv).into_owned();
        let mut qdot = DVector::zeros(model.nq);
        crate::dynamics::configuration_derivative(model, &mut qdot, &q, &v, 0.0);
        self.dxdt.rows_mut(0, model.nq).copy_from(&qdot);

        self.u = DVector::zeros(model.nv);
        self.u_command = DVector::zeros(model.motors.len());
        self.u_motor = DVector::zeros(model.motors.len());
        self.u_internal = DVector::zeros(model.nv);
        self.f_external = vec![SpatialForce::zero(); model.nbody];

        self.is_initialized = true;
    }

    /// Whether [`initialize`](Self::initialize) has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    /// Configuration view (first `nq` entries of `x`).
    #[must_use]
    pub fn q(&self) -> DVectorView<'_, f64> {
        self.x.rows(0, self.nq)
    }

    /// Velocity view (last `nv` entries of `x`).
    #[must_use]
    pub fn v(&self) -> DVectorView<'_, f64> {
        self.x.rows(self.nq, self.nv)
    }

    /// Configuration-derivative view (first `nq` entries of `dx/dt`).
    #[must_use]
    pub fn qdot(&self) -> DVectorView<'_, f64> {
        self.dxdt.rows(0, self.nq)
    }

    /// Acceleration view (last `nv` entries of `dx/dt`).
    #[must_use]
    pub fn a(&self) -> DVectorView<'_, f64> {
        self.dxdt.rows(self.nq, self.nv)
    }

    /// Mutable configuration view.
    #[must_use]
    pub fn q_mut(&mut self) -> DVectorViewMut<'_, f64> {
        self.x.rows_mut(0, self.nq)
    }

    /// Owned copy of the configuration.
    #[must_use]
    pub fn q_owned(&self) -> DVector<f64> {
        self.q().into_owned()
    }

    /// Owned copy of the velocity.
    #[must_use]
    pub fn v_owned(&self) -> DVector<f64> {
        self.v().into_owned()
    }

    /// Owned copy of the acceleration.
    #[must_use]
    pub fn a_owned(&self) -> DVector<f64> {
        self.a().into_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn views_split_the_state_vector() {
        let model = Model::n_link_pendulum(2, 1.0, 1.0);
        let mut state = StepperState::default();
        assert!(!state.is_initialized());

        let mut x0 = DVector::zeros(4);
        x0[0] = 0.1;
        x0[3] = -0.5;
        state.initialize(&model, &x0, 1e-3);

        assert!(state.is_initialized());
        assert_eq!(state.q()[0], 0.1);
        assert_eq!(state.v()[1], -0.5);
        assert_eq!(state.u.len(), 2);
        assert_eq!(state.f_external.len(), 3);
        // qdot seeded from the configuration derivative: hinge qdot = v
        assert_eq!(state.qdot()[1], -0.5);
    }
}
