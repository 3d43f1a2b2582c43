//! Controller abstraction.
//!
//! The controller produces the per-motor command torque at the configured
//! controller update period (or continuously), and may inject open-loop
//! passive terms into the internal dynamics. It can register its own
//! telemetry variables at simulation start.

use nalgebra::DVector;

use crate::telemetry::TelemetryData;
use crate::types::error::EngineError;

/// User control law consumed by the engine.
pub trait Controller: Send {
    /// Compute the command torque, one entry per motor. `u` is zeroed by the
    /// engine before the call.
    fn compute_command(&mut self, t: f64, q: &DVector<f64>, v: &DVector<f64>, u: &mut DVector<f64>);

    /// Add open-loop passive terms to the internal joint torques (length
    /// `nv`). Called at every RHS evaluation, before limits and
    /// flexibilities.
    fn internal_dynamics(
        &mut self,
        t: f64,
        q: &DVector<f64>,
        v: &DVector<f64>,
        u: &mut DVector<f64>,
    );

    /// Register controller telemetry variables. Called once at simulation
    /// start, before the registry freezes.
    ///
    /// # Errors
    ///
    /// Propagates registry errors (e.g. registration after freeze).
    fn configure_telemetry(&mut self, _telemetry: &mut TelemetryData) -> Result<(), EngineError> {
        Ok(())
    }

    /// Push current values of the controller telemetry variables. Called at
    /// every log snapshot.
    fn update_telemetry(&mut self, _telemetry: &mut TelemetryData) {}

    /// Clear any internal state between simulations.
    fn reset(&mut self) {}
}

/// Command functor signature: `(t, q, v, u_out)`.
pub type CommandFn = Box<dyn FnMut(f64, &DVector<f64>, &DVector<f64>, &mut DVector<f64>) + Send>;

/// A controller backed by plain functions.
pub struct FunctorController {
    command: CommandFn,
    internal: CommandFn,
}

impl FunctorController {
    /// Build from a command functor and an internal-dynamics functor.
    #[must_use]
    pub fn new(command: CommandFn, internal: CommandFn) -> Self {
        Self { command, internal }
    }

    /// Build from a command functor only (no extra passive terms).
    #[must_use]
    pub fn from_command(command: CommandFn) -> Self {
        Self {
            command,
            internal: Box::new(|_, _, _, _| {}),
        }
    }

    /// Controller producing no torque at all.
    #[must_use]
    pub fn passive() -> Self {
        Self {
            command: Box::new(|_, _, _, _| {}),
            internal: Box::new(|_, _, _, _| {}),
        }
    }
}

impl Controller for FunctorController {
    fn compute_command(
        &mut self,
        t: f64,
        q: &DVector<f64>,
        v: &DVector<f64>,
        u: &mut DVector<f64>,
    ) {
        (self.command)(t, q, v, u);
    }

    fn internal_dynamics(
        &mut self,
        t: f64,
        q: &DVector<f64>,
        v: &DVector<f64>,
        u: &mut DVector<f64>,
    ) {
        (self.internal)(t, q, v, u);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn functor_controller_dispatches() {
        let mut ctrl = FunctorController::from_command(Box::new(|t, _q, _v, u| {
            u[0] = 2.0 * t;
        }));
        let q = DVector::zeros(1);
        let v = DVector::zeros(1);
        let mut u = DVector::zeros(1);
        ctrl.compute_command(3.0, &q, &v, &mut u);
        assert_eq!(u[0], 6.0);
        ctrl.internal_dynamics(3.0, &q, &v, &mut u);
        assert_eq!(u[0], 6.0); // no-op internal hook
    }
}
