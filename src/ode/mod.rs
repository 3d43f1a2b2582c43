//! ODE steppers behind one uniform try-step interface.
//!
//! Two variants: adaptive Dormand-Prince 5(4) controlled by absolute and
//! relative tolerances, and a fixed explicit Euler that always succeeds.
//! Callers never branch on the active variant; adding an integrator only
//! requires implementing `try_step` for it.
//!
//! Contract: on rejection neither `t` nor `x` moves; on acceptance `t`
//! advances by the attempted `dt`, `x` holds the new state, and `dxdt`
//! holds the derivative at the new point (so the FSAL property chains).

pub mod dopri5;
pub mod euler;

use nalgebra::DVector;

pub use dopri5::Dopri5;
pub use euler::ExplicitEuler;

/// Outcome of one integration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step was accepted; `t`, `x`, `dxdt` advanced.
    Accepted,
    /// The step was rejected; `dt` was reduced, nothing else moved.
    Rejected,
}

/// Closed set of available steppers.
#[derive(Debug)]
pub enum OdeStepper {
    /// Adaptive Dormand-Prince 5(4).
    RungeKuttaDopri5(Dopri5),
    /// Fixed-step explicit Euler.
    ExplicitEuler(ExplicitEuler),
}

impl OdeStepper {
    /// Adaptive stepper with the given tolerances.
    #[must_use]
    pub fn dopri5(tol_abs: f64, tol_rel: f64) -> Self {
        Self::RungeKuttaDopri5(Dopri5::new(tol_abs, tol_rel))
    }

    /// Fixed explicit Euler stepper.
    #[must_use]
    pub fn explicit_euler() -> Self {
        Self::ExplicitEuler(ExplicitEuler)
    }

    /// Attempt one step of size `dt` of the system `dxdt = f(x, t)`.
    ///
    /// `system(x, dxdt_out, t)` evaluates the dynamics. `dxdt` must hold
    /// `f(x, t)` on entry (first-same-as-last chaining); it is refreshed at
    /// the new point on acceptance.
    pub fn try_step<F>(
        &mut self,
        system: F,
        x: &mut DVector<f64>,
        dxdt: &mut DVector<f64>,
        t: &mut f64,
        dt: &mut f64,
    ) -> StepOutcome
    where
        F: FnMut(&DVector<f64>, &mut DVector<f64>, f64),
    {
        match self {
            Self::RungeKuttaDopri5(stepper) => stepper.try_step(system, x, dxdt, t, dt),
            Self::ExplicitEuler(stepper) => stepper.try_step(system, x, dxdt, t, dt),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Integrate dx/dt = -x from x(0)=1 to t=1 and compare with e^-t.
    fn integrate_decay(mut stepper: OdeStepper, dt0: f64) -> f64 {
        let system = |x: &DVector<f64>, dxdt: &mut DVector<f64>, _t: f64| {
            dxdt[0] = -x[0];
        };
        let mut x = DVector::from_element(1, 1.0);
        let mut dxdt = DVector::from_element(1, -1.0);
        let mut t = 0.0;
        let mut dt = dt0;

        while t < 1.0 - 1e-12 {
            dt = dt.min(1.0 - t);
            let _ = stepper.try_step(system, &mut x, &mut dxdt, &mut t, &mut dt);
        }
        x[0]
    }

    #[test]
    fn dopri5_matches_exponential_decay() {
        let x1 = integrate_decay(OdeStepper::dopri5(1e-10, 1e-10), 1e-2);
        assert_relative_eq!(x1, (-1.0f64).exp(), epsilon = 1e-8);
    }

    #[test]
    fn euler_matches_exponential_decay_coarsely() {
        let x1 = integrate_decay(OdeStepper::explicit_euler(), 1e-4);
        assert_relative_eq!(x1, (-1.0f64).exp(), epsilon = 1e-3);
    }

    #[test]
    fn dopri5_rejects_and_shrinks_on_oversized_steps() {
        // Stiff-ish oscillator with a huge initial dt: the first attempt
        // must be rejected and dt reduced, t left untouched.
        let system = |x: &DVector<f64>, dxdt: &mut DVector<f64>, _t: f64| {
            dxdt[0] = x[1];
            dxdt[1] = -1e6 * x[0];
        };
        let mut stepper = OdeStepper::dopri5(1e-8, 1e-8);
        let mut x = DVector::from_vec(vec![1.0, 0.0]);
        let mut dxdt = DVector::from_vec(vec![0.0, -1e6]);
        let mut t = 0.0;
        let mut dt = 1.0;

        let outcome = stepper.try_step(system, &mut x, &mut dxdt, &mut t, &mut dt);
        assert_eq!(outcome, StepOutcome::Rejected);
        assert_eq!(t, 0.0);
        assert_eq!(x[0], 1.0);
        assert!(dt < 1.0);
    }
}
