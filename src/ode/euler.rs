//! Fixed-step explicit Euler stepper.

use nalgebra::DVector;

use super::StepOutcome;

/// Explicit Euler: always succeeds, never adapts `dt`.
///
/// The update deliberately advances time first and evaluates the derivative
/// at `(x_old, t_new)` before applying it, matching the controlled-stepper
/// adapter this scheme replaces: `t += dt; x += dt·f(x, t)`.
#[derive(Debug, Default)]
pub struct ExplicitEuler;

impl ExplicitEuler {
    /// Perform one step; see [`super::OdeStepper::try_step`] for the
    /// contract. Always returns [`StepOutcome::Accepted`].
    pub fn try_step<F>(
        &mut self,
        mut system: F,
        x: &mut DVector<f64>,
        dxdt: &mut DVector<f64>,
        t: &mut f64,
        dt: &mut f64,
    ) -> StepOutcome
    where
        F: FnMut(&DVector<f64>, &mut DVector<f64>, f64),
    {
        *t += *dt;
        system(x, dxdt, *t);
        x.axpy(*dt, dxdt, 1.0);
        StepOutcome::Accepted
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn first_order_update() {
        let system = |x: &DVector<f64>, dxdt: &mut DVector<f64>, _t: f64| {
            dxdt[0] = -x[0];
        };
        let mut stepper = ExplicitEuler;
        let mut x = DVector::from_element(1, 1.0);
        let mut dxdt = DVector::zeros(1);
        let mut t = 0.0;
        let mut dt = 0.1;

        let outcome = stepper.try_step(system, &mut x, &mut dxdt, &mut t, &mut dt);
        assert_eq!(outcome, StepOutcome::Accepted);
        assert_eq!(t, 0.1);
        assert!((x[0] - 0.9).abs() < 1e-12);
        assert_eq!(dt, 0.1); // never adapted
    }
}
