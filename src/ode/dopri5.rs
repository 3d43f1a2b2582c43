//! Adaptive Dormand-Prince 5(4) stepper.
//!
//! Embedded 5th/4th order pair with the first-same-as-last property: the
//! incoming `dxdt` is stage 1, and on acceptance the 7th stage (the
//! derivative at the new point) is written back into `dxdt`.
//!
//! Step-size control follows the classic controlled-stepper rules: a
//! rejected step shrinks `dt` by `max(0.9·err^(−1/4), 0.2)`; an accepted
//! step with `err < 0.5` grows it by `min(0.9·err^(−1/5), 5)`.

use nalgebra::DVector;

use super::StepOutcome;

// Butcher tableau
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

// 5th-order solution weights (b7 = 0)
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Error weights: b − b̂ (embedded 4th-order)
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339_200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SHRINK_FLOOR: f64 = 0.2;
const GROW_CAP: f64 = 5.0;
const SAFETY: f64 = 0.9;

/// Adaptive Dormand-Prince 5(4) with scratch stage buffers.
#[derive(Debug)]
pub struct Dopri5 {
    tol_abs: f64,
    tol_rel: f64,
    k2: DVector<f64>,
    k3: DVector<f64>,
    k4: DVector<f64>,
    k5: DVector<f64>,
    k6: DVector<f64>,
    k7: DVector<f64>,
    x_stage: DVector<f64>,
    x_new: DVector<f64>,
}

impl Dopri5 {
    /// Stepper controlled by the given absolute/relative tolerances.
    #[must_use]
    pub fn new(tol_abs: f64, tol_rel: f64) -> Self {
        Self {
            tol_abs,
            tol_rel,
            k2: DVector::zeros(0),
            k3: DVector::zeros(0),
            k4: DVector::zeros(0),
            k5: DVector::zeros(0),
            k6: DVector::zeros(0),
            k7: DVector::zeros(0),
            x_stage: DVector::zeros(0),
            x_new: DVector::zeros(0),
        }
    }

    fn resize(&mut self, n: usize) {
        if self.k2.len() != n {
            self.k2 = DVector::zeros(n);
            self.k3 = DVector::zeros(n);
            self.k4 = DVector::zeros(n);
            self.k5 = DVector::zeros(n);
            self.k6 = DVector::zeros(n);
            self.k7 = DVector::zeros(n);
            self.x_stage = DVector::zeros(n);
            self.x_new = DVector::zeros(n);
        }
    }

    /// Attempt one step; see [`super::OdeStepper::try_step`] for the
    /// contract.
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
        let n = x.len();
        self.resize(n);
        let h = *dt;
        let k1 = &*dxdt; // FSAL: derivative at (x, t) supplied by the caller

        // Stage 2
        for i in 0..n {
            self.x_stage[i] = x[i] + h * A21 * k1[i];
        }
        system(&self.x_stage, &mut self.k2, *t + C2 * h);

        // Stage 3
        for i in 0..n {
            self.x_stage[i] = x[i] + h * (A31 * k1[i] + A32 * self.k2[i]);
        }
        system(&self.x_stage, &mut self.k3, *t + C3 * h);

        // Stage 4
        for i in 0..n {
            self.x_stage[i] = x[i] + h * (A41 * k1[i] + A42 * self.k2[i] + A43 * self.k3[i]);
        }
        system(&self.x_stage, &mut self.k4, *t + C4 * h);

        // Stage 5
        for i in 0..n {
            self.x_stage[i] = x[i]
                + h * (A51 * k1[i] + A52 * self.k2[i] + A53 * self.k3[i] + A54 * self.k4[i]);
        }
        system(&self.x_stage, &mut self.k5, *t + C5 * h);

        // Stage 6
        for i in 0..n {
            self.x_stage[i] = x[i]
                + h * (A61 * k1[i]
                    + A62 * self.k2[i]
                    + A63 * self.k3[i]
                    + A64 * self.k4[i]
                    + A65 * self.k5[i]);
        }
        system(&self.x_stage, &mut self.k6, *t + h);

        // 5th-order solution; stage 7 is its derivative (FSAL)
        for i in 0..n {
            self.x_new[i] = x[i]
                + h * (B1 * k1[i]
                    + B3 * self.k3[i]
                    + B4 * self.k4[i]
                    + B5 * self.k5[i]
                    + B6 * self.k6[i]);
        }
        system(&self.x_new, &mut self.k7, *t + h);

        // Scaled max-norm of the embedded error estimate
        let mut err: f64 = 0.0;
        for i in 0..n {
            let e = h
                * (E1 * k1[i]
                    + E3 * self.k3[i]
                    + E4 * self.k4[i]
                    + E5 * self.k5[i]
                    + E6 * self.k6[i]
                    + E7 * self.k7[i]);
            let scale = self.tol_abs + self.tol_rel * (x[i].abs() + h * k1[i].abs());
            err = err.max((e / scale).abs());
        }

        if err.is_finite() && err <= 1.0 {
            *t += h;
            x.copy_from(&self.x_new);
            dxdt.copy_from(&self.k7);
            if err < 0.5 {
                let factor = if err > 0.0 {
                    (SAFETY * err.powf(-0.2)).min(GROW_CAP)
                } else {
                    GROW_CAP
                };
                *dt = h * factor;
            }
            StepOutcome::Accepted
        } else {
            let factor = if err.is_finite() {
                (SAFETY * err.powf(-0.25)).max(SHRINK_FLOOR)
            } else {
                SHRINK_FLOOR
            };
            *dt = h * factor;
            StepOutcome::Rejected
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fifth_order_accuracy_on_polynomial() {
        // dx/dt = 5t⁴ integrates t⁵ exactly at 5th order.
        let system = |_x: &DVector<f64>, dxdt: &mut DVector<f64>, t: f64| {
            dxdt[0] = 5.0 * t.powi(4);
        };
        let mut stepper = Dopri5::new(1e-12, 1e-12);
        let mut x = DVector::zeros(1);
        let mut dxdt = DVector::zeros(1);
        let mut t = 0.0;
        let mut dt: f64 = 0.5;

        while t < 1.0 - 1e-12 {
            dt = dt.min(1.0 - t);
            let _ = stepper.try_step(system, &mut x, &mut dxdt, &mut t, &mut dt);
        }
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn fsal_derivative_is_refreshed() {
        let system = |x: &DVector<f64>, dxdt: &mut DVector<f64>, _t: f64| {
            dxdt[0] = -2.0 * x[0];
        };
        let mut stepper = Dopri5::new(1e-8, 1e-8);
        let mut x = DVector::from_element(1, 1.0);
        let mut dxdt = DVector::from_element(1, -2.0);
        let mut t = 0.0;
        let mut dt = 1e-3;

        let outcome = stepper.try_step(system, &mut x, &mut dxdt, &mut t, &mut dt);
        assert_eq!(outcome, StepOutcome::Accepted);
        assert_relative_eq!(dxdt[0], -2.0 * x[0], epsilon = 1e-14);
    }

    #[test]
    fn growth_is_capped() {
        // A trivially-smooth system: err ≈ 0 so dt grows by the cap factor.
        let system = |_x: &DVector<f64>, dxdt: &mut DVector<f64>, _t: f64| {
            dxdt[0] = 1.0;
        };
        let mut stepper = Dopri5::new(1e-6, 1e-6);
        let mut x = DVector::zeros(1);
        let mut dxdt = DVector::from_element(1, 1.0);
        let mut t = 0.0;
        let mut dt = 1e-4;

        let _ = stepper.try_step(system, &mut x, &mut dxdt, &mut t, &mut dt);
        assert_relative_eq!(dt, 5e-4, epsilon = 1e-12);
    }
}
