//! Motor model: command torque → actual joint torque.
//!
//! A [`SimpleMotor`] clamps the commanded torque to the actuator limit and
//! adds velocity-dependent friction (viscous + smoothed dry). The rotor
//! inertia feeds the forward dynamics through the mass-matrix diagonal of
//! the motorized DoF.

use nalgebra::DVector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::error::EngineError;

/// Options of a [`SimpleMotor`]. All values carry SI units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorOptions {
    /// Clamp the commanded torque to `[-torque_limit, torque_limit]`.
    pub enable_torque_limit: bool,
    /// Torque limit \[N·m\]. Only read when `enable_torque_limit` is set.
    pub torque_limit: f64,
    /// Add viscous + dry friction to the produced torque.
    pub enable_friction: bool,
    /// Viscous friction gain for positive joint velocity. Must be <= 0.
    pub friction_viscous_positive: f64,
    /// Viscous friction gain for negative joint velocity. Must be <= 0.
    pub friction_viscous_negative: f64,
    /// Dry friction torque for positive joint velocity. Must be <= 0.
    pub friction_dry_positive: f64,
    /// Dry friction torque for negative joint velocity. Must be <= 0.
    pub friction_dry_negative: f64,
    /// Slope of the tanh smoothing of dry friction. Must be >= 0.
    pub friction_dry_slope: f64,
    /// Rotor inertia reflected at the joint \[kg·m²\].
    pub rotor_inertia: f64,
}

impl Default for MotorOptions {
    fn default() -> Self {
        Self {
            enable_torque_limit: false,
            torque_limit: 0.0,
            enable_friction: false,
            friction_viscous_positive: 0.0,
            friction_viscous_negative: 0.0,
            friction_dry_positive: 0.0,
            friction_dry_negative: 0.0,
            friction_dry_slope: 0.0,
            rotor_inertia: 0.0,
        }
    }
}

impl MotorOptions {
    /// Validate sign conventions of the friction parameters.
    ///
    /// # Errors
    ///
    /// `BadInput` when a friction gain has the wrong sign or the rotor
    /// inertia is negative.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.friction_viscous_positive > 0.0 || self.friction_viscous_negative > 0.0 {
            return Err(EngineError::bad_input(
                "motor viscous friction gains must be negative",
            ));
        }
        if self.friction_dry_positive > 0.0 || self.friction_dry_negative > 0.0 {
            return Err(EngineError::bad_input(
                "motor dry friction torques must be negative",
            ));
        }
        if self.friction_dry_slope < 0.0 {
            return Err(EngineError::bad_input(
                "motor dry friction slope must be positive",
            ));
        }
        if self.rotor_inertia < 0.0 {
            return Err(EngineError::bad_input("motor rotor inertia must be positive"));
        }
        Ok(())
    }
}

/// A single-joint motor with torque clamping and friction.
#[derive(Debug, Clone)]
pub struct SimpleMotor {
    name: String,
    /// Index of this motor in the model's motor list.
    idx: usize,
    /// Joint driven by this motor.
    joint_id: usize,
    /// Velocity index of the driven DoF.
    joint_velocity_idx: usize,
    /// Motor options.
    pub options: MotorOptions,
}

impl SimpleMotor {
    /// Create a motor on a 1-DoF joint.
    pub(crate) fn new(
        name: impl Into<String>,
        idx: usize,
        joint_id: usize,
        joint_velocity_idx: usize,
        options: MotorOptions,
    ) -> Self {
        Self {
            name: name.into(),
            idx,
            joint_id,
            joint_velocity_idx,
            options,
        }
    }

    /// Motor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of this motor in the model's motor list.
    #[must_use]
    pub fn idx(&self) -> usize {
        self.idx
    }

    /// Joint driven by this motor.
    #[must_use]
    pub fn joint_id(&self) -> usize {
        self.joint_id
    }

    /// Velocity index of the driven DoF.
    #[must_use]
    pub fn joint_velocity_idx(&self) -> usize {
        self.joint_velocity_idx
    }

    /// Rotor inertia reflected at the joint.
    #[must_use]
    pub fn rotor_inertia(&self) -> f64 {
        self.options.rotor_inertia
    }

    /// Compute the torque actually produced on the joint.
    ///
    /// The commanded torque is clamped to the actuator limit, then friction
    /// is added: viscous (sign-dependent gain) plus dry friction smoothed by
    /// `tanh(slope · v)`.
    #[must_use]
    pub fn compute_effort(&self, _t: f64, v: &DVector<f64>, u_command: f64) -> f64 {
        let mut torque = u_command;

        if self.options.enable_torque_limit {
            torque = torque.clamp(-self.options.torque_limit, self.options.torque_limit);
        }

        if self.options.enable_friction {
            let v_motor = v[self.joint_velocity_idx];
            if v_motor > 0.0 {
                torque += self.options.friction_viscous_positive * v_motor
                    + self.options.friction_dry_positive
                        * (self.options.friction_dry_slope * v_motor).tanh();
            } else {
                torque += self.options.friction_viscous_negative * v_motor
                    + self.options.friction_dry_negative
                        * (self.options.friction_dry_slope * v_motor).tanh();
            }
        }

        torque
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motor(options: MotorOptions) -> SimpleMotor {
        SimpleMotor::new("m0", 0, 0, 0, options)
    }

    #[test]
    fn torque_passthrough_without_options() {
        let m = motor(MotorOptions::default());
        let v = DVector::zeros(1);
        assert_eq!(m.compute_effort(0.0, &v, 3.5), 3.5);
    }

    #[test]
    fn torque_clamped_to_limit() {
        let m = motor(MotorOptions {
            enable_torque_limit: true,
            torque_limit: 10.0,
            ..Default::default()
        });
        let v = DVector::zeros(1);
        assert_eq!(m.compute_effort(0.0, &v, 25.0), 10.0);
        assert_eq!(m.compute_effort(0.0, &v, -25.0), -10.0);
    }

    #[test]
    fn friction_opposes_motion() {
        let m = motor(MotorOptions {
            enable_friction: true,
            friction_viscous_positive: -0.1,
            friction_viscous_negative: -0.1,
            friction_dry_positive: -0.5,
            friction_dry_negative: -0.5,
            friction_dry_slope: 100.0,
            ..Default::default()
        });
        let mut v = DVector::zeros(1);
        v[0] = 2.0;
        let tau = m.compute_effort(0.0, &v, 0.0);
        assert!(tau < 0.0, "friction should oppose positive velocity");
        v[0] = -2.0;
        let tau = m.compute_effort(0.0, &v, 0.0);
        assert!(tau > 0.0, "friction should oppose negative velocity");
    }

    #[test]
    fn option_sign_validation() {
        let bad = MotorOptions {
            friction_viscous_positive: 0.3,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(MotorOptions::default().validate().is_ok());
    }
}
