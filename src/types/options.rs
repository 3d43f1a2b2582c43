//! Engine option groups.
//!
//! Options are grouped the way the engine consumes them: `stepper` for the
//! integration loop, `world` for gravity and the ground profile, `joints`
//! for limit springs, `contacts` for the ground reaction law, `telemetry`
//! for log content. All values carry SI units. Defaults are production
//! values; validation happens in [`crate::Engine::set_options`] before any
//! side effect.

use nalgebra::{Vector3, Vector6};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Smallest timestep an accepted integrator step may take \[s\].
pub const MIN_STEPPER_TIMESTEP: f64 = 1e-12;

/// Smallest resolvable simulation timestep; discrete update periods and
/// `dt_max` must not go below this \[s\].
pub const MIN_SIMULATION_TIMESTEP: f64 = 1e-6;

/// Floor applied to the accumulated step size at every breakpoint, so that a
/// breakpoint-shrunk `dt` recovers instantly \[s\].
pub const DEFAULT_SIMULATION_TIMESTEP: f64 = 1e-3;

/// Largest allowed `dt_max` \[s\].
pub const MAX_SIMULATION_TIMESTEP: f64 = 5e-3;

/// Ground profile functor: world position → (ground height, unit normal).
///
/// The normal is re-normalized by the contact model, so the functor does not
/// have to return an exactly unit vector.
pub struct GroundProfile(pub Box<dyn Fn(&Vector3<f64>) -> (f64, Vector3<f64>) + Send>);

impl GroundProfile {
    /// Flat ground at `z = 0` with normal `+e_z`.
    #[must_use]
    pub fn flat() -> Self {
        Self(Box::new(|_| (0.0, Vector3::new(0.0, 0.0, 1.0))))
    }

    /// Evaluate the profile at a world position.
    #[must_use]
    pub fn query(&self, pos: &Vector3<f64>) -> (f64, Vector3<f64>) {
        (self.0)(pos)
    }
}

impl Default for GroundProfile {
    fn default() -> Self {
        Self::flat()
    }
}

impl std::fmt::Debug for GroundProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GroundProfile(<functor>)")
    }
}

/// Integration-loop options.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepperOptions {
    /// Emit per-step diagnostics through `tracing`.
    pub verbose: bool,
    /// Seed of the process-wide random number generator.
    pub random_seed: u32,
    /// ODE solver: `"runge_kutta_dopri5"` or `"explicit_euler"`.
    pub ode_solver: String,
    /// Absolute tolerance of the adaptive stepper.
    pub tol_abs: f64,
    /// Relative tolerance of the adaptive stepper.
    pub tol_rel: f64,
    /// Largest allowed integrator timestep \[s\]. Must lie in
    /// [`MIN_SIMULATION_TIMESTEP`, [`MAX_SIMULATION_TIMESTEP`]].
    pub dt_max: f64,
    /// Iteration cap for `simulate`. Non-positive means unbounded.
    pub iter_max: i32,
    /// Sensor update period \[s\]. Zero means continuous (every RHS call).
    pub sensors_update_period: f64,
    /// Controller update period \[s\]. Zero means continuous.
    pub controller_update_period: f64,
    /// Log every accepted internal integrator step instead of one snapshot
    /// per `step` call.
    pub log_internal_stepper_steps: bool,
}

impl Default for StepperOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            random_seed: 0,
            ode_solver: "runge_kutta_dopri5".to_string(),
            tol_abs: 1e-5,
            tol_rel: 1e-4,
            dt_max: 1e-3,
            iter_max: 100_000,
            sensors_update_period: 0.0,
            controller_update_period: 0.0,
            log_internal_stepper_steps: false,
        }
    }
}

/// World options: gravity and ground profile.
#[derive(Debug)]
pub struct WorldOptions {
    /// Spatial gravity \[linear 3; angular 3\]. The linear part drives the
    /// dynamics; defaults to `(0, 0, -9.81, 0, 0, 0)`.
    pub gravity: Vector6<f64>,
    /// Ground height/normal functor used by the contact model.
    pub ground_profile: GroundProfile,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            gravity: Vector6::new(0.0, 0.0, -9.81, 0.0, 0.0, 0.0),
            ground_profile: GroundProfile::flat(),
        }
    }
}

/// Joint limit spring options.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointOptions {
    /// Stiffness of the position-limit spring \[N·m/rad\].
    pub bound_stiffness: f64,
    /// Damping of the position/velocity-limit spring \[N·m·s/rad\].
    pub bound_damping: f64,
    /// Width of the tanh blend at the limit boundary \[rad\]. Must be >= 0;
    /// zero disables blending.
    pub bound_transition_eps: f64,
}

impl Default for JointOptions {
    fn default() -> Self {
        Self {
            bound_stiffness: 1e5,
            bound_damping: 1e4,
            bound_transition_eps: 1e-2, // about 0.55 degrees
        }
    }
}

/// Ground contact reaction options.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactOptions {
    /// Viscous friction coefficient (high tangential speed regime).
    pub friction_viscous: f64,
    /// Dry friction coefficient (low tangential speed regime).
    pub friction_dry: f64,
    /// Tangential speed scale of the dry-friction ramp \[m/s\]. Must be >= 0.
    pub dry_friction_vel_eps: f64,
    /// Normal spring stiffness \[N/m\].
    pub stiffness: f64,
    /// Normal damping \[N·s/m\], active only while penetrating further.
    pub damping: f64,
    /// Depth scale of the tanh contact/no-contact blend \[m\]. Must be >= 0;
    /// zero disables blending.
    pub transition_eps: f64,
}

impl Default for ContactOptions {
    fn default() -> Self {
        Self {
            friction_viscous: 0.8,
            friction_dry: 1.0,
            dry_friction_vel_eps: 1e-2,
            stiffness: 1e6,
            damping: 2e3,
            transition_eps: 1e-3,
        }
    }
}

/// Telemetry content toggles.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TelemetryOptions {
    /// Log the configuration vector `q`.
    pub enable_configuration: bool,
    /// Log the velocity vector `v`.
    pub enable_velocity: bool,
    /// Log the acceleration vector `v̇`.
    pub enable_acceleration: bool,
    /// Log per-motor torques.
    pub enable_torque: bool,
    /// Log the total (kinetic + potential) energy scalar.
    pub enable_energy: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            enable_configuration: true,
            enable_velocity: true,
            enable_acceleration: true,
            enable_torque: true,
            enable_energy: true,
        }
    }
}

/// Complete engine option set.
#[derive(Debug, Default)]
pub struct EngineOptions {
    /// Telemetry content toggles.
    pub telemetry: TelemetryOptions,
    /// Integration-loop options.
    pub stepper: StepperOptions,
    /// Gravity and ground profile.
    pub world: WorldOptions,
    /// Joint limit spring options.
    pub joints: JointOptions,
    /// Ground contact reaction options.
    pub contacts: ContactOptions,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_documented_ranges() {
        let opts = EngineOptions::default();
        assert!(opts.stepper.dt_max >= MIN_SIMULATION_TIMESTEP);
        assert!(opts.stepper.dt_max <= MAX_SIMULATION_TIMESTEP);
        assert_eq!(opts.stepper.ode_solver, "runge_kutta_dopri5");
        assert!(opts.contacts.dry_friction_vel_eps >= 0.0);
        assert!(opts.joints.bound_transition_eps >= 0.0);
        assert_eq!(opts.world.gravity[2], -9.81);
    }

    #[test]
    fn flat_ground_profile() {
        let ground = GroundProfile::flat();
        let (z, n) = ground.query(&Vector3::new(3.0, -1.0, 0.5));
        assert_eq!(z, 0.0);
        assert_eq!(n, Vector3::new(0.0, 0.0, 1.0));
    }
}
