//! Simulation engine: lifecycle façade and step orchestrator.
//!
//! The engine binds a model, a controller, and a stop callback; `start`
//! locks the model and emits the `t = 0` snapshot, `step`/`simulate` drive
//! the integrator with exact arrival at every discrete breakpoint (sensor
//! and controller periods, impulse starts/ends, log instants), and `stop`
//! releases the lock and freezes the log.
//!
//! Time is accumulated with Kahan compensation across `step` calls so long
//! runs do not drift, and the final time of every `step` is snapped exactly
//! to the requested end point.

mod rhs;

use nalgebra::{DMatrix, DVector, Vector3};

use crate::controller::Controller;
use crate::forces::{ForceFunctor, ForceImpulse, ForceRegister};
use crate::ode::{OdeStepper, StepOutcome};
use crate::state::StepperState;
use crate::telemetry::{self, TelemetryData, TelemetryRecorder};
use crate::types::data::Data;
use crate::types::error::EngineError;
use crate::types::model::Model;
use crate::types::options::{
    EngineOptions, DEFAULT_SIMULATION_TIMESTEP, MAX_SIMULATION_TIMESTEP, MIN_SIMULATION_TIMESTEP,
    MIN_STEPPER_TIMESTEP,
};

/// Stop callback: `(t, x) → keep_running`.
pub type CallbackFn = Box<dyn FnMut(f64, &DVector<f64>) -> bool + Send>;

/// Consecutive integrator rejections tolerated before the step is declared
/// failed.
const MAX_FAILED_STEPS: u32 = 100;

/// Shortest admissible `simulate` duration \[s\].
const MIN_SIMULATION_DURATION: f64 = 5e-3;

const EPS: f64 = f64::EPSILON;

/// Telemetry value slots claimed by the engine at `start`.
#[derive(Debug, Default)]
struct TelemetrySlots {
    configuration: Option<usize>,
    velocity: Option<usize>,
    acceleration: Option<usize>,
    torque: Option<usize>,
    energy: Option<usize>,
    /// One slot per attached sensor, in attachment order.
    sensors: Vec<usize>,
}

/// Deterministic rigid-multibody simulation engine.
pub struct Engine {
    is_initialized: bool,
    is_telemetry_configured: bool,
    /// Exclusive model lock: held between `start` and `stop`.
    is_running: bool,

    model: Option<Model>,
    controller: Option<Box<dyn Controller>>,
    callback: CallbackFn,

    options: EngineOptions,
    /// `min` of the non-zero sensor/controller periods; zero in continuous
    /// mode.
    stepper_update_period: f64,

    telemetry_data: TelemetryData,
    telemetry_recorder: TelemetryRecorder,
    telemetry_slots: TelemetrySlots,

    stepper: OdeStepper,
    stepper_state: StepperState,
    stepper_state_last: StepperState,
    data: Data,
    forces: ForceRegister,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with default options, no model bound yet.
    #[must_use]
    pub fn new() -> Self {
        let options = EngineOptions::default();
        crate::random::reset_rand_generators(options.stepper.random_seed);
        let mut engine = Self {
            is_initialized: false,
            is_telemetry_configured: false,
            is_running: false,
            model: None,
            controller: None,
            callback: Box::new(|_, _| true),
            options: EngineOptions::default(),
            stepper_update_period: 0.0,
            telemetry_data: TelemetryData::new(),
            telemetry_recorder: TelemetryRecorder::default(),
            telemetry_slots: TelemetrySlots::default(),
            stepper: OdeStepper::dopri5(1e-5, 1e-4),
            stepper_state: StepperState::default(),
            stepper_state_last: StepperState::default(),
            data: Data::new(&Model::new("unbound")),
            forces: ForceRegister::default(),
        };
        // Default options always validate.
        let _ = engine.set_options(options);
        engine
    }

    /// Bind the model, the controller, and the stop callback.
    ///
    /// # Errors
    ///
    /// `InitFailed` when the model has no degree of freedom.
    pub fn initialize(
        &mut self,
        model: Model,
        controller: Box<dyn Controller>,
        callback: CallbackFn,
    ) -> Result<(), EngineError> {
        if model.nv == 0 {
            return Err(EngineError::init_failed(
                "the model has no degree of freedom",
            ));
        }

        self.data = model.make_data();
        let x0 = neutral_state(&model);
        self.stepper_state
            .initialize(&model, &x0, MIN_SIMULATION_TIMESTEP);
        self.stepper_state_last = self.stepper_state.clone();

        self.model = Some(model);
        self.controller = Some(controller);
        self.callback = callback;
        self.is_initialized = true;
        Ok(())
    }

    /// Replace the engine options.
    ///
    /// All values are validated before anything is stored; on error the
    /// previous options remain untouched.
    ///
    /// # Errors
    ///
    /// `Generic` while a simulation is running; `BadInput` for out-of-range
    /// values, an unknown ODE solver, or incompatible update periods.
    pub fn set_options(&mut self, options: EngineOptions) -> Result<(), EngineError> {
        if self.is_running {
            return Err(EngineError::generic(
                "a simulation is running, stop it before updating the options",
            ));
        }

        let stepper = &options.stepper;
        if !(MIN_SIMULATION_TIMESTEP..=MAX_SIMULATION_TIMESTEP).contains(&stepper.dt_max) {
            return Err(EngineError::bad_input(format!(
                "'dt_max' must lie in [{MIN_SIMULATION_TIMESTEP}, {MAX_SIMULATION_TIMESTEP}]"
            )));
        }
        if stepper.ode_solver != "runge_kutta_dopri5" && stepper.ode_solver != "explicit_euler" {
            return Err(EngineError::bad_input(format!(
                "unknown ODE solver '{}'",
                stepper.ode_solver
            )));
        }

        let sensors_period = stepper.sensors_update_period;
        let controller_period = stepper.controller_update_period;
        if (sensors_period > EPS && sensors_period < MIN_SIMULATION_TIMESTEP)
            || (controller_period > EPS && controller_period < MIN_SIMULATION_TIMESTEP)
        {
            return Err(EngineError::bad_input(format!(
                "discrete update periods cannot be smaller than {MIN_SIMULATION_TIMESTEP} s; \
                 increase the period or set it to zero for continuous mode"
            )));
        }
        // If both periods are active they must divide one another (to EPS).
        // fmod yields values in [0, b); divisibility within tolerance means
        // the remainder lies in [0, EPS] ∪ [b − EPS, b).
        if sensors_period > EPS && controller_period > EPS {
            let divides = |a: f64, b: f64| {
                let rem = a % b;
                rem.min(b - rem) <= EPS
            };
            if !divides(controller_period, sensors_period)
                && !divides(sensors_period, controller_period)
            {
                return Err(EngineError::bad_input(
                    "in discrete mode the sensor and controller update periods must be \
                     multiples of one another",
                ));
            }
        }

        if options.contacts.dry_friction_vel_eps < 0.0 {
            return Err(EngineError::bad_input(
                "'dry_friction_vel_eps' must be positive",
            ));
        }
        if options.contacts.transition_eps < 0.0 {
            return Err(EngineError::bad_input("'transition_eps' must be positive"));
        }
        if options.joints.bound_transition_eps < 0.0 {
            return Err(EngineError::bad_input(
                "'bound_transition_eps' must be positive",
            ));
        }

        // Breakpoint period of the integration loop
        self.stepper_update_period = if sensors_period < MIN_SIMULATION_TIMESTEP {
            controller_period
        } else if controller_period < MIN_SIMULATION_TIMESTEP {
            sensors_period
        } else {
            sensors_period.min(controller_period)
        };

        self.options = options;
        Ok(())
    }

    /// Current options.
    #[must_use]
    pub fn get_options(&self) -> &EngineOptions {
        &self.options
    }

    /// Whether `initialize` has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    /// Whether a simulation is running (model locked).
    #[must_use]
    pub fn is_simulation_running(&self) -> bool {
        self.is_running
    }

    /// Whether the telemetry name set is configured (between `start` and
    /// `stop`).
    #[must_use]
    pub fn is_telemetry_configured(&self) -> bool {
        self.is_telemetry_configured
    }

    /// Shared access to the bound model.
    ///
    /// # Errors
    ///
    /// `InitFailed` before `initialize`.
    pub fn model(&self) -> Result<&Model, EngineError> {
        self.model
            .as_ref()
            .ok_or_else(|| EngineError::init_failed("the engine is not initialized"))
    }

    /// Exclusive access to the bound model, for structural changes (motors,
    /// sensors, frames).
    ///
    /// # Errors
    ///
    /// `Generic` while a simulation is running (the engine holds the model
    /// lock); `InitFailed` before `initialize`.
    pub fn model_mut(&mut self) -> Result<&mut Model, EngineError> {
        if self.is_running {
            return Err(EngineError::generic(
                "a simulation is running, stop it before mutating the model",
            ));
        }
        self.model
            .as_mut()
            .ok_or_else(|| EngineError::init_failed("the engine is not initialized"))
    }

    /// Current stepper state.
    #[must_use]
    pub fn stepper_state(&self) -> &StepperState {
        &self.stepper_state
    }

    /// World-frame reaction force at each contact frame, in declaration
    /// order.
    #[must_use]
    pub fn contact_forces(&self) -> &[Vector3<f64>] {
        &self.data.contact_forces
    }

    /// Reset the engine, the model, and the controller.
    ///
    /// Made to be called between simulations: it always calls `stop`;
    /// optionally it re-seeds the random generators and clears the
    /// registered external forces.
    pub fn reset(&mut self, reset_random_numbers: bool, reset_dynamic_force_register: bool) {
        if reset_dynamic_force_register {
            self.forces.clear();
        }
        if reset_random_numbers {
            crate::random::reset_rand_generators(self.options.stepper.random_seed);
        }
        if let Some(model) = self.model.as_mut() {
            model.reset();
        }
        if let Some(controller) = self.controller.as_mut() {
            controller.reset();
        }
        self.stop();
    }

    /// Start a simulation from `x0`: lock the model, configure telemetry,
    /// and log the initial state.
    ///
    /// # Errors
    ///
    /// `InitFailed` before `initialize`; `BadInput` for a state of the wrong
    /// size or an unresolvable force frame.
    pub fn start(&mut self, x0: &DVector<f64>) -> Result<(), EngineError> {
        if !self.is_initialized {
            return Err(EngineError::init_failed("the engine is not initialized"));
        }
        {
            let Some(model) = self.model.as_ref() else {
                return Err(EngineError::init_failed("the engine is not initialized"));
            };
            if x0.len() != model.nx() {
                return Err(EngineError::bad_input(format!(
                    "size of the initial state ({}) inconsistent with the model ({})",
                    x0.len(),
                    model.nx()
                )));
            }
        }

        // Reset model/controller state and make sure nothing is running.
        self.reset(false, false);

        // Resolve force frames before locking.
        {
            let Some(model) = self.model.as_ref() else {
                return Err(EngineError::init_failed("the engine is not initialized"));
            };
            for impulse in &mut self.forces.impulses {
                impulse.frame_idx = model.frame_id(&impulse.frame_name)?;
            }
            for profile in &mut self.forces.profiles {
                profile.frame_idx = model.frame_id(&profile.frame_name)?;
            }
        }
        self.forces.rewind();

        // Lock the model: no structural mutation until `stop`.
        self.is_running = true;

        // Propagate world options and rebuild the per-run buffers.
        let dt0;
        {
            let Some(model) = self.model.as_mut() else {
                return Err(EngineError::init_failed("the engine is not initialized"));
            };
            model.gravity =
                Vector3::new(self.options.world.gravity[0], self.options.world.gravity[1], self.options.world.gravity[2]);
            self.data = model.make_data();

            dt0 = if self.stepper_update_period > MIN_SIMULATION_TIMESTEP {
                self.stepper_update_period
            } else {
                self.options.stepper.dt_max
            };
        }

        self.stepper = match self.options.stepper.ode_solver.as_str() {
            "explicit_euler" => OdeStepper::explicit_euler(),
            _ => OdeStepper::dopri5(self.options.stepper.tol_abs, self.options.stepper.tol_rel),
        };

        {
            let Some(model) = self.model.as_ref() else {
                return Err(EngineError::init_failed("the engine is not initialized"));
            };
            self.stepper_state.initialize(model, x0, dt0);
        }

        // Evaluate the full dynamics once so the initial snapshot carries
        // consistent sensors, command, torques, and acceleration.
        self.evaluate_initial_dynamics();

        // Freeze the telemetry name set and log the initial state.
        self.configure_telemetry()?;
        self.telemetry_recorder.initialize(&mut self.telemetry_data);
        self.update_telemetry();

        self.stepper_state_last = self.stepper_state.clone();
        Ok(())
    }

    /// Stop the simulation: release the model lock and freeze telemetry.
    ///
    /// The recorded log stays readable until the next `start`.
    pub fn stop(&mut self) {
        if self.is_running {
            self.is_running = false;
            // The recorder keeps its rows: clearing happens at the next
            // initialize, so the log remains accessible.
            self.telemetry_recorder.reset();
            self.telemetry_data.reset();
            self.telemetry_slots = TelemetrySlots::default();
            self.is_telemetry_configured = false;
        }
    }

    /// Integrate the system from the current state for `step_size` seconds.
    ///
    /// Only the endpoint is logged (unless `log_internal_stepper_steps`);
    /// the integrator may take any number of internal steps, stopping
    /// exactly at every discrete breakpoint. A negative `step_size` requests
    /// the default: the controller period, else the sensor period, else
    /// `dt_max`.
    ///
    /// # Errors
    ///
    /// `Generic` when no simulation is running, on NaN in the state, or on
    /// low-level solver exhaustion; `BadInput` for a step size in
    /// `(EPS, MIN_SIMULATION_TIMESTEP)`.
    pub fn step(&mut self, step_size: f64) -> Result<(), EngineError> {
        if !self.is_running {
            return Err(EngineError::generic(
                "no simulation running, start it before calling step",
            ));
        }
        if !self.is_initialized {
            return Err(EngineError::init_failed("the engine is not initialized"));
        }
        if self.stepper_state.x.iter().any(|v| v.is_nan()) {
            return Err(EngineError::generic(
                "the low-level ODE solver failed, consider increasing the accuracy",
            ));
        }
        if step_size > EPS && step_size < MIN_SIMULATION_TIMESTEP {
            return Err(EngineError::bad_input("the step size is out of bounds"));
        }

        // Default step size: controller period, else sensor period, else dt_max.
        let mut step_size = step_size;
        if step_size < EPS {
            let stepper = &self.options.stepper;
            step_size = if stepper.controller_update_period > EPS {
                stepper.controller_update_period
            } else if stepper.sensors_update_period > EPS {
                stepper.sensors_update_period
            } else {
                stepper.dt_max
            };
        }

        // Kahan-compensated accumulation of the end time: the rounding error
        // of each step is carried over so it cannot grow unbounded.
        let step_size_true = step_size - self.stepper_state.t_err;
        let t_end = self.stepper_state.t + step_size_true;
        self.stepper_state.t_err = (t_end - self.stepper_state.t) - step_size_true;

        // Local copies driven by the integrator; committed on acceptance.
        let mut t = self.stepper_state.t;
        let mut dt = self.stepper_state.dt;
        let mut x = self.stepper_state.x.clone();
        let mut dxdt = self.stepper_state.dxdt.clone();

        let mut stepper = std::mem::replace(&mut self.stepper, OdeStepper::explicit_euler());
        let is_adaptive = matches!(stepper, OdeStepper::RungeKuttaDopri5(_));
        let mut fail_count: u32 = 0;
        let mut result = Ok(());

        'integration: while t_end - t > EPS {
            let mut t_next = t;

            // (a) Period-based sampling: refresh sensors/controller when the
            // current time sits on (or vanishingly close to) a period
            // boundary. In that case the previous loop iteration stopped
            // exactly there.
            if self.stepper_update_period > MIN_SIMULATION_TIMESTEP {
                let sensors_period = self.options.stepper.sensors_update_period;
                if sensors_period > EPS {
                    let dt_next = sensors_period - t % sensors_period;
                    if dt_next < MIN_SIMULATION_TIMESTEP
                        || sensors_period - dt_next < MIN_SIMULATION_TIMESTEP
                    {
                        self.refresh_sensors(t);
                    }
                }

                let controller_period = self.options.stepper.controller_update_period;
                if controller_period > EPS {
                    let dt_next = controller_period - t % controller_period;
                    if dt_next < MIN_SIMULATION_TIMESTEP
                        || controller_period - dt_next < MIN_SIMULATION_TIMESTEP
                    {
                        self.refresh_command(t);
                        // The dynamics changed: refresh the cached derivative
                        // the adaptive stepper chains from. The fixed Euler
                        // stepper re-evaluates it in-step anyway.
                        if is_adaptive {
                            self.compute_system_dynamics(t, &x, &mut dxdt);
                        }
                    }
                }
            }

            // (b) Next impulse breakpoint. A breakpoint at or before the
            // current time needs no stop (overlapping registrations).
            let t_force_impulse_next = match self.forces.next_breakpoint(t) {
                Some(tf) if tf > t => tf,
                _ => t_end,
            };

            // Recover instantly from a breakpoint-shrunk timestep.
            dt = dt.max(DEFAULT_SIMULATION_TIMESTEP);

            if self.stepper_update_period > EPS {
                // (c) Offset to the next update-period boundary; when we are
                // already sitting on one (sub-resolution offset), jump a full
                // period — the sampling above has anticipated it.
                let dt_next_update =
                    self.stepper_update_period - t % self.stepper_update_period;
                let mut dt_next_global = if dt_next_update < MIN_SIMULATION_TIMESTEP {
                    (dt_next_update + self.stepper_update_period)
                        .min(t_force_impulse_next - t)
                } else {
                    dt_next_update.min(t_force_impulse_next - t)
                };
                if t_end - t - EPS < dt_next_global {
                    dt_next_global = t_end - t;
                }
                t_next += dt_next_global;

                // (d) Integrate to the breakpoint, accepting or retrying.
                while t_next - t > EPS {
                    dt = dt.min(t_next - t).min(self.options.stepper.dt_max);
                    if t_next - (t + dt) < MIN_STEPPER_TIMESTEP {
                        dt = t_next - t;
                    }

                    let outcome = stepper.try_step(
                        |x_in: &DVector<f64>, dxdt_out: &mut DVector<f64>, t_in: f64| {
                            self.compute_system_dynamics(t_in, x_in, dxdt_out);
                        },
                        &mut x,
                        &mut dxdt,
                        &mut t,
                        &mut dt,
                    );
                    match outcome {
                        StepOutcome::Accepted => {
                            fail_count = 0;
                            self.commit_step(t, dt, &mut x, &dxdt);
                        }
                        StepOutcome::Rejected => {
                            fail_count += 1;
                            if fail_count > MAX_FAILED_STEPS {
                                result = Err(EngineError::generic(
                                    "the low-level ODE solver failed, consider increasing \
                                     the accuracy",
                                ));
                                break 'integration;
                            }
                        }
                    }
                }
            } else {
                // (e) Free-running mode: no periodic breakpoint, stop only at
                // the horizon, impulse events, and dt_max.
                dt = dt
                    .min(self.options.stepper.dt_max)
                    .min(t_end - t)
                    .min(t_force_impulse_next - t);

                loop {
                    let outcome = stepper.try_step(
                        |x_in: &DVector<f64>, dxdt_out: &mut DVector<f64>, t_in: f64| {
                            self.compute_system_dynamics(t_in, x_in, dxdt_out);
                        },
                        &mut x,
                        &mut dxdt,
                        &mut t,
                        &mut dt,
                    );
                    match outcome {
                        StepOutcome::Accepted => {
                            fail_count = 0;
                            self.commit_step(t, dt, &mut x, &dxdt);
                            break;
                        }
                        StepOutcome::Rejected => {
                            fail_count += 1;
                            if fail_count > MAX_FAILED_STEPS {
                                result = Err(EngineError::generic(
                                    "the low-level ODE solver failed, consider increasing \
                                     the accuracy",
                                ));
                                break 'integration;
                            }
                        }
                    }
                }
            }
        }

        self.stepper = stepper;
        self.stepper_state.dt = dt;

        if result.is_ok() {
            // Snap the final time exactly to the requested end point; the
            // Kahan carry above accounts for the rounding.
            self.stepper_state.t = t_end;
            if !self.options.stepper.log_internal_stepper_steps {
                self.update_telemetry();
            }
        }
        result
    }

    /// Commit an accepted integrator step: synchronize the stepper state,
    /// renormalize quaternions, log if requested, and shadow the state.
    fn commit_step(&mut self, t: f64, dt: f64, x: &mut DVector<f64>, dxdt: &DVector<f64>) {
        if let Some(model) = self.model.as_ref() {
            let mut q = x.rows(0, model.nq).into_owned();
            crate::dynamics::normalize_quaternions(model, &mut q);
            x.rows_mut(0, model.nq).copy_from(&q);
        }

        self.stepper_state.t = t;
        self.stepper_state.dt = dt;
        self.stepper_state.x.copy_from(x);
        self.stepper_state.dxdt.copy_from(dxdt);
        self.stepper_state.iter += 1;

        if self.options.stepper.log_internal_stepper_steps {
            self.update_telemetry();
        }

        // Shadow copy: the dynamics reads the last-accepted acceleration and
        // motor torques when sampling at infinite frequency.
        self.stepper_state_last = self.stepper_state.clone();
    }

    /// Run a full simulation of duration `t_end` starting from `x0`.
    ///
    /// Advances by one update period (or `dt_max`) per `step` until the end
    /// time is reached, the callback returns false, or the iteration cap is
    /// hit — all benign exits. The model lock is released on return, even on
    /// error.
    ///
    /// # Errors
    ///
    /// `InitFailed` before `initialize`; `BadInput` for durations shorter
    /// than 5 ms; any `step` failure is propagated after `stop`.
    pub fn simulate(&mut self, t_end: f64, x0: &DVector<f64>) -> Result<(), EngineError> {
        if !self.is_initialized {
            return Err(EngineError::init_failed(
                "engine not initialized, impossible to run the simulation",
            ));
        }
        if t_end < MIN_SIMULATION_DURATION {
            return Err(EngineError::bad_input(
                "the duration of the simulation cannot be shorter than 5 ms",
            ));
        }

        let mut result = self.start(x0);

        while result.is_ok() {
            if t_end - self.stepper_state.t < MIN_SIMULATION_TIMESTEP {
                if self.options.stepper.verbose {
                    tracing::debug!("simulation done: desired final time reached");
                }
                break;
            }
            if !(self.callback)(self.stepper_state.t, &self.stepper_state.x) {
                if self.options.stepper.verbose {
                    tracing::debug!("simulation done: callback returned false");
                }
                break;
            }
            let iter_max = self.options.stepper.iter_max;
            if iter_max > 0 && self.stepper_state_last.iter >= iter_max as u32 {
                if self.options.stepper.verbose {
                    tracing::debug!("simulation done: maximum number of integration steps exceeded");
                }
                break;
            }

            let step_size = if self.stepper_update_period > 0.0 {
                self.stepper_update_period.min(t_end - self.stepper_state.t)
            } else {
                self.options.stepper.dt_max.min(t_end - self.stepper_state.t)
            };
            result = self.step(step_size);
        }

        // Release the model lock; new variables and forces can be
        // registered again.
        self.stop();
        result
    }

    /// Schedule a constant world-frame force on `frame_name` over
    /// `[t, t + dt]`.
    ///
    /// A second impulse registered at the same start time replaces the
    /// first.
    ///
    /// # Errors
    ///
    /// `Generic` while a simulation is running.
    pub fn register_force_impulse(
        &mut self,
        frame_name: &str,
        t: f64,
        dt: f64,
        force: Vector3<f64>,
    ) -> Result<(), EngineError> {
        if self.is_running {
            return Err(EngineError::generic(
                "a simulation is running, stop it before registering new forces",
            ));
        }
        self.forces.add_impulse(ForceImpulse {
            frame_name: frame_name.to_string(),
            frame_idx: usize::MAX,
            t,
            dt,
            force,
        });
        Ok(())
    }

    /// Register a permanently-active force functor on `frame_name`.
    ///
    /// # Errors
    ///
    /// `Generic` while a simulation is running.
    pub fn register_force_profile(
        &mut self,
        frame_name: &str,
        functor: ForceFunctor,
    ) -> Result<(), EngineError> {
        if self.is_running {
            return Err(EngineError::generic(
                "a simulation is running, stop it before registering new forces",
            ));
        }
        self.forces.add_profile(frame_name.to_string(), functor);
        Ok(())
    }

    /// Header and data matrix of the recorded log.
    #[must_use]
    pub fn get_log_data(&self) -> (Vec<String>, DMatrix<f64>) {
        self.telemetry_recorder.get_log_data()
    }

    /// Write the recorded log as CSV.
    ///
    /// # Errors
    ///
    /// `BadInput` when the file cannot be written.
    pub fn write_log_txt(&self, path: impl AsRef<std::path::Path>) -> Result<(), EngineError> {
        self.telemetry_recorder.write_log_txt(path)
    }

    /// Write the recorded log in the binary format.
    ///
    /// # Errors
    ///
    /// `BadInput` when the file cannot be written.
    pub fn write_log_binary(&self, path: impl AsRef<std::path::Path>) -> Result<(), EngineError> {
        self.telemetry_recorder.write_log_binary(path)
    }

    /// Parse a binary log file back into a header and data matrix.
    ///
    /// # Errors
    ///
    /// `BadInput` when the file cannot be opened or is corrupted.
    pub fn parse_log_binary(
        path: impl AsRef<std::path::Path>,
    ) -> Result<(Vec<String>, DMatrix<f64>), EngineError> {
        telemetry::parse_log_binary(path)
    }

    /// Extract one column of a parsed log by field name.
    #[must_use]
    pub fn get_log_field_value(
        field_name: &str,
        header: &[String],
        log_data: &DMatrix<f64>,
    ) -> DVector<f64> {
        telemetry::get_log_field_value(field_name, header, log_data)
    }
}

/// Neutral state `[q_neutral; 0]` of a model.
fn neutral_state(model: &Model) -> DVector<f64> {
    let mut x = DVector::zeros(model.nx());
    x.rows_mut(0, model.nq)
        .copy_from(&model.neutral_configuration());
    x
}
