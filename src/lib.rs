//! Deterministic rigid-multibody simulation engine for articulated robots.
//!
//! Given a model (kinematic tree, motors, sensors, flexible elements), a
//! user-provided controller, and an initial state, the engine integrates
//! Newton-Euler dynamics forward in time while sampling sensors and commands
//! at configurable discrete periods, applying ground-contact reactions, joint
//! limits, flexibilities, and user-scheduled external forces, and emitting a
//! timestamped trace of the trajectory to a binary log.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Model                               │
//! │  Static: kinematic tree, joints, motors, contact frames     │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │  initialize() → start(x0) → step()/simulate() → stop()      │
//! │  Adaptive DoPri5 / explicit Euler over x = [q; v], with     │
//! │  exact arrival at sensor/controller/impulse/log breakpoints │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The continuous state is `x = [q; v]` where `q` uses unit-quaternion
//! parameterization for free-flyer and spherical joints. The integrator works
//! on a Euclidean vector; `q̇` is the configuration-manifold derivative and
//! quaternion slices are renormalized after every accepted step.
//!
//! # Quick Start
//!
//! ```ignore
//! use sim_engine::{Engine, Model, FunctorController};
//! use nalgebra::DVector;
//!
//! let model = Model::n_link_pendulum(2, 1.0, 1.0);
//! let controller = FunctorController::passive();
//! let mut engine = Engine::new();
//! engine.initialize(model, Box::new(controller), Box::new(|_, _| true))?;
//!
//! let x0 = DVector::zeros(engine.model()?.nx());
//! engine.simulate(3.0, &x0)?;
//!
//! let (header, log) = engine.get_log_data()?;
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,       // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,           // mul_add style changes aren't always clearer
    clippy::too_many_lines,             // Physics functions naturally have many steps
    clippy::doc_markdown,               // Not all technical terms need backticks
    clippy::option_if_let_else          // if-let is often more readable than map_or_else
)]

pub mod contact;
pub mod controller;
pub mod dynamics;
pub mod engine;
pub mod forces;
pub mod motor;
pub mod ode;
pub mod random;
pub mod sensor;
pub mod state;
pub mod telemetry;
pub mod types;

pub use contact::compute_contact_force;
pub use controller::{Controller, FunctorController};
pub use engine::{CallbackFn, Engine};
pub use forces::{ForceFunctor, ForceImpulse, ForceProfile};
pub use motor::{MotorOptions, SimpleMotor};
pub use ode::{OdeStepper, StepOutcome};
pub use sensor::{ContactForceSensor, EncoderSensor, Sensor};
pub use state::StepperState;
pub use telemetry::{TelemetryData, TelemetryRecorder, START_COLUMNS, START_DATA};
pub use types::data::Data;
pub use types::enums::JointType;
pub use types::error::EngineError;
pub use types::model::Model;
pub use types::options::{
    ContactOptions, EngineOptions, GroundProfile, JointOptions, StepperOptions, TelemetryOptions,
    WorldOptions, DEFAULT_SIMULATION_TIMESTEP, MAX_SIMULATION_TIMESTEP, MIN_SIMULATION_TIMESTEP,
    MIN_STEPPER_TIMESTEP,
};
