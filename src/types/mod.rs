//! Type-level vocabulary of the engine: joint types, errors, options,
//! the static model description, and the per-run kinematic scratch data.

pub mod data;
pub mod enums;
pub mod error;
pub mod model;
pub mod options;

pub use data::Data;
pub use enums::JointType;
pub use error::EngineError;
pub use model::Model;
pub use options::{
    ContactOptions, EngineOptions, GroundProfile, JointOptions, StepperOptions, TelemetryOptions,
    WorldOptions,
};
