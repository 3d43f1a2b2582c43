//! Rigid-body dynamics pipeline.
//!
//! All spatial quantities are expressed in the world frame and referenced at
//! the world origin, so motion/force compositions along the tree are plain
//! additions and the cross-product formulas are exact without reference-point
//! shifts.
//!
//! Pipeline order per evaluation: [`forward_kinematics`] →
//! [`forward_velocity`] → ([`crba`], [`rne`]) → forward-dynamics solve.

pub mod crba;
pub mod energy;
pub mod jacobian;
pub mod position;
pub mod rne;
pub mod spatial;
pub mod velocity;

pub use crba::crba;
pub use energy::{kinetic_energy, potential_energy};
pub use jacobian::{
    apply_force_at_point, configuration_derivative, differentiate_position, integrate_position,
    normalize_quaternions,
};
pub use position::forward_kinematics;
pub use rne::rne;
pub use spatial::{SpatialForce, SpatialVector};
pub use velocity::{forward_velocity, frame_linear_velocity};
