//! Per-run kinematic and dynamic scratch data.
//!
//! [`Data`] holds every quantity derived from `(q, v)` by the dynamics
//! pipeline: body poses, frame placements, spatial velocities, inertias,
//! the joint-space mass matrix, and force accumulators. All buffers are
//! pre-allocated by [`crate::Model::make_data`]; stepping never allocates.

use nalgebra::{DMatrix, DVector, Matrix6, UnitQuaternion, Vector3};

use crate::dynamics::spatial::SpatialVector;
use crate::types::model::Model;

/// Mutable scratch state of the dynamics pipeline.
///
/// # Key Invariant
///
/// `(q, v)` live in the engine's stepper state; everything here is COMPUTED
/// from them by forward kinematics and dynamics.
#[derive(Debug, Clone)]
#[allow(non_snake_case)] // qM is the conventional mass-matrix name
pub struct Data {
    // ==================== Body states (from FK) ====================
    /// Body positions in world frame (length `nbody`).
    pub xpos: Vec<Vector3<f64>>,
    /// Body orientations in world frame (length `nbody`).
    pub xquat: Vec<UnitQuaternion<f64>>,
    /// Body COM positions in world frame (length `nbody`).
    pub xipos: Vec<Vector3<f64>>,

    // Frame placements (for contacts, external forces, sensors)
    /// Frame positions in world frame (length `nframe`).
    pub frame_xpos: Vec<Vector3<f64>>,
    /// Frame orientations in world frame (length `nframe`).
    pub frame_xquat: Vec<UnitQuaternion<f64>>,

    // ==================== Velocities (from qvel) ====================
    /// Per-DoF motion subspace columns in world frame, referenced at the
    /// world origin (length `nv`).
    pub cdof: Vec<SpatialVector>,
    /// Body spatial velocities in world frame, referenced at the world
    /// origin: \[angular; linear\] (length `nbody`).
    pub cvel: Vec<SpatialVector>,

    // ==================== Inertias ====================
    /// Body spatial inertia in world frame about the world origin
    /// (length `nbody`).
    pub cinert: Vec<Matrix6<f64>>,
    /// Composite rigid-body inertia accumulated over subtrees
    /// (length `nbody`).
    pub crb_inertia: Vec<Matrix6<f64>>,

    // ==================== RNE intermediates ====================
    /// Velocity-product accelerations of the RNE forward pass.
    pub cacc_bias: Vec<SpatialVector>,
    /// Body bias forces of the RNE backward pass.
    pub cfrc_bias: Vec<SpatialVector>,

    // ==================== Generalized-force accumulators ====================
    /// Joint-space inertia matrix (`nv` × `nv`), rotor inertia included on
    /// motorized DoF diagonals.
    pub qM: DMatrix<f64>,
    /// Coriolis + centrifugal + gravity bias forces (length `nv`).
    pub qfrc_bias: DVector<f64>,
    /// External forces projected to joint space (length `nv`).
    pub qfrc_ext: DVector<f64>,

    // ==================== Contacts ====================
    /// World-frame reaction force at each contact frame, in declaration
    /// order. Refreshed by every external-force evaluation.
    pub contact_forces: Vec<Vector3<f64>>,
}

impl Data {
    /// Allocate scratch data sized for `model`.
    #[must_use]
    pub fn new(model: &Model) -> Self {
        let nbody = model.nbody;
        let nframe = model.frame_name.len();
        Self {
            xpos: vec![Vector3::zeros(); nbody],
            xquat: vec![UnitQuaternion::identity(); nbody],
            xipos: vec![Vector3::zeros(); nbody],
            frame_xpos: vec![Vector3::zeros(); nframe],
            frame_xquat: vec![UnitQuaternion::identity(); nframe],
            cdof: vec![SpatialVector::zeros(); model.nv],
            cvel: vec![SpatialVector::zeros(); nbody],
            cinert: vec![Matrix6::zeros(); nbody],
            crb_inertia: vec![Matrix6::zeros(); nbody],
            cacc_bias: vec![SpatialVector::zeros(); nbody],
            cfrc_bias: vec![SpatialVector::zeros(); nbody],
            qM: DMatrix::zeros(model.nv, model.nv),
            qfrc_bias: DVector::zeros(model.nv),
            qfrc_ext: DVector::zeros(model.nv),
            contact_forces: vec![Vector3::zeros(); model.contact_frames.len()],
        }
    }

}
