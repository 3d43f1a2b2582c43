//! Recursive Newton-Euler: nonlinear bias forces.
//!
//! Computes `qfrc_bias = C(q, v)·v + G(q)` for the equation of motion
//! `M·v̇ + qfrc_bias = u + qfrc_ext`. Gravity enters through the classical
//! base-acceleration trick: the world "accelerates" at `−g`, so the forward
//! pass produces the holding forces without a separate gravity loop.
//!
//! All spatial quantities are world-frame, referenced at the world origin,
//! so the backward accumulation is a plain sum.
//!
//! Reference: Featherstone, "Rigid Body Dynamics Algorithms", Chapter 5.

use nalgebra::DVector;

use crate::dynamics::spatial::{cross_force, cross_motion, SpatialVector};
use crate::types::data::Data;
use crate::types::model::Model;

/// Compute `data.qfrc_bias` from the current kinematics and `v`.
///
/// Requires fresh `cinert`, `cdof`, and `cvel`.
pub fn rne(model: &Model, data: &mut Data, v: &DVector<f64>) {
    data.qfrc_bias.fill(0.0);
    if model.nv == 0 {
        return;
    }

    // Forward pass: bias accelerations with the gravity trick.
    // a_bias[world] = [0; −g]; every body inherits it.
    let g = model.gravity;
    data.cacc_bias[0] = SpatialVector::new(0.0, 0.0, 0.0, -g.x, -g.y, -g.z);

    for body_id in 1..model.nbody {
        let parent_id = model.body_parent[body_id];
        let jnt_id = body_id - 1;
        let dof_adr = model.jnt_dof_adr[jnt_id];
        let nv = model.jnt_type[jnt_id].nv();

        // Joint velocity contribution S·q̇
        let mut v_joint = SpatialVector::zeros();
        for d in 0..nv {
            v_joint += data.cdof[dof_adr + d] * v[dof_adr + d];
        }

        // Velocity-product acceleration: v ×ₘ (S·q̇). Using the full body
        // velocity is equivalent to the parent velocity since
        // (S·q̇) ×ₘ (S·q̇) = 0.
        data.cacc_bias[body_id] =
            data.cacc_bias[parent_id] + cross_motion(data.cvel[body_id], v_joint);
    }

    // Per-body bias forces: f = I·a_bias + v ×* (I·v).
    for body_id in 1..model.nbody {
        let inertia = &data.cinert[body_id];
        let vel = data.cvel[body_id];
        let momentum = inertia * vel;
        data.cfrc_bias[body_id] = inertia * data.cacc_bias[body_id] + cross_force(vel, momentum);
    }
    data.cfrc_bias[0] = SpatialVector::zeros();

    // Backward pass: accumulate to parents (common reference point).
    for body_id in (1..model.nbody).rev() {
        let parent_id = model.body_parent[body_id];
        if parent_id != 0 {
            let child = data.cfrc_bias[body_id];
            data.cfrc_bias[parent_id] += child;
        }
    }

    // Project to joint space: τ[d] = cdof[d]ᵀ · f[body(d)].
    for dof in 0..model.nv {
        let body_id = model.jnt_body[model.dof_jnt[dof]];
        data.qfrc_bias[dof] = data.cdof[dof].dot(&data.cfrc_bias[body_id]);
    }
}
