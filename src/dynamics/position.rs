//! Position-stage forward kinematics.
//!
//! Computes body poses, COM positions, frame placements, per-DoF motion
//! subspace columns, and world-referenced spatial inertias from `q`.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::dynamics::spatial::{body_spatial_inertia, SpatialVector};
use crate::types::data::Data;
use crate::types::enums::JointType;
use crate::types::model::Model;

/// Forward kinematics: body poses, frames, motion subspace, inertias.
///
/// Traverses the kinematic tree from root to leaves (bodies are stored in
/// topological order: parent before child).
pub fn forward_kinematics(model: &Model, data: &mut Data, q: &nalgebra::DVector<f64>) {
    data.xpos[0] = Vector3::zeros();
    data.xquat[0] = UnitQuaternion::identity();

    for body_id in 1..model.nbody {
        let parent_id = model.body_parent[body_id];
        let jnt_id = body_id - 1;
        let qpos_adr = model.jnt_qpos_adr[jnt_id];

        // Parent frame + fixed body offset
        let mut pos = data.xpos[parent_id];
        let mut quat = data.xquat[parent_id];
        pos += quat * model.body_pos[body_id];
        quat *= model.body_quat[body_id];

        match model.jnt_type[jnt_id] {
            JointType::Hinge => {
                let angle = q[qpos_adr];
                let anchor = pos + quat * model.jnt_pos[jnt_id];
                let axis = quat * model.jnt_axis[jnt_id];
                let rot = if let Some(unit_axis) = nalgebra::Unit::try_new(axis, 1e-10) {
                    UnitQuaternion::from_axis_angle(&unit_axis, angle)
                } else {
                    UnitQuaternion::identity()
                };
                quat = rot * quat;
                pos = anchor + rot * (pos - anchor);
            }
            JointType::Slide => {
                let displacement = q[qpos_adr];
                pos += quat * (model.jnt_axis[jnt_id] * displacement);
            }
            JointType::Ball => {
                let jq = UnitQuaternion::from_quaternion(Quaternion::new(
                    q[qpos_adr],
                    q[qpos_adr + 1],
                    q[qpos_adr + 2],
                    q[qpos_adr + 3],
                ));
                quat *= jq;
            }
            JointType::Free => {
                pos = Vector3::new(q[qpos_adr], q[qpos_adr + 1], q[qpos_adr + 2]);
                quat = UnitQuaternion::from_quaternion(Quaternion::new(
                    q[qpos_adr + 3],
                    q[qpos_adr + 4],
                    q[qpos_adr + 5],
                    q[qpos_adr + 6],
                ));
            }
        }

        data.xpos[body_id] = pos;
        data.xquat[body_id] = quat;
        data.xipos[body_id] = pos + quat * model.body_ipos[body_id];

        // Spatial inertia in world frame about the world origin
        data.cinert[body_id] = body_spatial_inertia(
            model.body_mass[body_id],
            model.body_inertia[body_id],
            quat.to_rotation_matrix().matrix(),
            data.xipos[body_id],
        );
    }
    data.cinert[0].fill(0.0);

    // Frame placements
    for frame_id in 0..model.frame_name.len() {
        let body_id = model.frame_body[frame_id];
        data.frame_xpos[frame_id] = data.xpos[body_id] + data.xquat[body_id] * model.frame_pos[frame_id];
        data.frame_xquat[frame_id] = data.xquat[body_id] * model.frame_quat[frame_id];
    }

    // Per-DoF motion subspace columns, world frame, referenced at the origin.
    compute_motion_subspace(model, data);
}

/// Fill `data.cdof` with the world-frame motion subspace column of each DoF.
///
/// Reference point is the world origin, so a rotational DoF with world axis
/// `u` through anchor `a` contributes `[u; u × (0 − a)]`.
fn compute_motion_subspace(model: &Model, data: &mut Data) {
    for jnt_id in 0..model.njnt {
        let body_id = model.jnt_body[jnt_id];
        let dof_adr = model.jnt_dof_adr[jnt_id];
        let quat = data.xquat[body_id];

        match model.jnt_type[jnt_id] {
            JointType::Hinge => {
                let axis = quat * model.jnt_axis[jnt_id];
                let anchor = data.xpos[body_id] + quat * model.jnt_pos[jnt_id];
                let lin = axis.cross(&(-anchor));
                data.cdof[dof_adr] =
                    SpatialVector::new(axis.x, axis.y, axis.z, lin.x, lin.y, lin.z);
            }
            JointType::Slide => {
                let axis = quat * model.jnt_axis[jnt_id];
                data.cdof[dof_adr] = SpatialVector::new(0.0, 0.0, 0.0, axis.x, axis.y, axis.z);
            }
            JointType::Ball => {
                let anchor = data.xpos[body_id] + quat * model.jnt_pos[jnt_id];
                let rot = quat.to_rotation_matrix();
                for i in 0..3 {
                    // Angular velocity is expressed in body frame
                    let axis = rot * Vector3::ith(i, 1.0);
                    let lin = axis.cross(&(-anchor));
                    data.cdof[dof_adr + i] =
                        SpatialVector::new(axis.x, axis.y, axis.z, lin.x, lin.y, lin.z);
                }
            }
            JointType::Free => {
                // Translational DoFs: world axes
                for i in 0..3 {
                    let mut col = SpatialVector::zeros();
                    col[3 + i] = 1.0;
                    data.cdof[dof_adr + i] = col;
                }
                // Rotational DoFs: body axes about the body origin
                let anchor = data.xpos[body_id];
                let rot = quat.to_rotation_matrix();
                for i in 0..3 {
                    let axis = rot * Vector3::ith(i, 1.0);
                    let lin = axis.cross(&(-anchor));
                    data.cdof[dof_adr + 3 + i] =
                        SpatialVector::new(axis.x, axis.y, axis.z, lin.x, lin.y, lin.z);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn pendulum_hangs_down_at_zero() {
        let model = Model::n_link_pendulum(2, 1.0, 1.0);
        let mut data = model.make_data();
        let q = model.neutral_configuration();
        forward_kinematics(&model, &mut data, &q);
        // Link frames at the pivots, COMs one length below
        assert_relative_eq!(data.xpos[1].z, 0.0, epsilon = 1e-12);
        assert_relative_eq!(data.xipos[1].z, -1.0, epsilon = 1e-12);
        assert_relative_eq!(data.xpos[2].z, -1.0, epsilon = 1e-12);
        assert_relative_eq!(data.xipos[2].z, -2.0, epsilon = 1e-12);
    }

    #[test]
    fn pendulum_horizontal_at_right_angle() {
        let model = Model::n_link_pendulum(1, 1.0, 1.0);
        let mut data = model.make_data();
        let mut q = model.neutral_configuration();
        q[0] = FRAC_PI_2; // rotate about +Y: -Z goes to -X... sign check below
        forward_kinematics(&model, &mut data, &q);
        // Rotation of +π/2 about +Y maps -Z onto -X.
        assert_relative_eq!(data.xipos[1].x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(data.xipos[1].z, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn free_body_tracks_configuration() {
        let model = Model::free_body("ball", 1.0, Vector3::new(0.1, 0.1, 0.1));
        let mut data = model.make_data();
        let mut q = model.neutral_configuration();
        q[0] = 1.0;
        q[1] = 2.0;
        q[2] = 3.0;
        forward_kinematics(&model, &mut data, &q);
        assert_relative_eq!(data.xpos[1].x, 1.0);
        assert_relative_eq!(data.xpos[1].y, 2.0);
        assert_relative_eq!(data.xpos[1].z, 3.0);
    }

    #[test]
    fn frame_placement_follows_body() {
        let mut model = Model::n_link_pendulum(1, 1.0, 1.0);
        model.add_frame("tip", 1, Vector3::new(0.0, 0.0, -1.0)).unwrap();
        let mut data = model.make_data();
        let q = model.neutral_configuration();
        forward_kinematics(&model, &mut data, &q);
        assert_relative_eq!(data.frame_xpos[0].z, -1.0, epsilon = 1e-12);
    }
}
