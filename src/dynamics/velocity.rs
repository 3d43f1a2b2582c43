//! Velocity-stage forward kinematics.
//!
//! Propagates world-referenced spatial velocities down the tree:
//! `cvel[i] = cvel[parent] + Σ cdof[d] · v[d]`. With all vectors referenced
//! at the world origin the composition is a plain sum.

use nalgebra::{DVector, Vector3};

use crate::dynamics::spatial::SpatialVector;
use crate::types::data::Data;
use crate::types::model::Model;

/// Compute body spatial velocities from `v`. Requires fresh kinematics
/// (`cdof` columns) from [`crate::dynamics::forward_kinematics`].
pub fn forward_velocity(model: &Model, data: &mut Data, v: &DVector<f64>) {
    data.cvel[0] = SpatialVector::zeros();

    for body_id in 1..model.nbody {
        let parent_id = model.body_parent[body_id];
        let jnt_id = body_id - 1;
        let dof_adr = model.jnt_dof_adr[jnt_id];
        let nv = model.jnt_type[jnt_id].nv();

        let mut vel = data.cvel[parent_id];
        for d in 0..nv {
            vel += data.cdof[dof_adr + d] * v[dof_adr + d];
        }
        data.cvel[body_id] = vel;
    }
}

/// World-frame linear velocity of a world-frame point rigidly attached to
/// `body_id`. Requires fresh `cvel`.
#[must_use]
pub fn frame_linear_velocity(data: &Data, body_id: usize, point: &Vector3<f64>) -> Vector3<f64> {
    let vel = &data.cvel[body_id];
    let omega = Vector3::new(vel[0], vel[1], vel[2]);
    let v_origin = Vector3::new(vel[3], vel[4], vel[5]);
    v_origin + omega.cross(point)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dynamics::forward_kinematics;
    use approx::assert_relative_eq;

    #[test]
    fn pendulum_tip_speed() {
        // One link rotating at ω about +Y: tip at (0,0,-L) moves at speed ωL
        // along -X (right-hand rule: ω=+Y, r=-Z → v = ω×r = -X direction... ).
        let model = Model::n_link_pendulum(1, 1.0, 1.0);
        let mut data = model.make_data();
        let q = model.neutral_configuration();
        forward_kinematics(&model, &mut data, &q);

        let mut v = DVector::zeros(1);
        v[0] = 2.0;
        forward_velocity(&model, &mut data, &v);

        let tip = Vector3::new(0.0, 0.0, -1.0);
        let vel = frame_linear_velocity(&data, 1, &tip);
        // ω×r = (0,2,0)×(0,0,-1) = (2·(-1) - 0, 0 - 0·(-1), 0) = (-2, 0, 0)
        assert_relative_eq!(vel.x, -2.0, epsilon = 1e-12);
        assert_relative_eq!(vel.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(vel.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn free_body_linear_velocity_is_world_frame() {
        let model = Model::free_body("ball", 1.0, Vector3::new(0.1, 0.1, 0.1));
        let mut data = model.make_data();
        let mut q = model.neutral_configuration();
        q[0] = 5.0; // away from the origin
        forward_kinematics(&model, &mut data, &q);

        let mut v = DVector::zeros(6);
        v[0] = 1.0; // vx
        forward_velocity(&model, &mut data, &v);

        let vel = frame_linear_velocity(&data, 1, &data.xpos[1].clone());
        assert_relative_eq!(vel.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(vel.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(vel.z, 0.0, epsilon = 1e-12);
    }
}
