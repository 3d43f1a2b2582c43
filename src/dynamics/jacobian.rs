//! Force projection and SO(3)-aware configuration calculus.
//!
//! - [`apply_force_at_point`]: Cartesian force/torque at a world point →
//!   generalized forces through the ancestor-DoF chain.
//! - [`differentiate_position`] / [`integrate_position`]: manifold-correct
//!   finite difference and exponential-map integration of `q`.
//! - [`configuration_derivative`]: the `q̇` used to pack `dx/dt`, so the
//!   Euclidean integrator stays close to the quaternion manifold.
//! - [`normalize_quaternions`]: post-step renormalization of quaternion
//!   slices.

use nalgebra::{DVector, Quaternion, UnitQuaternion, Vector3};

use crate::dynamics::spatial::SpatialVector;
use crate::types::data::Data;
use crate::types::enums::JointType;
use crate::types::model::Model;
use crate::types::options::MIN_STEPPER_TIMESTEP;

/// Project a world-frame force + torque applied at `point` on `body_id` into
/// generalized forces: `qfrc += Jᵀ·[τ; f]`.
///
/// With world-origin-referenced DoF columns the projection is
/// `qfrc[d] += cdof[d] · f_spatial` for every DoF `d` on the chain from
/// `body_id` to the root, where `f_spatial = [τ + p × f; f]`.
pub fn apply_force_at_point(
    model: &Model,
    data: &Data,
    body_id: usize,
    point: &Vector3<f64>,
    force: &Vector3<f64>,
    torque: &Vector3<f64>,
    qfrc: &mut DVector<f64>,
) {
    if body_id == 0 {
        return;
    }
    let moment = torque + point.cross(force);
    let f_spatial =
        SpatialVector::new(moment.x, moment.y, moment.z, force.x, force.y, force.z);

    let mut current = body_id;
    while current != 0 {
        let jnt_id = current - 1;
        let dof_adr = model.jnt_dof_adr[jnt_id];
        for d in 0..model.jnt_type[jnt_id].nv() {
            qfrc[dof_adr + d] += data.cdof[dof_adr + d].dot(&f_spatial);
        }
        current = model.body_parent[current];
    }
}

fn quat_at(q: &DVector<f64>, adr: usize) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(
        q[adr],
        q[adr + 1],
        q[adr + 2],
        q[adr + 3],
    ))
}

fn write_quat(q: &mut DVector<f64>, adr: usize, quat: &UnitQuaternion<f64>) {
    q[adr] = quat.w;
    q[adr + 1] = quat.i;
    q[adr + 2] = quat.j;
    q[adr + 3] = quat.k;
}

fn quat_log_velocity(q1: &UnitQuaternion<f64>, q2: &UnitQuaternion<f64>, dt_inv: f64) -> Vector3<f64> {
    // Local (right) difference: q2 = q1 ∘ exp(ω·dt) ⇒ ω = log(q1⁻¹ q2)/dt
    let q_delta = q1.inverse() * q2;
    let w = q_delta.w.clamp(-1.0, 1.0);
    let angle = 2.0 * w.acos();
    let sin_half = (1.0 - w * w).max(0.0).sqrt();
    if sin_half > 1e-10 {
        Vector3::new(q_delta.i, q_delta.j, q_delta.k) / sin_half * angle * dt_inv
    } else {
        Vector3::zeros()
    }
}

fn quat_exp_step(quat: &UnitQuaternion<f64>, omega: &Vector3<f64>, dt: f64) -> UnitQuaternion<f64> {
    let angle = omega.norm() * dt;
    if angle > 1e-12 {
        let axis = nalgebra::Unit::new_normalize(*omega);
        // Local angular velocity: increment composes on the right
        quat * UnitQuaternion::from_axis_angle(&axis, angle)
    } else {
        *quat
    }
}

/// Velocity realizing the displacement `q1 → q2` over `dt`, on the
/// configuration manifold (quaternions via the logarithm map).
pub fn differentiate_position(
    model: &Model,
    qvel: &mut DVector<f64>,
    q1: &DVector<f64>,
    q2: &DVector<f64>,
    dt: f64,
) {
    if dt.abs() < 1e-10 {
        qvel.fill(0.0);
        return;
    }
    let dt_inv = 1.0 / dt;

    for jnt_id in 0..model.njnt {
        let qpos_adr = model.jnt_qpos_adr[jnt_id];
        let dof_adr = model.jnt_dof_adr[jnt_id];

        match model.jnt_type[jnt_id] {
            JointType::Hinge | JointType::Slide => {
                qvel[dof_adr] = (q2[qpos_adr] - q1[qpos_adr]) * dt_inv;
            }
            JointType::Ball => {
                let omega = quat_log_velocity(&quat_at(q1, qpos_adr), &quat_at(q2, qpos_adr), dt_inv);
                qvel[dof_adr] = omega.x;
                qvel[dof_adr + 1] = omega.y;
                qvel[dof_adr + 2] = omega.z;
            }
            JointType::Free => {
                for i in 0..3 {
                    qvel[dof_adr + i] = (q2[qpos_adr + i] - q1[qpos_adr + i]) * dt_inv;
                }
                let omega = quat_log_velocity(
                    &quat_at(q1, qpos_adr + 3),
                    &quat_at(q2, qpos_adr + 3),
                    dt_inv,
                );
                qvel[dof_adr + 3] = omega.x;
                qvel[dof_adr + 4] = omega.y;
                qvel[dof_adr + 5] = omega.z;
            }
        }
    }
}

/// Position reached by integrating `v` over `dt` from `q`, on the
/// configuration manifold (quaternions via the exponential map).
pub fn integrate_position(
    model: &Model,
    q_out: &mut DVector<f64>,
    q: &DVector<f64>,
    v: &DVector<f64>,
    dt: f64,
) {
    for jnt_id in 0..model.njnt {
        let qpos_adr = model.jnt_qpos_adr[jnt_id];
        let dof_adr = model.jnt_dof_adr[jnt_id];

        match model.jnt_type[jnt_id] {
            JointType::Hinge | JointType::Slide => {
                q_out[qpos_adr] = q[qpos_adr] + v[dof_adr] * dt;
            }
            JointType::Ball => {
                let omega = Vector3::new(v[dof_adr], v[dof_adr + 1], v[dof_adr + 2]);
                let quat = quat_exp_step(&quat_at(q, qpos_adr), &omega, dt);
                write_quat(q_out, qpos_adr, &quat);
            }
            JointType::Free => {
                for i in 0..3 {
                    q_out[qpos_adr + i] = q[qpos_adr + i] + v[dof_adr + i] * dt;
                }
                let omega = Vector3::new(v[dof_adr + 3], v[dof_adr + 4], v[dof_adr + 5]);
                let quat = quat_exp_step(&quat_at(q, qpos_adr + 3), &omega, dt);
                write_quat(q_out, qpos_adr + 3, &quat);
            }
        }
    }
}

/// The configuration derivative `q̇` packed into `dx/dt`.
///
/// For a resolvable `dt` (the time since the last accepted step) this is the
/// secant `(integrate(q, v, dt) − q)/dt`, which keeps the Euclidean
/// integration of the quaternion slices close to the manifold over the
/// upcoming step. In the `dt → 0` limit it reduces to the analytic
/// derivative `q̇ = ½ q ⊗ ω`.
pub fn configuration_derivative(
    model: &Model,
    qdot: &mut DVector<f64>,
    q: &DVector<f64>,
    v: &DVector<f64>,
    dt: f64,
) {
    if dt > MIN_STEPPER_TIMESTEP {
        let mut q_next = q.clone();
        integrate_position(model, &mut q_next, q, v, dt);
        let dt_inv = 1.0 / dt;
        for i in 0..model.nq {
            qdot[i] = (q_next[i] - q[i]) * dt_inv;
        }
        return;
    }

    // Analytic limit
    for jnt_id in 0..model.njnt {
        let qpos_adr = model.jnt_qpos_adr[jnt_id];
        let dof_adr = model.jnt_dof_adr[jnt_id];

        match model.jnt_type[jnt_id] {
            JointType::Hinge | JointType::Slide => qdot[qpos_adr] = v[dof_adr],
            JointType::Ball => {
                let quat = quat_at(q, qpos_adr);
                let omega = Quaternion::new(0.0, v[dof_adr], v[dof_adr + 1], v[dof_adr + 2]);
                let dq = quat.into_inner() * omega * 0.5;
                qdot[qpos_adr] = dq.w;
                qdot[qpos_adr + 1] = dq.i;
                qdot[qpos_adr + 2] = dq.j;
                qdot[qpos_adr + 3] = dq.k;
            }
            JointType::Free => {
                for i in 0..3 {
                    qdot[qpos_adr + i] = v[dof_adr + i];
                }
                let quat = quat_at(q, qpos_adr + 3);
                let omega =
                    Quaternion::new(0.0, v[dof_adr + 3], v[dof_adr + 4], v[dof_adr + 5]);
                let dq = quat.into_inner() * omega * 0.5;
                qdot[qpos_adr + 3] = dq.w;
                qdot[qpos_adr + 4] = dq.i;
                qdot[qpos_adr + 5] = dq.j;
                qdot[qpos_adr + 6] = dq.k;
            }
        }
    }
}

/// Renormalize every quaternion slice of `q` (drift guard after accepted
/// steps). Degenerate slices are reset to identity.
pub fn normalize_quaternions(model: &Model, q: &mut DVector<f64>) {
    for jnt_id in 0..model.njnt {
        let adr = match model.jnt_type[jnt_id] {
            JointType::Ball => model.jnt_qpos_adr[jnt_id],
            JointType::Free => model.jnt_qpos_adr[jnt_id] + 3,
            JointType::Hinge | JointType::Slide => continue,
        };
        let norm = (q[adr] * q[adr]
            + q[adr + 1] * q[adr + 1]
            + q[adr + 2] * q[adr + 2]
            + q[adr + 3] * q[adr + 3])
            .sqrt();
        if norm > 1e-10 {
            q[adr] /= norm;
            q[adr + 1] /= norm;
            q[adr + 2] /= norm;
            q[adr + 3] /= norm;
        } else {
            q[adr] = 1.0;
            q[adr + 1] = 0.0;
            q[adr + 2] = 0.0;
            q[adr + 3] = 0.0;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dynamics::forward_kinematics;
    use approx::assert_relative_eq;

    #[test]
    fn integrate_then_differentiate_round_trips() {
        let model = Model::free_body("ball", 1.0, Vector3::new(0.1, 0.1, 0.1));
        let q = model.neutral_configuration();
        let mut v = DVector::zeros(6);
        v[0] = 0.5;
        v[4] = 2.0; // angular velocity about body y
        let dt = 1e-2;

        let mut q2 = q.clone();
        integrate_position(&model, &mut q2, &q, &v, dt);
        let mut v_back = DVector::zeros(6);
        differentiate_position(&model, &mut v_back, &q, &q2, dt);
        for i in 0..6 {
            assert_relative_eq!(v_back[i], v[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn analytic_derivative_matches_finite_difference() {
        let model = Model::free_body("ball", 1.0, Vector3::new(0.1, 0.1, 0.1));
        let mut q = model.neutral_configuration();
        q[3] = 0.9;
        q[4] = (1.0f64 - 0.81).sqrt();
        let mut v = DVector::zeros(6);
        v[3] = 1.0;
        v[5] = -0.7;

        let mut qdot_analytic = DVector::zeros(7);
        configuration_derivative(&model, &mut qdot_analytic, &q, &v, 0.0);
        let mut qdot_fd = DVector::zeros(7);
        configuration_derivative(&model, &mut qdot_fd, &q, &v, 1e-8);
        for i in 0..7 {
            assert_relative_eq!(qdot_analytic[i], qdot_fd[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn quaternion_normalization_restores_unit_norm() {
        let model = Model::free_body("ball", 1.0, Vector3::new(0.1, 0.1, 0.1));
        let mut q = model.neutral_configuration();
        q[3] = 1.01;
        q[4] = 0.02;
        normalize_quaternions(&model, &mut q);
        let n = (q[3] * q[3] + q[4] * q[4] + q[5] * q[5] + q[6] * q[6]).sqrt();
        assert_relative_eq!(n, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn force_projection_matches_hinge_torque() {
        // Unit force along -X at the tip of a hanging pendulum produces a
        // torque about +Y: τ = r × F projected on the axis.
        let model = Model::n_link_pendulum(1, 1.0, 1.0);
        let mut data = model.make_data();
        let q = model.neutral_configuration();
        forward_kinematics(&model, &mut data, &q);

        let mut qfrc = DVector::zeros(1);
        let tip = Vector3::new(0.0, 0.0, -1.0);
        let force = Vector3::new(-1.0, 0.0, 0.0);
        apply_force_at_point(&model, &data, 1, &tip, &force, &Vector3::zeros(), &mut qfrc);
        // τ = (r × F)·axis = ((0,0,-1) × (-1,0,0))·(0,1,0) = (0,1,0)·(0,1,0) = 1
        assert_relative_eq!(qfrc[0], 1.0, epsilon = 1e-12);
    }
}
