//! Composite Rigid Body Algorithm: joint-space inertia matrix.
//!
//! With every spatial quantity referenced at the world origin the composite
//! accumulation and the mass-matrix projection are shift-free:
//! `M[i][j] = cdof[i]ᵀ · Ic[body(i∨j)] · cdof[j]` where `Ic` is the subtree
//! composite inertia.
//!
//! The motor rotor inertia is added on the diagonal of motorized DoFs. For a
//! 1-DoF joint this is exactly the articulated-body rotor correction
//! `D = SᵀIᵃS + I_rotor` folded into joint space.
//!
//! Reference: Featherstone, "Rigid Body Dynamics Algorithms", Chapter 6.

use crate::types::data::Data;
use crate::types::model::Model;

/// Build the joint-space inertia matrix `data.qM` from body inertias.
///
/// Requires fresh kinematics (`cinert`, `cdof`). The matrix is symmetric
/// positive definite for any model with positive masses.
pub fn crba(model: &Model, data: &mut Data) {
    data.qM.fill(0.0);
    if model.nv == 0 {
        return;
    }

    // Backward pass: accumulate subtree composite inertias.
    for body_id in 0..model.nbody {
        data.crb_inertia[body_id] = data.cinert[body_id];
    }
    for body_id in (1..model.nbody).rev() {
        let parent_id = model.body_parent[body_id];
        if parent_id != 0 {
            let child = data.crb_inertia[body_id];
            data.crb_inertia[parent_id] += child;
        }
    }

    // Projection: per-DoF walk up the dof_parent chain.
    for dof_i in 0..model.nv {
        let body_i = model.jnt_body[model.dof_jnt[dof_i]];
        let buf = data.crb_inertia[body_i] * data.cdof[dof_i];

        data.qM[(dof_i, dof_i)] = data.cdof[dof_i].dot(&buf);

        let mut j = model.dof_parent[dof_i];
        while let Some(dof_j) = j {
            let m_ji = data.cdof[dof_j].dot(&buf);
            data.qM[(dof_j, dof_i)] = m_ji;
            data.qM[(dof_i, dof_j)] = m_ji;
            j = model.dof_parent[dof_j];
        }
    }

    // Rotor inertia on motorized DoF diagonals.
    for motor in &model.motors {
        let d = motor.joint_velocity_idx();
        data.qM[(d, d)] += motor.rotor_inertia();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dynamics::forward_kinematics;
    use crate::motor::MotorOptions;
    use approx::assert_relative_eq;

    #[test]
    fn point_mass_pendulum_inertia() {
        // Point mass m at distance L from the pivot: M = m·L².
        let model = Model::n_link_pendulum(1, 1.0, 2.0);
        let mut data = model.make_data();
        let q = model.neutral_configuration();
        forward_kinematics(&model, &mut data, &q);
        crba(&model, &mut data);
        // Tip inertia 1e-3 adds to the m·L² term.
        assert_relative_eq!(data.qM[(0, 0)], 2.0 + 1e-3, epsilon = 1e-12);
    }

    #[test]
    fn double_pendulum_inertia_matches_closed_form() {
        // Point masses at the link tips:
        // M11 = (m1+m2)L1² + m2L2² + 2 m2 L1 L2 cosθ2
        // M12 = m2L2² + m2 L1 L2 cosθ2, M22 = m2L2²
        let l = 1.0;
        let m = 1.0;
        let model = Model::n_link_pendulum(2, l, m);
        let mut data = model.make_data();
        let mut q = model.neutral_configuration();
        q[1] = 0.3;
        forward_kinematics(&model, &mut data, &q);
        crba(&model, &mut data);

        let c2 = 0.3_f64.cos();
        let tip = 1e-3; // factory tip inertia about Y
        let m11 = 2.0 * l * l + l * l + 2.0 * l * l * c2 + 2.0 * tip;
        let m12 = l * l + l * l * c2 + tip;
        let m22 = l * l + tip;
        assert_relative_eq!(data.qM[(0, 0)], m11, epsilon = 1e-10);
        assert_relative_eq!(data.qM[(0, 1)], m12, epsilon = 1e-10);
        assert_relative_eq!(data.qM[(1, 0)], m12, epsilon = 1e-10);
        assert_relative_eq!(data.qM[(1, 1)], m22, epsilon = 1e-10);
    }

    #[test]
    fn rotor_inertia_enters_diagonal() {
        let mut model = Model::n_link_pendulum(1, 1.0, 1.0);
        model
            .attach_motor(
                "link_0",
                MotorOptions {
                    rotor_inertia: 0.25,
                    ..Default::default()
                },
            )
            .unwrap();
        let mut data = model.make_data();
        let q = model.neutral_configuration();
        forward_kinematics(&model, &mut data, &q);
        crba(&model, &mut data);
        assert_relative_eq!(data.qM[(0, 0)], 1.0 + 1e-3 + 0.25, epsilon = 1e-12);
    }

    #[test]
    fn mass_matrix_symmetric_positive_definite() {
        let model = Model::n_link_pendulum(3, 0.7, 1.3);
        let mut data = model.make_data();
        let mut q = model.neutral_configuration();
        q[0] = 0.4;
        q[1] = -0.8;
        q[2] = 1.1;
        forward_kinematics(&model, &mut data, &q);
        crba(&model, &mut data);

        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(data.qM[(i, j)], data.qM[(j, i)], epsilon = 1e-12);
            }
        }
        assert!(data.qM.clone().cholesky().is_some(), "M must be SPD");
    }
}
