//! Spatial algebra for 6D motion and force vectors.
//!
//! Featherstone's convention throughout:
//! - Motion vectors: \[ω, v\] (angular velocity, linear velocity)
//! - Force vectors: \[τ, f\] (torque, force)

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};

/// 6D spatial vector: \[angular (3), linear (3)\].
pub type SpatialVector = Vector6<f64>;

/// A spatial force split into linear and angular parts.
///
/// Used for the per-body external-force accumulator, expressed in the local
/// frame of the body it acts on, referenced at the body origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialForce {
    /// Force \[N\].
    pub linear: Vector3<f64>,
    /// Torque \[N·m\].
    pub angular: Vector3<f64>,
}

impl SpatialForce {
    /// The zero force.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }

    /// Whether both parts are exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.linear == Vector3::zeros() && self.angular == Vector3::zeros()
    }
}

impl std::ops::AddAssign for SpatialForce {
    fn add_assign(&mut self, rhs: Self) {
        self.linear += rhs.linear;
        self.angular += rhs.angular;
    }
}

/// Spatial cross product for motion vectors: `v ×ₘ s`.
#[inline]
#[must_use]
pub fn cross_motion(v: SpatialVector, s: SpatialVector) -> SpatialVector {
    let w = Vector3::new(v[0], v[1], v[2]);
    let v_lin = Vector3::new(v[3], v[4], v[5]);
    let s_ang = Vector3::new(s[0], s[1], s[2]);
    let s_lin = Vector3::new(s[3], s[4], s[5]);

    let out_ang = w.cross(&s_ang);
    let out_lin = w.cross(&s_lin) + v_lin.cross(&s_ang);

    SpatialVector::new(out_ang.x, out_ang.y, out_ang.z, out_lin.x, out_lin.y, out_lin.z)
}

/// Spatial cross product for force vectors: `v ×* f`.
#[inline]
#[must_use]
pub fn cross_force(v: SpatialVector, f: SpatialVector) -> SpatialVector {
    let w = Vector3::new(v[0], v[1], v[2]);
    let v_lin = Vector3::new(v[3], v[4], v[5]);
    let f_ang = Vector3::new(f[0], f[1], f[2]);
    let f_lin = Vector3::new(f[3], f[4], f[5]);

    let out_ang = w.cross(&f_ang) + v_lin.cross(&f_lin);
    let out_lin = w.cross(&f_lin);

    SpatialVector::new(out_ang.x, out_ang.y, out_ang.z, out_lin.x, out_lin.y, out_lin.z)
}

/// Build a body's 6×6 spatial inertia in world frame, referenced at the
/// world origin.
///
/// - `mass`: body mass
/// - `inertia_diag`: diagonal rotational inertia about the COM, body frame
/// - `rot`: body orientation (rotation matrix body → world)
/// - `com`: body COM in world frame (= offset from the reference point)
///
/// ```text
/// Φ = [ I_rot + m(‖h‖²·1 − h hᵀ)   m·[h]×  ]
///     [ m·[h]×ᵀ                    m·1     ]
/// ```
/// with `h = com`.
#[must_use]
pub fn body_spatial_inertia(
    mass: f64,
    inertia_diag: Vector3<f64>,
    rot: &Matrix3<f64>,
    com: Vector3<f64>,
) -> Matrix6<f64> {
    // Rotational inertia about the COM in world frame: R · diag(I) · Rᵀ
    let mut i_rot = Matrix3::zeros();
    for row in 0..3 {
        for col in 0..3 {
            i_rot[(row, col)] = rot[(row, 0)] * inertia_diag[0] * rot[(col, 0)]
                + rot[(row, 1)] * inertia_diag[1] * rot[(col, 1)]
                + rot[(row, 2)] * inertia_diag[2] * rot[(col, 2)];
        }
    }

    let h = com;
    let hh = h.norm_squared();
    let mut phi = Matrix6::zeros();

    // Upper-left: rotational inertia about the reference point (parallel axis)
    for row in 0..3 {
        for col in 0..3 {
            let delta = if row == col { 1.0 } else { 0.0 };
            phi[(row, col)] = i_rot[(row, col)] + mass * (hh * delta - h[row] * h[col]);
        }
    }

    // Lower-right: translational mass
    phi[(3, 3)] = mass;
    phi[(4, 4)] = mass;
    phi[(5, 5)] = mass;

    // Coupling blocks: m·[h]× and its transpose
    let mh = mass * h;
    phi[(0, 4)] = -mh.z;
    phi[(0, 5)] = mh.y;
    phi[(1, 3)] = mh.z;
    phi[(1, 5)] = -mh.x;
    phi[(2, 3)] = -mh.y;
    phi[(2, 4)] = mh.x;
    phi[(4, 0)] = -mh.z;
    phi[(5, 0)] = mh.y;
    phi[(3, 1)] = mh.z;
    phi[(5, 1)] = -mh.x;
    phi[(3, 2)] = -mh.y;
    phi[(4, 2)] = mh.x;

    phi
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cross_motion_matches_component_formula() {
        let v = SpatialVector::new(1.0, 2.0, 3.0, 0.5, -0.5, 1.5);
        let s = SpatialVector::new(-1.0, 0.5, 2.0, 1.0, 1.0, 0.0);
        let out = cross_motion(v, s);

        let w = Vector3::new(1.0, 2.0, 3.0);
        let vl = Vector3::new(0.5, -0.5, 1.5);
        let sa = Vector3::new(-1.0, 0.5, 2.0);
        let sl = Vector3::new(1.0, 1.0, 0.0);
        let expect_ang = w.cross(&sa);
        let expect_lin = w.cross(&sl) + vl.cross(&sa);
        for k in 0..3 {
            assert_relative_eq!(out[k], expect_ang[k]);
            assert_relative_eq!(out[k + 3], expect_lin[k]);
        }
    }

    #[test]
    fn point_mass_inertia_kinetic_energy() {
        // Point mass m at com c, pure linear velocity v:
        // E = ½ vᵀ Φ v must equal ½ m ‖v‖².
        let m = 2.0;
        let com = Vector3::new(0.3, -0.2, 1.0);
        let phi = body_spatial_inertia(m, Vector3::zeros(), &Matrix3::identity(), com);
        let vel = SpatialVector::new(0.0, 0.0, 0.0, 1.0, 2.0, -1.0);
        let e = 0.5 * vel.dot(&(phi * vel));
        assert_relative_eq!(e, 0.5 * m * 6.0, epsilon = 1e-12);
    }

    #[test]
    fn rotating_point_mass_energy() {
        // Point mass rotating about the origin at radius r with angular
        // velocity ω about z: E = ½ m r² ω².
        let m = 1.5;
        let r = 2.0;
        let omega = 3.0;
        let com = Vector3::new(r, 0.0, 0.0);
        let phi = body_spatial_inertia(m, Vector3::zeros(), &Matrix3::identity(), com);
        // Spatial velocity about the origin: [0,0,ω, 0,0,0]
        let vel = SpatialVector::new(0.0, 0.0, omega, 0.0, 0.0, 0.0);
        let e = 0.5 * vel.dot(&(phi * vel));
        assert_relative_eq!(e, 0.5 * m * r * r * omega * omega, epsilon = 1e-12);
    }
}
