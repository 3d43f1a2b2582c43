//! Static model definition.
//!
//! [`Model`] is the immutable description of the simulated system: kinematic
//! tree, joint definitions, motors, sensors, and named frames. It is built
//! programmatically (body by body, or through a factory) and stays
//! structurally fixed while a simulation runs. The mutable counterpart is
//! [`crate::Data`], created per run via [`Model::make_data`].
//!
//! # Memory Layout
//!
//! Arrays are indexed by their respective IDs:
//! - `body_*` arrays indexed by `body_id` (0 = world)
//! - `jnt_*` arrays indexed by `joint_id` (joint `j` drives body `j + 1`;
//!   every non-world body has exactly one joint)
//! - `frame_*` arrays indexed by `frame_id`

use nalgebra::{DVector, UnitQuaternion, Vector3};

use crate::motor::{MotorOptions, SimpleMotor};
use crate::sensor::SensorSet;
use crate::types::data::Data;
use crate::types::enums::JointType;
use crate::types::error::EngineError;

/// Static model of an articulated multibody system.
#[derive(Debug)]
pub struct Model {
    /// Model name.
    pub name: String,

    // ==================== Dimensions ====================
    /// Number of generalized position coordinates (includes quaternions).
    pub nq: usize,
    /// Number of generalized velocity coordinates (DoFs, always <= nq).
    pub nv: usize,
    /// Number of bodies, including the world body 0.
    pub nbody: usize,
    /// Number of joints (= nbody - 1).
    pub njnt: usize,

    // ==================== Body tree (indexed by body_id, 0 = world) ====================
    /// Parent body index (0 for bodies attached to the world).
    pub body_parent: Vec<usize>,
    /// Position offset from parent frame to body frame, in parent frame.
    pub body_pos: Vec<Vector3<f64>>,
    /// Orientation offset from parent frame to body frame.
    pub body_quat: Vec<UnitQuaternion<f64>>,
    /// Center of mass position in body frame.
    pub body_ipos: Vec<Vector3<f64>>,
    /// Body mass \[kg\].
    pub body_mass: Vec<f64>,
    /// Diagonal rotational inertia about the COM, in body frame \[kg·m²\].
    pub body_inertia: Vec<Vector3<f64>>,
    /// Body names.
    pub body_name: Vec<String>,

    // ==================== Joints (indexed by joint_id) ====================
    /// Joint type.
    pub jnt_type: Vec<JointType>,
    /// Body driven by this joint (= joint_id + 1).
    pub jnt_body: Vec<usize>,
    /// First position coordinate of this joint in `q`.
    pub jnt_qpos_adr: Vec<usize>,
    /// First velocity coordinate of this joint in `v`.
    pub jnt_dof_adr: Vec<usize>,
    /// Joint axis in body frame (hinge/slide only).
    pub jnt_axis: Vec<Vector3<f64>>,
    /// Joint anchor in body frame.
    pub jnt_pos: Vec<Vector3<f64>>,
    /// Joint names.
    pub jnt_name: Vec<String>,

    // ==================== DoF bookkeeping (indexed by dof) ====================
    /// Joint owning each DoF.
    pub dof_jnt: Vec<usize>,
    /// Parent DoF in the kinematic tree (None at tree roots). Within a
    /// multi-DoF joint, DoFs chain onto each other.
    pub dof_parent: Vec<Option<usize>>,

    // Joint limits (1-DoF joints only; spherical joints are not limited)
    /// Whether the position limit spring is active for this joint.
    pub jnt_position_limited: Vec<bool>,
    /// Position limit range `(min, max)`.
    pub jnt_range: Vec<(f64, f64)>,
    /// Whether the velocity limit damper is active for this joint.
    pub jnt_velocity_limited: Vec<bool>,
    /// Symmetric velocity limit magnitude.
    pub jnt_velocity_limit: Vec<f64>,

    // Flexibility (spherical joints inserted to model structural compliance)
    /// Per-axis stiffness of a flexible spherical joint (zero otherwise).
    pub jnt_flex_stiffness: Vec<Vector3<f64>>,
    /// Per-axis damping of a flexible spherical joint (zero otherwise).
    pub jnt_flex_damping: Vec<Vector3<f64>>,

    // ==================== Frames (indexed by frame_id) ====================
    /// Frame names.
    pub frame_name: Vec<String>,
    /// Body carrying the frame.
    pub frame_body: Vec<usize>,
    /// Frame position in body frame.
    pub frame_pos: Vec<Vector3<f64>>,
    /// Frame orientation in body frame.
    pub frame_quat: Vec<UnitQuaternion<f64>>,
    /// Frames at which unilateral ground contact is evaluated.
    pub contact_frames: Vec<usize>,

    // ==================== Actuation & sensing ====================
    /// Motors attached to 1-DoF joints.
    pub motors: Vec<SimpleMotor>,
    /// Sensors attached to the model.
    pub sensors: SensorSet,

    // ==================== World ====================
    /// Gravity vector \[m/s²\]. Propagated from the engine world options at
    /// simulation start.
    pub gravity: Vector3<f64>,
}

impl Model {
    /// Create an empty model containing only the world body.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nq: 0,
            nv: 0,
            nbody: 1,
            njnt: 0,
            body_parent: vec![0],
            body_pos: vec![Vector3::zeros()],
            body_quat: vec![UnitQuaternion::identity()],
            body_ipos: vec![Vector3::zeros()],
            body_mass: vec![0.0],
            body_inertia: vec![Vector3::zeros()],
            body_name: vec!["world".to_string()],
            jnt_type: Vec::new(),
            jnt_body: Vec::new(),
            jnt_qpos_adr: Vec::new(),
            jnt_dof_adr: Vec::new(),
            jnt_axis: Vec::new(),
            jnt_pos: Vec::new(),
            jnt_name: Vec::new(),
            dof_jnt: Vec::new(),
            dof_parent: Vec::new(),
            jnt_position_limited: Vec::new(),
            jnt_range: Vec::new(),
            jnt_velocity_limited: Vec::new(),
            jnt_velocity_limit: Vec::new(),
            jnt_flex_stiffness: Vec::new(),
            jnt_flex_damping: Vec::new(),
            frame_name: Vec::new(),
            frame_body: Vec::new(),
            frame_pos: Vec::new(),
            frame_quat: Vec::new(),
            contact_frames: Vec::new(),
            motors: Vec::new(),
            sensors: SensorSet::default(),
            gravity: Vector3::new(0.0, 0.0, -9.81),
        }
    }

    /// Length of the concatenated state vector `x = [q; v]`.
    #[must_use]
    pub fn nx(&self) -> usize {
        self.nq + self.nv
    }

    /// Append a body connected to `parent` by a joint of the given type.
    ///
    /// `body_pos` is the offset from the parent frame to the new body frame,
    /// `axis` is the joint axis in body frame (ignored for ball/free joints),
    /// `com` is the center of mass in body frame, `inertia` the diagonal
    /// rotational inertia about the COM. Returns the new body id.
    #[allow(clippy::too_many_arguments)]
    pub fn add_body(
        &mut self,
        name: impl Into<String>,
        parent: usize,
        jnt_type: JointType,
        body_pos: Vector3<f64>,
        axis: Vector3<f64>,
        mass: f64,
        com: Vector3<f64>,
        inertia: Vector3<f64>,
    ) -> usize {
        let name = name.into();
        let body_id = self.nbody;

        self.body_parent.push(parent);
        self.body_pos.push(body_pos);
        self.body_quat.push(UnitQuaternion::identity());
        self.body_ipos.push(com);
        self.body_mass.push(mass);
        self.body_inertia.push(inertia);
        self.body_name.push(name.clone());

        self.jnt_type.push(jnt_type);
        self.jnt_body.push(body_id);
        self.jnt_qpos_adr.push(self.nq);
        self.jnt_dof_adr.push(self.nv);
        self.jnt_axis.push(axis);
        self.jnt_pos.push(Vector3::zeros());
        self.jnt_name.push(name);
        self.jnt_position_limited.push(false);
        self.jnt_range.push((f64::NEG_INFINITY, f64::INFINITY));
        self.jnt_velocity_limited.push(false);
        self.jnt_velocity_limit.push(f64::INFINITY);
        self.jnt_flex_stiffness.push(Vector3::zeros());
        self.jnt_flex_damping.push(Vector3::zeros());

        // Chain the new DoFs onto the parent body's last DoF.
        let jnt_id = self.njnt;
        let parent_last_dof = if parent == 0 {
            None
        } else {
            let parent_jnt = parent - 1;
            Some(self.jnt_dof_adr[parent_jnt] + self.jnt_type[parent_jnt].nv() - 1)
        };
        for d in 0..jnt_type.nv() {
            self.dof_jnt.push(jnt_id);
            self.dof_parent.push(if d == 0 {
                parent_last_dof
            } else {
                Some(self.nv + d - 1)
            });
        }

        self.nq += jnt_type.nq();
        self.nv += jnt_type.nv();
        self.nbody += 1;
        self.njnt += 1;

        body_id
    }

    /// Enable the position-limit spring on a 1-DoF joint.
    ///
    /// # Errors
    ///
    /// `BadInput` for unknown joints or joints with more than one DoF.
    pub fn set_position_limits(
        &mut self,
        joint: &str,
        min: f64,
        max: f64,
    ) -> Result<(), EngineError> {
        let jnt_id = self.joint_id(joint)?;
        if self.jnt_type[jnt_id].nv() != 1 {
            return Err(EngineError::bad_input(format!(
                "position limits are only supported on 1-DoF joints, '{joint}' is not one"
            )));
        }
        self.jnt_position_limited[jnt_id] = true;
        self.jnt_range[jnt_id] = (min, max);
        Ok(())
    }

    /// Enable the velocity-limit damper on a 1-DoF joint.
    ///
    /// # Errors
    ///
    /// `BadInput` for unknown joints or joints with more than one DoF.
    pub fn set_velocity_limit(&mut self, joint: &str, limit: f64) -> Result<(), EngineError> {
        let jnt_id = self.joint_id(joint)?;
        if self.jnt_type[jnt_id].nv() != 1 {
            return Err(EngineError::bad_input(format!(
                "velocity limits are only supported on 1-DoF joints, '{joint}' is not one"
            )));
        }
        self.jnt_velocity_limited[jnt_id] = true;
        self.jnt_velocity_limit[jnt_id] = limit;
        Ok(())
    }

    /// Declare a ball joint as a flexible element with per-axis stiffness
    /// and damping.
    ///
    /// # Errors
    ///
    /// `BadInput` for unknown joints or non-ball joints.
    pub fn set_flexibility(
        &mut self,
        joint: &str,
        stiffness: Vector3<f64>,
        damping: Vector3<f64>,
    ) -> Result<(), EngineError> {
        let jnt_id = self.joint_id(joint)?;
        if self.jnt_type[jnt_id] != JointType::Ball {
            return Err(EngineError::bad_input(format!(
                "flexibility is only supported on ball joints, '{joint}' is not one"
            )));
        }
        self.jnt_flex_stiffness[jnt_id] = stiffness;
        self.jnt_flex_damping[jnt_id] = damping;
        Ok(())
    }

    /// Attach a named frame to a body. Returns the frame id.
    ///
    /// # Errors
    ///
    /// `BadInput` for out-of-range bodies or duplicate frame names.
    pub fn add_frame(
        &mut self,
        name: impl Into<String>,
        body: usize,
        pos: Vector3<f64>,
    ) -> Result<usize, EngineError> {
        let name = name.into();
        if body >= self.nbody {
            return Err(EngineError::bad_input(format!(
                "cannot attach frame '{name}' to unknown body {body}"
            )));
        }
        if self.frame_name.iter().any(|n| n == &name) {
            return Err(EngineError::bad_input(format!(
                "a frame named '{name}' already exists"
            )));
        }
        let frame_id = self.frame_name.len();
        self.frame_name.push(name);
        self.frame_body.push(body);
        self.frame_pos.push(pos);
        self.frame_quat.push(UnitQuaternion::identity());
        Ok(frame_id)
    }

    /// Declare an existing frame as a ground-contact frame.
    ///
    /// # Errors
    ///
    /// `BadInput` for unknown frame names.
    pub fn add_contact_frame(&mut self, name: &str) -> Result<(), EngineError> {
        let frame_id = self.frame_id(name)?;
        if !self.contact_frames.contains(&frame_id) {
            self.contact_frames.push(frame_id);
        }
        Ok(())
    }

    /// Attach a motor to a 1-DoF joint. Returns the motor index.
    ///
    /// # Errors
    ///
    /// `BadInput` for unknown joints, multi-DoF joints, or invalid motor
    /// options.
    pub fn attach_motor(
        &mut self,
        joint: &str,
        options: MotorOptions,
    ) -> Result<usize, EngineError> {
        options.validate()?;
        let jnt_id = self.joint_id(joint)?;
        if self.jnt_type[jnt_id].nv() != 1 {
            return Err(EngineError::bad_input(format!(
                "motors are only supported on 1-DoF joints, '{joint}' is not one"
            )));
        }
        let idx = self.motors.len();
        let dof = self.jnt_dof_adr[jnt_id];
        self.motors
            .push(SimpleMotor::new(joint, idx, jnt_id, dof, options));
        Ok(idx)
    }

    /// Compute the actual torque of every motor from the commanded torques.
    ///
    /// `u_command` has one entry per motor; `u_motor` is filled in place.
    pub fn compute_motor_torques(
        &self,
        t: f64,
        _q: &DVector<f64>,
        v: &DVector<f64>,
        _a: &DVector<f64>,
        u_command: &DVector<f64>,
        u_motor: &mut DVector<f64>,
    ) {
        for motor in &self.motors {
            u_motor[motor.idx()] = motor.compute_effort(t, v, u_command[motor.idx()]);
        }
    }

    /// Refresh every attached sensor with the current state.
    ///
    /// `contact_forces` holds the world-frame reaction at each contact frame,
    /// in declaration order.
    #[allow(clippy::too_many_arguments)]
    pub fn set_sensors_data(
        &mut self,
        t: f64,
        q: &DVector<f64>,
        v: &DVector<f64>,
        a: &DVector<f64>,
        u_motor: &DVector<f64>,
        contact_forces: &[Vector3<f64>],
    ) {
        self.sensors.measure_all(t, q, v, a, u_motor, contact_forces);
    }

    /// Reset the mutable parts of the model (sensor internals).
    pub fn reset(&mut self) {
        self.sensors.reset_all();
    }

    /// Neutral configuration: zeros with identity quaternions.
    #[must_use]
    pub fn neutral_configuration(&self) -> DVector<f64> {
        let mut q = DVector::zeros(self.nq);
        for jnt_id in 0..self.njnt {
            let adr = self.jnt_qpos_adr[jnt_id];
            match self.jnt_type[jnt_id] {
                JointType::Ball => q[adr] = 1.0,
                JointType::Free => q[adr + 3] = 1.0,
                JointType::Hinge | JointType::Slide => {}
            }
        }
        q
    }

    /// Allocate the kinematic/dynamic scratch data for this model.
    #[must_use]
    pub fn make_data(&self) -> Data {
        Data::new(self)
    }

    /// Look up a joint id by name.
    ///
    /// # Errors
    ///
    /// `BadInput` when no joint carries that name.
    pub fn joint_id(&self, name: &str) -> Result<usize, EngineError> {
        self.jnt_name
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| EngineError::bad_input(format!("unknown joint '{name}'")))
    }

    /// Look up a frame id by name.
    ///
    /// # Errors
    ///
    /// `BadInput` when no frame carries that name.
    pub fn frame_id(&self, name: &str) -> Result<usize, EngineError> {
        self.frame_name
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| EngineError::bad_input(format!("unknown frame '{name}'")))
    }

    /// Names of the motors, in motor index order.
    #[must_use]
    pub fn motor_names(&self) -> Vec<String> {
        self.motors.iter().map(|m| m.name().to_string()).collect()
    }

    // ==================== Telemetry field names ====================

    fn coordinate_fieldnames(&self, prefix: &str, per_position: bool) -> Vec<String> {
        let mut names = Vec::new();
        for jnt_id in 0..self.njnt {
            let jnt = &self.jnt_name[jnt_id];
            match self.jnt_type[jnt_id] {
                JointType::Hinge | JointType::Slide => names.push(format!("{prefix}.{jnt}")),
                JointType::Ball => {
                    if per_position {
                        for c in ["qw", "qx", "qy", "qz"] {
                            names.push(format!("{prefix}.{jnt}.{c}"));
                        }
                    } else {
                        for c in ["wx", "wy", "wz"] {
                            names.push(format!("{prefix}.{jnt}.{c}"));
                        }
                    }
                }
                JointType::Free => {
                    if per_position {
                        for c in ["x", "y", "z", "qw", "qx", "qy", "qz"] {
                            names.push(format!("{prefix}.{jnt}.{c}"));
                        }
                    } else {
                        for c in ["vx", "vy", "vz", "wx", "wy", "wz"] {
                            names.push(format!("{prefix}.{jnt}.{c}"));
                        }
                    }
                }
            }
        }
        names
    }

    /// Telemetry field names of the configuration vector (length `nq`).
    #[must_use]
    pub fn position_fieldnames(&self) -> Vec<String> {
        self.coordinate_fieldnames("currentPosition", true)
    }

    /// Telemetry field names of the velocity vector (length `nv`).
    #[must_use]
    pub fn velocity_fieldnames(&self) -> Vec<String> {
        self.coordinate_fieldnames("currentVelocity", false)
    }

    /// Telemetry field names of the acceleration vector (length `nv`).
    #[must_use]
    pub fn acceleration_fieldnames(&self) -> Vec<String> {
        self.coordinate_fieldnames("currentAcceleration", false)
    }

    /// Telemetry field names of the motor torque vector.
    #[must_use]
    pub fn motor_torque_fieldnames(&self) -> Vec<String> {
        self.motors
            .iter()
            .map(|m| format!("currentTorque.{}", m.name()))
            .collect()
    }

    // ==================== Factories ====================

    /// Single rigid body attached to the world by a free-flyer joint.
    ///
    /// The COM sits at the body origin.
    #[must_use]
    pub fn free_body(name: &str, mass: f64, inertia: Vector3<f64>) -> Self {
        let mut model = Self::new(name);
        model.add_body(
            "base",
            0,
            JointType::Free,
            Vector3::zeros(),
            Vector3::zeros(),
            mass,
            Vector3::zeros(),
            inertia,
        );
        model
    }

    /// Serial n-link pendulum: hinge joints about `+Y`, each link of the
    /// given length with a point-like mass at its tip. `q = 0` hangs straight
    /// down along `-Z`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    #[must_use]
    pub fn n_link_pendulum(n: usize, link_length: f64, link_mass: f64) -> Self {
        assert!(n >= 1, "n_link_pendulum requires at least one link");
        let mut model = Self::new("pendulum");
        let mut parent = 0;
        for i in 0..n {
            let offset = if i == 0 {
                Vector3::zeros()
            } else {
                Vector3::new(0.0, 0.0, -link_length)
            };
            parent = model.add_body(
                format!("link_{i}"),
                parent,
                JointType::Hinge,
                offset,
                Vector3::new(0.0, 1.0, 0.0),
                link_mass,
                Vector3::new(0.0, 0.0, -link_length),
                Vector3::new(1e-3, 1e-3, 1e-3),
            );
        }
        model
    }

    /// Single actuated revolute joint about `+Y` with a point mass at the
    /// link tip and a motor attached.
    ///
    /// # Errors
    ///
    /// `BadInput` when the motor options are invalid.
    pub fn actuated_arm(
        link_length: f64,
        link_mass: f64,
        motor_options: MotorOptions,
    ) -> Result<Self, EngineError> {
        let mut model = Self::n_link_pendulum(1, link_length, link_mass);
        model.attach_motor("link_0", motor_options)?;
        Ok(model)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pendulum_dimensions() {
        let model = Model::n_link_pendulum(3, 1.0, 1.0);
        assert_eq!(model.nq, 3);
        assert_eq!(model.nv, 3);
        assert_eq!(model.nx(), 6);
        assert_eq!(model.nbody, 4);
        assert_eq!(model.njnt, 3);
    }

    #[test]
    fn free_body_neutral_configuration() {
        let model = Model::free_body("ball", 1.0, Vector3::new(0.1, 0.1, 0.1));
        let q = model.neutral_configuration();
        assert_eq!(q.len(), 7);
        assert_eq!(q[3], 1.0); // unit quaternion w
        assert_eq!(q.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn frame_and_contact_declaration() {
        let mut model = Model::n_link_pendulum(1, 1.0, 1.0);
        let id = model
            .add_frame("tip", 1, Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert_eq!(id, 0);
        assert!(model.add_contact_frame("tip").is_ok());
        assert!(model.add_contact_frame("nope").is_err());
        assert_eq!(model.contact_frames, vec![0]);
    }

    #[test]
    fn motor_requires_single_dof_joint() {
        let mut model = Model::free_body("ball", 1.0, Vector3::new(0.1, 0.1, 0.1));
        assert!(model.attach_motor("base", MotorOptions::default()).is_err());
    }

    #[test]
    fn fieldname_lengths_match_dimensions() {
        let mut model = Model::n_link_pendulum(2, 1.0, 1.0);
        model.attach_motor("link_0", MotorOptions::default()).unwrap();
        assert_eq!(model.position_fieldnames().len(), model.nq);
        assert_eq!(model.velocity_fieldnames().len(), model.nv);
        assert_eq!(model.acceleration_fieldnames().len(), model.nv);
        assert_eq!(model.motor_torque_fieldnames().len(), 1);
    }
}
