//! Dynamics right-hand side and telemetry refresh.
//!
//! One RHS evaluation runs, in order: forward kinematics → external forces
//! (contacts, impulses, profiles) → sensor snapshot (continuous mode only)
//! → command (continuous mode only) → motor torque → internal dynamics →
//! forward-dynamics solve → configuration derivative. Sensor and motor
//! models receive the last-accepted acceleration and torques, which are the
//! most recent values actually known at evaluation time.

use nalgebra::DVector;

use crate::contact::{compute_contact_force, frame_force_on_parent_body};
use crate::dynamics::{
    apply_force_at_point, configuration_derivative, crba, forward_kinematics, forward_velocity,
    kinetic_energy, potential_energy, rne, SpatialForce,
};
use crate::types::error::EngineError;
use crate::types::model::Model;
use crate::types::options::{JointOptions, MIN_SIMULATION_TIMESTEP};

use super::Engine;

/// Saturation of the joint limit-spring torques.
const JOINT_BOUND_TORQUE_MAX: f64 = 1e5;

impl Engine {
    /// Evaluate `dx/dt = f(t, x)` into `dxdt`.
    pub(crate) fn compute_system_dynamics(&mut self, t: f64, x: &DVector<f64>, dxdt: &mut DVector<f64>) {
        self.system_dynamics_impl(t, x, dxdt, false);
    }

    /// RHS evaluation; `force_refresh` makes the sensor and command updates
    /// unconditional (used once at simulation start so the initial snapshot
    /// is consistent).
    pub(crate) fn system_dynamics_impl(
        &mut self,
        t: f64,
        x: &DVector<f64>,
        dxdt: &mut DVector<f64>,
        force_refresh: bool,
    ) {
        let (Some(model), Some(controller)) = (self.model.as_mut(), self.controller.as_mut())
        else {
            return;
        };
        let state = &mut self.stepper_state;
        let last = &self.stepper_state_last;
        let data = &mut self.data;
        let options = &self.options;

        let nq = model.nq;
        let nv = model.nv;
        let q = x.rows(0, nq).into_owned();
        let v = x.rows(nq, nv).into_owned();

        // 1. Kinematics: poses, frames, motion subspace, body velocities.
        forward_kinematics(model, data, &q);
        forward_velocity(model, data, &v);

        // 2. External forces. Contacts must come before the sensor snapshot
        // so force sensors read fresh reactions.
        for f in &mut state.f_external {
            *f = SpatialForce::zero();
        }
        for (i, &frame_id) in model.contact_frames.iter().enumerate() {
            let f_world = compute_contact_force(
                model,
                data,
                &options.contacts,
                &options.world.ground_profile,
                frame_id,
            );
            data.contact_forces[i] = f_world;
            let local = frame_force_on_parent_body(model, data, frame_id, &f_world);
            state.f_external[model.frame_body[frame_id]] += local;
        }
        if let Some(impulse) = self.forces.current_impulse() {
            if impulse.t <= t && t <= impulse.t + impulse.dt && impulse.frame_idx != usize::MAX {
                let local =
                    frame_force_on_parent_body(model, data, impulse.frame_idx, &impulse.force);
                state.f_external[model.frame_body[impulse.frame_idx]] += local;
            }
        }
        for profile in &self.forces.profiles {
            let f_world = (profile.functor)(t, x);
            let local = frame_force_on_parent_body(model, data, profile.frame_idx, &f_world);
            state.f_external[model.frame_body[profile.frame_idx]] += local;
        }

        let a_last = last.a_owned();

        // 3. Sensor snapshot. In continuous mode the current acceleration is
        // not known yet, so the last-accepted one is used.
        if force_refresh || options.stepper.sensors_update_period < MIN_SIMULATION_TIMESTEP {
            model.set_sensors_data(t, &q, &v, &a_last, &last.u_motor, &data.contact_forces);
        }

        // 4. Command, after the sensors it may rely on.
        if force_refresh || options.stepper.controller_update_period < MIN_SIMULATION_TIMESTEP {
            state.u_command.fill(0.0);
            controller.compute_command(t, &q, &v, &mut state.u_command);
        }

        // 5. Actual motor torque.
        model.compute_motor_torques(t, &q, &v, &a_last, &state.u_command, &mut state.u_motor);

        // 6. Internal dynamics: controller passive hook, then limit springs
        // and flexibilities.
        state.u_internal.fill(0.0);
        controller.internal_dynamics(t, &q, &v, &mut state.u_internal);
        internal_joint_forces(model, &options.joints, &q, &v, &mut state.u_internal);

        // 7. Total joint torque.
        state.u.copy_from(&state.u_internal);
        for motor in &model.motors {
            state.u[motor.joint_velocity_idx()] += state.u_motor[motor.idx()];
        }

        // 8. Forward dynamics: M·v̇ = u − bias + Jᵀ·f_ext.
        crba(model, data);
        rne(model, data, &v);

        let mut qfrc_ext = std::mem::take(&mut data.qfrc_ext);
        qfrc_ext.fill(0.0);
        for body_id in 1..model.nbody {
            let f = &state.f_external[body_id];
            if f.is_zero() {
                continue;
            }
            let force_w = data.xquat[body_id] * f.linear;
            let torque_w = data.xquat[body_id] * f.angular;
            let point = data.xpos[body_id];
            apply_force_at_point(model, data, body_id, &point, &force_w, &torque_w, &mut qfrc_ext);
        }
        data.qfrc_ext = qfrc_ext;

        let rhs = &state.u - &data.qfrc_bias + &data.qfrc_ext;
        match data.qM.clone().cholesky() {
            Some(chol) => {
                let a = chol.solve(&rhs);
                dxdt.rows_mut(nq, nv).copy_from(&a);
            }
            None => {
                tracing::warn!("joint-space inertia matrix is not positive definite");
                dxdt.rows_mut(nq, nv).fill(f64::NAN);
            }
        }

        // 9. Manifold configuration derivative over the elapsed interval.
        let dt_since_last = t - last.t;
        let mut qdot = DVector::zeros(nq);
        configuration_derivative(model, &mut qdot, &q, &v, dt_since_last);
        dxdt.rows_mut(0, nq).copy_from(&qdot);
    }

    /// Refresh the sensors with the current stepper state (discrete-mode
    /// boundary update).
    pub(crate) fn refresh_sensors(&mut self, t: f64) {
        let Some(model) = self.model.as_mut() else {
            return;
        };
        let state = &self.stepper_state;
        model.set_sensors_data(
            t,
            &state.q_owned(),
            &state.v_owned(),
            &state.a_owned(),
            &state.u_motor,
            &self.data.contact_forces,
        );
    }

    /// Refresh the controller command from the current stepper state
    /// (discrete-mode boundary update).
    pub(crate) fn refresh_command(&mut self, t: f64) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        let state = &mut self.stepper_state;
        let q = state.q_owned();
        let v = state.v_owned();
        state.u_command.fill(0.0);
        controller.compute_command(t, &q, &v, &mut state.u_command);
    }

    /// Full dynamics evaluation at `t = 0` so the initial telemetry snapshot
    /// carries consistent sensors, command, torques, and acceleration.
    pub(crate) fn evaluate_initial_dynamics(&mut self) {
        // The shadow state is the initial state itself: the first sensor
        // snapshot sees zero acceleration and zero motor torque.
        self.stepper_state_last = self.stepper_state.clone();

        let x = self.stepper_state.x.clone();
        let mut dxdt = self.stepper_state.dxdt.clone();
        self.system_dynamics_impl(0.0, &x, &mut dxdt, true);
        self.stepper_state.dxdt.copy_from(&dxdt);

        // Sensors see the computed acceleration and motor torques.
        self.refresh_sensors(0.0);
    }

    /// Register the engine telemetry variables (per-option groups, sensors)
    /// and let the controller register its own.
    pub(crate) fn configure_telemetry(&mut self) -> Result<(), EngineError> {
        if self.is_telemetry_configured {
            return Ok(());
        }
        let Some(model) = self.model.as_ref() else {
            return Err(EngineError::init_failed("the engine is not initialized"));
        };
        let telemetry = &mut self.telemetry_data;
        let slots = &mut self.telemetry_slots;

        telemetry.register_constant("robot", model.name.clone())?;

        if self.options.telemetry.enable_configuration {
            slots.configuration = Some(telemetry.register_variables(&model.position_fieldnames())?);
        }
        if self.options.telemetry.enable_velocity {
            slots.velocity = Some(telemetry.register_variables(&model.velocity_fieldnames())?);
        }
        if self.options.telemetry.enable_acceleration {
            slots.acceleration =
                Some(telemetry.register_variables(&model.acceleration_fieldnames())?);
        }
        if self.options.telemetry.enable_torque && !model.motors.is_empty() {
            slots.torque = Some(telemetry.register_variables(&model.motor_torque_fieldnames())?);
        }
        if self.options.telemetry.enable_energy {
            slots.energy = Some(telemetry.register_variable("energy")?);
        }

        slots.sensors.clear();
        for sensor in model.sensors.iter() {
            slots.sensors.push(telemetry.register_variables(&sensor.fieldnames())?);
        }

        if let Some(controller) = self.controller.as_mut() {
            controller.configure_telemetry(telemetry)?;
        }

        self.is_telemetry_configured = true;
        Ok(())
    }

    /// Push the current state into the telemetry registry and flush one
    /// record.
    pub(crate) fn update_telemetry(&mut self) {
        let Some(model) = self.model.as_ref() else {
            return;
        };
        let state = &self.stepper_state;
        let q = state.q_owned();
        let v = state.v_owned();

        // Total mechanical energy, from fresh kinematics and mass matrix.
        if let Some(slot) = self.telemetry_slots.energy {
            forward_kinematics(model, &mut self.data, &q);
            forward_velocity(model, &mut self.data, &v);
            crba(model, &mut self.data);
            let energy = kinetic_energy(&self.data, &v) + potential_energy(model, &self.data);
            self.telemetry_data.update_value(slot, energy);
        }

        if let Some(slot) = self.telemetry_slots.configuration {
            self.telemetry_data.update_values(slot, &q);
        }
        if let Some(slot) = self.telemetry_slots.velocity {
            self.telemetry_data.update_values(slot, &v);
        }
        if let Some(slot) = self.telemetry_slots.acceleration {
            self.telemetry_data.update_values(slot, &state.a_owned());
        }
        if let Some(slot) = self.telemetry_slots.torque {
            self.telemetry_data.update_values(slot, &state.u_motor);
        }
        for (slot, sensor) in self.telemetry_slots.sensors.iter().zip(model.sensors.iter()) {
            self.telemetry_data.update_values(*slot, sensor.value());
        }

        if let Some(controller) = self.controller.as_mut() {
            controller.update_telemetry(&mut self.telemetry_data);
        }

        self.telemetry_data.set_iteration(state.iter);
        self.telemetry_data.set_time(state.t);
        self.telemetry_recorder.flush_snapshot(&self.telemetry_data);
    }
}

/// Limit springs and flexibility torques added to the internal dynamics.
fn internal_joint_forces(
    model: &Model,
    options: &JointOptions,
    q: &DVector<f64>,
    v: &DVector<f64>,
    u: &mut DVector<f64>,
) {
    for jnt_id in 0..model.njnt {
        let qpos_adr = model.jnt_qpos_adr[jnt_id];
        let dof_adr = model.jnt_dof_adr[jnt_id];

        // Position limit springs (1-DoF joints only)
        if model.jnt_position_limited[jnt_id] {
            let q_joint = q[qpos_adr];
            let v_joint = v[dof_adr];
            let (q_min, q_max) = model.jnt_range[jnt_id];

            let mut force = 0.0;
            let mut error = 0.0;
            if q_joint > q_max {
                error = q_joint - q_max;
                force = -options.bound_stiffness * error
                    - options.bound_damping * v_joint.max(0.0);
            } else if q_joint < q_min {
                error = q_min - q_joint;
                force = options.bound_stiffness * error
                    - options.bound_damping * v_joint.min(0.0);
            }
            if options.bound_transition_eps > f64::EPSILON {
                force *= (2.0 * error / options.bound_transition_eps).tanh();
            }
            u[dof_adr] += force.clamp(-JOINT_BOUND_TORQUE_MAX, JOINT_BOUND_TORQUE_MAX);
        }

        // Velocity limit dampers (1-DoF joints only)
        if model.jnt_velocity_limited[jnt_id] {
            let v_joint = v[dof_adr];
            let v_max = model.jnt_velocity_limit[jnt_id];

            let mut force = 0.0;
            let mut error = 0.0;
            if v_joint > v_max {
                error = v_joint - v_max;
                force = -options.bound_damping * error;
            } else if v_joint < -v_max {
                error = -v_max - v_joint;
                force = options.bound_damping * error;
            }
            if options.bound_transition_eps > f64::EPSILON {
                force *= (2.0 * error / options.bound_transition_eps).tanh();
            }
            u[dof_adr] += force.clamp(-JOINT_BOUND_TORQUE_MAX, JOINT_BOUND_TORQUE_MAX);
        }

        // Flexible spherical joints: per-axis stiffness on the rotation
        // vector log3(Q), per-axis damping on the angular velocity.
        if model.jnt_type[jnt_id] == crate::types::enums::JointType::Ball {
            let stiffness = model.jnt_flex_stiffness[jnt_id];
            let damping = model.jnt_flex_damping[jnt_id];
            if stiffness == nalgebra::Vector3::zeros() && damping == nalgebra::Vector3::zeros() {
                continue;
            }
            let quat = nalgebra::UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
                q[qpos_adr],
                q[qpos_adr + 1],
                q[qpos_adr + 2],
                q[qpos_adr + 3],
            ));
            let rotation_vector = quat.scaled_axis();
            for i in 0..3 {
                u[dof_adr + i] += -stiffness[i] * rotation_vector[i] - damping[i] * v[dof_adr + i];
            }
        }
    }
}
