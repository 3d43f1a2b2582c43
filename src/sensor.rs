//! Sensor abstraction and basic sensors.
//!
//! Sensors are attached to the model before a simulation starts and are
//! refreshed by the engine either continuously (every RHS evaluation, with
//! the last-accepted acceleration) or at the configured sensor update
//! period. Indices into the state vectors are resolved once at attach time,
//! so measuring never needs the model.

use nalgebra::{DVector, Vector3};

use crate::random::rand_uniform;
use crate::types::error::EngineError;
use crate::types::model::Model;

/// A sensor producing a fixed-size measurement vector.
pub trait Sensor: Send {
    /// Sensor name, unique within the model.
    fn name(&self) -> &str;

    /// Telemetry field names, one per measurement component.
    fn fieldnames(&self) -> Vec<String>;

    /// Refresh the measurement from the current state.
    ///
    /// `a` and `u_motor` are the last-known acceleration and motor torques
    /// (see the engine's sensor snapshot policy). `contact_forces` holds the
    /// world-frame reaction at each contact frame, in declaration order.
    #[allow(clippy::too_many_arguments)]
    fn measure(
        &mut self,
        t: f64,
        q: &DVector<f64>,
        v: &DVector<f64>,
        a: &DVector<f64>,
        u_motor: &DVector<f64>,
        contact_forces: &[Vector3<f64>],
    );

    /// Latest measurement.
    fn value(&self) -> &DVector<f64>;

    /// Clear the measurement state.
    fn reset(&mut self);
}

/// The model's sensor collection.
#[derive(Default)]
pub struct SensorSet(Vec<Box<dyn Sensor>>);

impl SensorSet {
    /// Attach a sensor.
    ///
    /// # Errors
    ///
    /// `BadInput` on duplicate sensor names.
    pub fn attach(&mut self, sensor: Box<dyn Sensor>) -> Result<(), EngineError> {
        if self.0.iter().any(|s| s.name() == sensor.name()) {
            return Err(EngineError::bad_input(format!(
                "a sensor named '{}' already exists",
                sensor.name()
            )));
        }
        self.0.push(sensor);
        Ok(())
    }

    /// Iterate over the attached sensors.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Sensor> {
        self.0.iter().map(|s| &**s)
    }

    /// Number of attached sensors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no sensor is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Refresh every sensor.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn measure_all(
        &mut self,
        t: f64,
        q: &DVector<f64>,
        v: &DVector<f64>,
        a: &DVector<f64>,
        u_motor: &DVector<f64>,
        contact_forces: &[Vector3<f64>],
    ) {
        for sensor in &mut self.0 {
            sensor.measure(t, q, v, a, u_motor, contact_forces);
        }
    }

    pub(crate) fn reset_all(&mut self) {
        for sensor in &mut self.0 {
            sensor.reset();
        }
    }
}

impl std::fmt::Debug for SensorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|s| s.name()))
            .finish()
    }
}

/// Joint encoder: measures the position and velocity of a 1-DoF joint,
/// optionally corrupted by uniform white noise.
pub struct EncoderSensor {
    name: String,
    qpos_adr: usize,
    dof_adr: usize,
    noise_amplitude: f64,
    value: DVector<f64>,
}

impl EncoderSensor {
    /// Create an encoder on a 1-DoF joint of `model`.
    ///
    /// # Errors
    ///
    /// `BadInput` for unknown or multi-DoF joints.
    pub fn new(model: &Model, joint: &str) -> Result<Self, EngineError> {
        let jnt_id = model.joint_id(joint)?;
        if model.jnt_type[jnt_id].nv() != 1 {
            return Err(EngineError::bad_input(format!(
                "encoders are only supported on 1-DoF joints, '{joint}' is not one"
            )));
        }
        Ok(Self {
            name: format!("encoder.{joint}"),
            qpos_adr: model.jnt_qpos_adr[jnt_id],
            dof_adr: model.jnt_dof_adr[jnt_id],
            noise_amplitude: 0.0,
            value: DVector::zeros(2),
        })
    }

    /// Corrupt measurements with uniform noise in `[-amplitude, amplitude]`.
    #[must_use]
    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise_amplitude = amplitude;
        self
    }
}

impl Sensor for EncoderSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn fieldnames(&self) -> Vec<String> {
        vec![format!("{}.position", self.name), format!("{}.velocity", self.name)]
    }

    fn measure(
        &mut self,
        _t: f64,
        q: &DVector<f64>,
        v: &DVector<f64>,
        _a: &DVector<f64>,
        _u_motor: &DVector<f64>,
        _contact_forces: &[Vector3<f64>],
    ) {
        self.value[0] = q[self.qpos_adr];
        self.value[1] = v[self.dof_adr];
        if self.noise_amplitude > 0.0 {
            self.value[0] += rand_uniform(-self.noise_amplitude, self.noise_amplitude);
            self.value[1] += rand_uniform(-self.noise_amplitude, self.noise_amplitude);
        }
    }

    fn value(&self) -> &DVector<f64> {
        &self.value
    }

    fn reset(&mut self) {
        self.value.fill(0.0);
    }
}

/// Contact force sensor: reports the world-frame ground reaction at one
/// contact frame.
pub struct ContactForceSensor {
    name: String,
    contact_idx: usize,
    value: DVector<f64>,
}

impl ContactForceSensor {
    /// Create a force sensor on a declared contact frame of `model`.
    ///
    /// # Errors
    ///
    /// `BadInput` when the frame is not a declared contact frame.
    pub fn new(model: &Model, frame: &str) -> Result<Self, EngineError> {
        let frame_id = model.frame_id(frame)?;
        let contact_idx = model
            .contact_frames
            .iter()
            .position(|&f| f == frame_id)
            .ok_or_else(|| {
                EngineError::bad_input(format!("frame '{frame}' is not a contact frame"))
            })?;
        Ok(Self {
            name: format!("force.{frame}"),
            contact_idx,
            value: DVector::zeros(3),
        })
    }
}

impl Sensor for ContactForceSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn fieldnames(&self) -> Vec<String> {
        ["fx", "fy", "fz"]
            .iter()
            .map(|c| format!("{}.{c}", self.name))
            .collect()
    }

    fn measure(
        &mut self,
        _t: f64,
        _q: &DVector<f64>,
        _v: &DVector<f64>,
        _a: &DVector<f64>,
        _u_motor: &DVector<f64>,
        contact_forces: &[Vector3<f64>],
    ) {
        if let Some(f) = contact_forces.get(self.contact_idx) {
            self.value[0] = f.x;
            self.value[1] = f.y;
            self.value[2] = f.z;
        }
    }

    fn value(&self) -> &DVector<f64> {
        &self.value
    }

    fn reset(&mut self) {
        self.value.fill(0.0);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn encoder_measures_joint_state() {
        let model = Model::n_link_pendulum(2, 1.0, 1.0);
        let mut encoder = EncoderSensor::new(&model, "link_1").unwrap();
        let mut q = model.neutral_configuration();
        q[1] = 0.7;
        let mut v = DVector::zeros(2);
        v[1] = -1.2;
        let a = DVector::zeros(2);
        let u = DVector::zeros(0);
        encoder.measure(0.0, &q, &v, &a, &u, &[]);
        assert_eq!(encoder.value()[0], 0.7);
        assert_eq!(encoder.value()[1], -1.2);
    }

    #[test]
    fn duplicate_sensor_names_rejected() {
        let model = Model::n_link_pendulum(1, 1.0, 1.0);
        let mut set = SensorSet::default();
        set.attach(Box::new(EncoderSensor::new(&model, "link_0").unwrap()))
            .unwrap();
        let dup = EncoderSensor::new(&model, "link_0").unwrap();
        assert!(set.attach(Box::new(dup)).is_err());
    }

    #[test]
    fn contact_sensor_requires_contact_frame() {
        let mut model = Model::n_link_pendulum(1, 1.0, 1.0);
        model
            .add_frame("tip", 1, Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert!(ContactForceSensor::new(&model, "tip").is_err());
        model.add_contact_frame("tip").unwrap();
        assert!(ContactForceSensor::new(&model, "tip").is_ok());
    }
}
