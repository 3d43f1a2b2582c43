//! Lifecycle, option validation, locking, determinism, and log round-trip.

#![allow(clippy::unwrap_used)]

use nalgebra::{DVector, Vector3};
use sim_engine::{
    Engine, EngineError, EngineOptions, EncoderSensor, FunctorController, Model, StepperOptions,
    START_COLUMNS,
};

fn pendulum_engine() -> Engine {
    let model = Model::n_link_pendulum(1, 1.0, 1.0);
    let mut engine = Engine::new();
    engine
        .initialize(
            model,
            Box::new(FunctorController::passive()),
            Box::new(|_, _| true),
        )
        .unwrap();
    engine
}

fn neutral_x0(engine: &Engine) -> DVector<f64> {
    let model = engine.model().unwrap();
    let mut x0 = DVector::zeros(model.nx());
    x0.rows_mut(0, model.nq)
        .copy_from(&model.neutral_configuration());
    x0
}

#[test]
fn option_rejection_leaves_options_untouched() {
    let mut engine = pendulum_engine();
    let dt_max_before = engine.get_options().stepper.dt_max;

    let cases: Vec<StepperOptions> = vec![
        StepperOptions {
            dt_max: 0.0,
            ..Default::default()
        },
        StepperOptions {
            dt_max: 10e-3,
            ..Default::default()
        },
        StepperOptions {
            ode_solver: "rk45".to_string(),
            ..Default::default()
        },
        StepperOptions {
            sensors_update_period: 7e-4,
            controller_update_period: 1e-3,
            ..Default::default()
        },
    ];

    for stepper in cases {
        let result = engine.set_options(EngineOptions {
            stepper,
            ..Default::default()
        });
        assert!(
            matches!(result, Err(EngineError::BadInput(_))),
            "expected BadInput, got {result:?}"
        );
        assert_eq!(engine.get_options().stepper.dt_max, dt_max_before);
    }
}

#[test]
fn compatible_periods_are_accepted() {
    let mut engine = pendulum_engine();
    let result = engine.set_options(EngineOptions {
        stepper: StepperOptions {
            sensors_update_period: 2e-3,
            controller_update_period: 1e-3,
            ..Default::default()
        },
        ..Default::default()
    });
    assert!(result.is_ok());
}

#[test]
fn registration_refused_while_running() {
    let mut engine = pendulum_engine();
    engine
        .model_mut()
        .unwrap()
        .add_frame("tip", 1, Vector3::new(0.0, 0.0, -1.0))
        .unwrap();
    let x0 = neutral_x0(&engine);
    engine.start(&x0).unwrap();

    assert!(matches!(
        engine.register_force_impulse("tip", 0.5, 0.01, Vector3::new(1.0, 0.0, 0.0)),
        Err(EngineError::Generic(_))
    ));
    assert!(matches!(
        engine.register_force_profile("tip", Box::new(|_, _| Vector3::zeros())),
        Err(EngineError::Generic(_))
    ));
    assert!(matches!(
        engine.set_options(EngineOptions::default()),
        Err(EngineError::Generic(_))
    ));
    assert!(matches!(
        engine.model_mut(),
        Err(EngineError::Generic(_))
    ));

    engine.stop();
    assert!(engine
        .register_force_impulse("tip", 0.5, 0.01, Vector3::new(1.0, 0.0, 0.0))
        .is_ok());
    assert!(engine.set_options(EngineOptions::default()).is_ok());
}

#[test]
fn step_requires_a_running_simulation() {
    let mut engine = pendulum_engine();
    assert!(matches!(engine.step(-1.0), Err(EngineError::Generic(_))));

    let x0 = neutral_x0(&engine);
    engine.start(&x0).unwrap();
    assert!(engine.step(-1.0).is_ok());
    // Step sizes inside (EPS, MIN_SIMULATION_TIMESTEP) are rejected
    assert!(matches!(
        engine.step(1e-9),
        Err(EngineError::BadInput(_))
    ));
    engine.stop();
}

#[test]
fn start_rejects_wrong_state_size() {
    let mut engine = pendulum_engine();
    let x0 = DVector::zeros(5);
    assert!(matches!(
        engine.start(&x0),
        Err(EngineError::BadInput(_))
    ));
    assert!(!engine.is_simulation_running());
}

#[test]
fn simulate_rejects_sub_millisecond_durations() {
    let mut engine = pendulum_engine();
    let x0 = neutral_x0(&engine);
    assert!(matches!(
        engine.simulate(1e-3, &x0),
        Err(EngineError::BadInput(_))
    ));
}

#[test]
fn callback_false_is_a_benign_exit() {
    let model = Model::n_link_pendulum(1, 1.0, 1.0);
    let mut engine = Engine::new();
    engine
        .initialize(
            model,
            Box::new(FunctorController::passive()),
            Box::new(|t, _| t < 0.05),
        )
        .unwrap();
    let x0 = neutral_x0(&engine);
    assert!(engine.simulate(10.0, &x0).is_ok());
    assert!(engine.stepper_state().t < 0.1);
}

#[test]
fn binary_log_round_trip_is_exact() {
    let mut engine = pendulum_engine();
    let mut x0 = neutral_x0(&engine);
    x0[0] = 0.3;
    engine.simulate(0.1, &x0).unwrap();

    let (header, matrix) = engine.get_log_data();
    assert!(matrix.nrows() > 10);

    let path = std::env::temp_dir().join("sim_engine_lifecycle_roundtrip.data");
    engine.write_log_binary(&path).unwrap();
    let (parsed_header, parsed_matrix) = Engine::parse_log_binary(&path).unwrap();
    assert_eq!(parsed_header, header);
    assert_eq!(parsed_matrix, matrix);
    std::fs::remove_file(path).ok();
}

#[test]
fn text_log_has_two_header_lines_and_records() {
    let mut engine = pendulum_engine();
    let x0 = neutral_x0(&engine);
    engine.simulate(0.05, &x0).unwrap();

    let path = std::env::temp_dir().join("sim_engine_lifecycle_log.csv");
    engine.write_log_txt(&path).unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert!(lines.len() > 2);
    assert!(lines[0].contains("NumFloatEntries="));
    assert!(lines[1].contains("Global.Time"));
    std::fs::remove_file(path).ok();
}

#[test]
fn log_field_lookup_by_name() {
    let mut engine = pendulum_engine();
    let mut x0 = neutral_x0(&engine);
    x0[0] = 0.2;
    engine.simulate(0.1, &x0).unwrap();

    let (header, matrix) = engine.get_log_data();
    assert!(header.contains(&START_COLUMNS.to_string()));

    let time = Engine::get_log_field_value("Global.Time", &header, &matrix);
    assert_eq!(time.len(), matrix.nrows());
    assert_eq!(time[0], 0.0);

    let q = Engine::get_log_field_value("currentPosition.link_0", &header, &matrix);
    assert!((q[0] - 0.2).abs() < 1e-6);

    let missing = Engine::get_log_field_value("does.not.exist", &header, &matrix);
    assert_eq!(missing.len(), 0);
}

#[test]
fn same_seed_reproduces_the_log_bit_for_bit() {
    let mut model = Model::n_link_pendulum(1, 1.0, 1.0);
    let noisy = EncoderSensor::new(&model, "link_0").unwrap().with_noise(1e-3);
    model.sensors.attach(Box::new(noisy)).unwrap();

    let mut engine = Engine::new();
    engine
        .initialize(
            model,
            Box::new(FunctorController::passive()),
            Box::new(|_, _| true),
        )
        .unwrap();
    engine
        .set_options(EngineOptions {
            stepper: StepperOptions {
                random_seed: 17,
                sensors_update_period: 1e-3,
                controller_update_period: 1e-3,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();

    let mut x0 = neutral_x0(&engine);
    x0[0] = 0.1;

    engine.reset(true, false);
    engine.simulate(0.2, &x0).unwrap();
    let (_, first) = engine.get_log_data();

    engine.reset(true, false);
    engine.simulate(0.2, &x0).unwrap();
    let (_, second) = engine.get_log_data();

    assert_eq!(first, second);
}

#[test]
fn stop_then_restart_accepts_new_options() {
    let mut engine = pendulum_engine();
    let x0 = neutral_x0(&engine);
    engine.start(&x0).unwrap();
    engine.stop();

    // After stop, options and a new start are accepted again.
    engine
        .set_options(EngineOptions {
            stepper: StepperOptions {
                ode_solver: "explicit_euler".to_string(),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
    engine.start(&x0).unwrap();
    engine.step(-1.0).unwrap();
    engine.stop();
}
