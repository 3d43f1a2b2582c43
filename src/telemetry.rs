//! Telemetry: variable registry, snapshot recorder, and log codecs.
//!
//! Variables are registered by name between `start` and the registry freeze;
//! after that only their values may change. Each snapshot appends one record
//! holding the integer section (iteration counter) and the float32 section
//! (time first, then every registered variable).
//!
//! # Binary layout
//!
//! ```text
//! [i32 version]
//! [constants "key=value", each NUL-terminated…]
//! ["StartColumns" NUL]
//! [column names, each NUL-terminated…]
//! ["StartData\n" NUL]
//! [records: NumIntEntries × i32 LE, then NumFloatEntries × f32 LE]
//! ```
//!
//! The constants end with two `key=value` entries giving `NumIntEntries`
//! and `NumFloatEntries`, which size each record when parsing.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use nalgebra::{DMatrix, DVector};

use crate::types::error::EngineError;

/// Version tag at the head of every binary log.
pub const TELEMETRY_VERSION: i32 = 1;
/// Header token separating constants from column names.
pub const START_COLUMNS: &str = "StartColumns";
/// Header token separating column names from records.
pub const START_DATA: &str = "StartData";
/// Line token appended to [`START_DATA`] on disk.
pub const START_LINE_TOKEN: &str = "\n";
/// Name of the iteration-counter column (integer section).
pub const GLOBAL_ITERATION: &str = "Global.Iteration";
/// Name of the time column (first float).
pub const GLOBAL_TIME: &str = "Global.Time";

const NUM_INT_ENTRIES: &str = "NumIntEntries";
const NUM_FLOAT_ENTRIES: &str = "NumFloatEntries";

/// Shared variable registry and current snapshot values.
///
/// Collaborators (engine, controller) register their variables here at
/// simulation start and push fresh values before every snapshot.
#[derive(Debug, Default)]
pub struct TelemetryData {
    constants: Vec<(String, String)>,
    int_names: Vec<String>,
    float_names: Vec<String>,
    int_values: Vec<i32>,
    float_values: Vec<f32>,
    locked: bool,
}

impl TelemetryData {
    /// Fresh registry with the default iteration/time columns.
    #[must_use]
    pub fn new() -> Self {
        let mut data = Self::default();
        data.reset();
        data
    }

    /// Clear everything and re-register the default columns. Unlocks the
    /// registry.
    pub fn reset(&mut self) {
        self.constants.clear();
        self.int_names = vec![GLOBAL_ITERATION.to_string()];
        self.int_values = vec![0];
        self.float_names = vec![GLOBAL_TIME.to_string()];
        self.float_values = vec![0.0];
        self.locked = false;
    }

    /// Whether the registry is frozen.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Freeze the registry: no further registration until [`reset`](Self::reset).
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Register a constant, recorded in the log header.
    ///
    /// # Errors
    ///
    /// `Generic` when the registry is frozen.
    pub fn register_constant(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), EngineError> {
        if self.locked {
            return Err(EngineError::generic(
                "telemetry registry is frozen, cannot register new constants",
            ));
        }
        self.constants.push((name.into(), value.into()));
        Ok(())
    }

    /// Register one float variable; returns its value slot.
    ///
    /// # Errors
    ///
    /// `Generic` when the registry is frozen or the name already exists.
    pub fn register_variable(&mut self, name: impl Into<String>) -> Result<usize, EngineError> {
        let name = name.into();
        if self.locked {
            return Err(EngineError::generic(
                "telemetry registry is frozen, cannot register new variables",
            ));
        }
        if self.float_names.contains(&name) || self.int_names.contains(&name) {
            return Err(EngineError::generic(format!(
                "telemetry variable '{name}' is already registered"
            )));
        }
        self.float_names.push(name);
        self.float_values.push(0.0);
        Ok(self.float_names.len() - 1)
    }

    /// Register a group of float variables; returns the first value slot.
    ///
    /// # Errors
    ///
    /// `Generic` when the registry is frozen or a name already exists.
    pub fn register_variables(&mut self, names: &[String]) -> Result<usize, EngineError> {
        let start = self.float_names.len();
        for name in names {
            self.register_variable(name.clone())?;
        }
        Ok(start)
    }

    /// Update one float value by slot.
    pub fn update_value(&mut self, slot: usize, value: f64) {
        if let Some(v) = self.float_values.get_mut(slot) {
            *v = value as f32;
        }
    }

    /// Update a contiguous group of float values starting at `start`.
    pub fn update_values(&mut self, start: usize, values: &DVector<f64>) {
        for (i, value) in values.iter().enumerate() {
            self.update_value(start + i, *value);
        }
    }

    /// Update a float value by name (slow path for controller hooks).
    pub fn update_value_by_name(&mut self, name: &str, value: f64) {
        if let Some(slot) = self.float_names.iter().position(|n| n == name) {
            self.update_value(slot, value);
        }
    }

    /// Set the iteration counter (integer section).
    pub fn set_iteration(&mut self, iter: u32) {
        self.int_values[0] = iter as i32;
    }

    /// Set the time column.
    pub fn set_time(&mut self, t: f64) {
        self.float_values[0] = t as f32;
    }

    /// Number of integer entries per record.
    #[must_use]
    pub fn num_ints(&self) -> usize {
        self.int_names.len()
    }

    /// Number of float entries per record.
    #[must_use]
    pub fn num_floats(&self) -> usize {
        self.float_names.len()
    }
}

/// Snapshot recorder: owns the recorded rows and the frozen header.
///
/// Rows survive `reset` so the log stays readable after `stop`; they are
/// cleared by the next [`initialize`](Self::initialize).
#[derive(Debug, Default)]
pub struct TelemetryRecorder {
    header: Vec<String>,
    num_ints: usize,
    num_floats: usize,
    int_rows: Vec<Vec<i32>>,
    float_rows: Vec<Vec<f32>>,
    initialized: bool,
}

impl TelemetryRecorder {
    /// Freeze the registry, capture the header, and clear previous rows.
    pub fn initialize(&mut self, data: &mut TelemetryData) {
        // Record sizing constants at the header tail, then freeze.
        data.constants
            .push((NUM_INT_ENTRIES.to_string(), data.int_names.len().to_string()));
        data.constants.push((
            NUM_FLOAT_ENTRIES.to_string(),
            data.float_names.len().to_string(),
        ));
        data.lock();

        self.header = Vec::new();
        for (k, v) in &data.constants {
            self.header.push(format!("{k}={v}"));
        }
        self.header.push(START_COLUMNS.to_string());
        self.header.extend(data.int_names.iter().cloned());
        self.header.extend(data.float_names.iter().cloned());
        self.header.push(START_DATA.to_string());

        self.num_ints = data.num_ints();
        self.num_floats = data.num_floats();
        self.int_rows.clear();
        self.float_rows.clear();
        self.initialized = true;
    }

    /// Whether [`initialize`](Self::initialize) has run since construction.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Close the recording session. Recorded rows stay readable until the
    /// next [`initialize`](Self::initialize).
    pub fn reset(&mut self) {
        self.initialized = false;
    }

    /// Append one record from the current snapshot values.
    pub fn flush_snapshot(&mut self, data: &TelemetryData) {
        self.int_rows.push(data.int_values.clone());
        self.float_rows.push(data.float_values.clone());
    }

    /// Number of recorded rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.int_rows.len()
    }

    /// Header and data matrix of the recorded log.
    ///
    /// Columns follow the header's column-name order: integer section first,
    /// then the float section. Values are widened to `f64` from the stored
    /// `i32`/`f32`, so a binary round-trip reproduces the matrix exactly.
    #[must_use]
    pub fn get_log_data(&self) -> (Vec<String>, DMatrix<f64>) {
        let nrows = self.int_rows.len();
        let ncols = self.num_ints + self.num_floats;
        let mut matrix = DMatrix::zeros(nrows, ncols);
        for (r, (ints, floats)) in self.int_rows.iter().zip(&self.float_rows).enumerate() {
            for (c, v) in ints.iter().enumerate() {
                matrix[(r, c)] = f64::from(*v);
            }
            for (c, v) in floats.iter().enumerate() {
                matrix[(r, self.num_ints + c)] = f64::from(*v);
            }
        }
        (self.header.clone(), matrix)
    }

    /// Write the recorded log to a binary file.
    ///
    /// # Errors
    ///
    /// `BadInput` when the file cannot be created or written.
    pub fn write_log_binary(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let file = File::create(path.as_ref()).map_err(|e| {
            EngineError::bad_input(format!(
                "cannot create log file '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        let mut writer = BufWriter::new(file);
        let io_err =
            |e: std::io::Error| EngineError::bad_input(format!("cannot write log file: {e}"));

        writer
            .write_all(&TELEMETRY_VERSION.to_le_bytes())
            .map_err(io_err)?;

        for item in &self.header {
            if item == START_DATA {
                // The data marker carries the line token on disk.
                writer.write_all(START_DATA.as_bytes()).map_err(io_err)?;
                writer
                    .write_all(START_LINE_TOKEN.as_bytes())
                    .map_err(io_err)?;
            } else {
                writer.write_all(item.as_bytes()).map_err(io_err)?;
            }
            writer.write_all(&[0]).map_err(io_err)?;
        }

        for (ints, floats) in self.int_rows.iter().zip(&self.float_rows) {
            for v in ints {
                writer.write_all(&v.to_le_bytes()).map_err(io_err)?;
            }
            for v in floats {
                writer.write_all(&v.to_le_bytes()).map_err(io_err)?;
            }
        }
        writer.flush().map_err(io_err)
    }

    /// Write the recorded log as CSV: one line of constants, one line of
    /// column names, one line per record.
    ///
    /// # Errors
    ///
    /// `BadInput` when the file cannot be created or written.
    pub fn write_log_txt(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let file = File::create(path.as_ref()).map_err(|e| {
            EngineError::bad_input(format!(
                "cannot create log file '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        let mut writer = BufWriter::new(file);
        let io_err =
            |e: std::io::Error| EngineError::bad_input(format!("cannot write log file: {e}"));

        let Some(start) = self.header.iter().position(|h| h == START_COLUMNS) else {
            return Err(EngineError::generic(
                "no recorded log, run a simulation first",
            ));
        };
        let constants = &self.header[..start];
        let names = &self.header[start + 1..self.header.len() - 1];

        writeln!(writer, "{}", constants.join(", ")).map_err(io_err)?;
        writeln!(writer, "{}", names.join(", ")).map_err(io_err)?;

        let (_, matrix) = self.get_log_data();
        for r in 0..matrix.nrows() {
            let row: Vec<String> = (0..matrix.ncols()).map(|c| matrix[(r, c)].to_string()).collect();
            writeln!(writer, "{}", row.join(", ")).map_err(io_err)?;
        }
        writer.flush().map_err(io_err)
    }
}

fn read_nul_string(reader: &mut impl Read) -> Result<Option<String>, EngineError> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => {
                return if bytes.is_empty() {
                    Ok(None)
                } else {
                    Err(EngineError::bad_input("corrupted log file"))
                }
            }
            Ok(_) => {
                if byte[0] == 0 {
                    return String::from_utf8(bytes)
                        .map(Some)
                        .map_err(|_| EngineError::bad_input("corrupted log file"));
                }
                bytes.push(byte[0]);
            }
            Err(e) => {
                return Err(EngineError::bad_input(format!("cannot read log file: {e}")));
            }
        }
    }
}

/// Parse a binary log written by [`TelemetryRecorder::write_log_binary`].
///
/// Returns the header (constants, markers, column names) and the data
/// matrix, identical to [`TelemetryRecorder::get_log_data`] on the recorder
/// that wrote the file.
///
/// # Errors
///
/// `BadInput` when the file cannot be opened or is corrupted.
pub fn parse_log_binary(path: impl AsRef<Path>) -> Result<(Vec<String>, DMatrix<f64>), EngineError> {
    let file = File::open(path.as_ref()).map_err(|e| {
        EngineError::bad_input(format!(
            "cannot open log file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    let mut reader = BufReader::new(file);
    let io_err = |e: std::io::Error| EngineError::bad_input(format!("cannot read log file: {e}"));

    let mut version = [0u8; 4];
    reader.read_exact(&mut version).map_err(io_err)?;

    // Constants up to the column marker
    let mut constants = Vec::new();
    loop {
        let item = read_nul_string(&mut reader)?
            .ok_or_else(|| EngineError::bad_input("corrupted log file"))?;
        if item == START_COLUMNS {
            break;
        }
        constants.push(item);
    }

    // Column names up to the data marker
    let mut names = Vec::new();
    loop {
        let item = read_nul_string(&mut reader)?
            .ok_or_else(|| EngineError::bad_input("corrupted log file"))?;
        if item == format!("{START_DATA}{START_LINE_TOKEN}") {
            break;
        }
        names.push(item);
    }

    // Record sizes from the two tail constants
    let parse_count = |entry: Option<&String>, key: &str| -> Result<usize, EngineError> {
        entry
            .and_then(|s| s.strip_prefix(&format!("{key}=")))
            .and_then(|v| v.parse::<usize>().ok())
            .ok_or_else(|| EngineError::bad_input("corrupted log file"))
    };
    let n = constants.len();
    let num_ints = parse_count(constants.get(n.wrapping_sub(2)), NUM_INT_ENTRIES)?;
    let num_floats = parse_count(constants.get(n.wrapping_sub(1)), NUM_FLOAT_ENTRIES)?;

    // Records until end of file
    let mut int_rows: Vec<Vec<i32>> = Vec::new();
    let mut float_rows: Vec<Vec<f32>> = Vec::new();
    'records: loop {
        let mut ints = Vec::with_capacity(num_ints);
        for k in 0..num_ints {
            let mut buf = [0u8; 4];
            match reader.read_exact(&mut buf) {
                Ok(()) => ints.push(i32::from_le_bytes(buf)),
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && k == 0 => {
                    break 'records;
                }
                Err(_) => return Err(EngineError::bad_input("corrupted log file")),
            }
        }
        let mut floats = Vec::with_capacity(num_floats);
        for _ in 0..num_floats {
            let mut buf = [0u8; 4];
            reader
                .read_exact(&mut buf)
                .map_err(|_| EngineError::bad_input("corrupted log file"))?;
            floats.push(f32::from_le_bytes(buf));
        }
        int_rows.push(ints);
        float_rows.push(floats);
    }

    let mut header = constants;
    header.push(START_COLUMNS.to_string());
    header.extend(names);
    header.push(START_DATA.to_string());

    let nrows = int_rows.len();
    let mut matrix = DMatrix::zeros(nrows, num_ints + num_floats);
    for (r, (ints, floats)) in int_rows.iter().zip(&float_rows).enumerate() {
        for (c, v) in ints.iter().enumerate() {
            matrix[(r, c)] = f64::from(*v);
        }
        for (c, v) in floats.iter().enumerate() {
            matrix[(r, num_ints + c)] = f64::from(*v);
        }
    }
    Ok((header, matrix))
}

/// Extract one column of a parsed log by field name. Returns an empty
/// vector when the field is absent.
#[must_use]
pub fn get_log_field_value(
    field_name: &str,
    header: &[String],
    log_data: &DMatrix<f64>,
) -> DVector<f64> {
    let Some(start) = header.iter().position(|h| h == START_COLUMNS) else {
        return DVector::zeros(0);
    };
    let Some(idx) = header.iter().position(|h| h == field_name) else {
        return DVector::zeros(0);
    };
    if idx <= start {
        return DVector::zeros(0);
    }
    let col = idx - start - 1;
    if col >= log_data.ncols() {
        return DVector::zeros(0);
    }
    log_data.column(col).into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_recorder() -> (TelemetryData, TelemetryRecorder) {
        let mut data = TelemetryData::new();
        data.register_constant("robot", "pendulum").unwrap();
        let slot = data.register_variable("currentPosition.link_0").unwrap();
        let mut recorder = TelemetryRecorder::default();
        recorder.initialize(&mut data);

        for k in 0..3 {
            data.set_iteration(k);
            data.set_time(f64::from(k) * 1e-3);
            data.update_value(slot, f64::from(k) * 0.5);
            recorder.flush_snapshot(&data);
        }
        (data, recorder)
    }

    #[test]
    fn registry_freezes_after_initialize() {
        let (mut data, _recorder) = sample_recorder();
        assert!(data.is_locked());
        assert!(data.register_variable("late").is_err());
        assert!(data.register_constant("late", "1").is_err());
    }

    #[test]
    fn header_layout() {
        let (_, recorder) = sample_recorder();
        let (header, matrix) = recorder.get_log_data();
        assert_eq!(header[0], "robot=pendulum");
        assert!(header.contains(&START_COLUMNS.to_string()));
        assert_eq!(header.last().unwrap(), START_DATA);
        // Columns: Global.Iteration, Global.Time, currentPosition.link_0
        assert_eq!(matrix.ncols(), 3);
        assert_eq!(matrix.nrows(), 3);
        assert_eq!(matrix[(2, 0)], 2.0);
    }

    #[test]
    fn binary_round_trip_is_exact() {
        let (_, recorder) = sample_recorder();
        let path = std::env::temp_dir().join("sim_engine_telemetry_roundtrip.data");
        recorder.write_log_binary(&path).unwrap();

        let (header, matrix) = parse_log_binary(&path).unwrap();
        let (expected_header, expected_matrix) = recorder.get_log_data();
        assert_eq!(header, expected_header);
        assert_eq!(matrix, expected_matrix);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn field_lookup_by_name() {
        let (_, recorder) = sample_recorder();
        let (header, matrix) = recorder.get_log_data();
        let time = get_log_field_value(GLOBAL_TIME, &header, &matrix);
        assert_eq!(time.len(), 3);
        assert!((time[1] - 1e-3).abs() < 1e-9);
        let missing = get_log_field_value("nope", &header, &matrix);
        assert_eq!(missing.len(), 0);
    }
}
