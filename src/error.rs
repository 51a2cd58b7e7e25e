//! Error taxonomy shared by the store, dataset builder, dispatch engine and environment.
//!
//! Fatal conditions are typed errors. Physical saturation is never an
//! error; it travels as [`crate::dispatch::Clip`] values inside the step info.

use thiserror::Error;

use crate::config::ConfigError;

/// Failures while loading a dataset into the [`crate::store::TimeseriesStore`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("column `{column}` has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("required field `{0}` is missing")]
    MissingField(String),
    #[error("timestamps are not strictly hourly at row {row}: {previous} -> {current}")]
    NotHourly {
        row: usize,
        previous: String,
        current: String,
    },
    #[error("column `{column}` holds a non-finite value at row {row}")]
    NonFinite { column: String, row: usize },
    #[error("socket count mismatch: schema lists {schema}, table holds {table}")]
    SocketCountMismatch { schema: usize, table: usize },
}

/// Range violations found while validating upstream artifacts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataRangeError {
    #[error("{series}: negative value {value} at row {row}")]
    Negative {
        series: &'static str,
        row: usize,
        value: f64,
    },
    #[error("{series}: value {value} at row {row} must be positive")]
    NotPositive {
        series: &'static str,
        row: usize,
        value: f64,
    },
    #[error("{series}: non-finite value {value} at row {row}")]
    NonFinite {
        series: &'static str,
        row: usize,
        value: f64,
    },
    #[error("pv: {value} kWh at hour {row} exceeds installed AC capacity {limit} kW")]
    AboveInstalledAc { row: usize, value: f64, limit: f64 },
    #[error("socket {socket}: soc {value} at row {row} is outside [0, 1] (also as percent)")]
    SocOutOfRange {
        socket: String,
        row: usize,
        value: f64,
    },
    #[error("{series}: unsupported cadence of {minutes} minutes (expected 60 or 15)")]
    UnsupportedCadence { series: &'static str, minutes: i64 },
    #[error("{series}: hour {hour} is missing or incomplete")]
    MissingHour { series: &'static str, hour: String },
    #[error("{series}: expected {expected} hourly rows, found {actual}")]
    WrongLength {
        series: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{series}: row {row}: {message}")]
    Parse {
        series: &'static str,
        row: usize,
        message: String,
    },
}

/// Errors surfaced while building or re-opening a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Range(#[from] DataRangeError),
    #[error("io error on `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("inconsistent dataset: {0}")]
    Inconsistent(String),
}

/// Rejected agent actions. Any of these aborts the episode.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    #[error("action has {actual} entries, expected {expected}")]
    WrongShape { expected: usize, actual: usize },
    #[error("action entry {index} is not finite ({value})")]
    NonFinite { index: usize, value: f64 },
    #[error("action entry {index} = {value} is outside [-1, 1]")]
    OutOfBounds { index: usize, value: f64 },
}

/// Violated engine invariants. These indicate a caller or engine bug.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("bess soc {soc} is outside [{soc_min}, {soc_max}]")]
    InfeasibleSoc { soc: f64, soc_min: f64, soc_max: f64 },
    #[error("negative energy input `{field}` = {value}")]
    NegativeInput { field: &'static str, value: f64 },
    #[error("bess charged {charge_kwh} kWh and discharged {discharge_kwh} kWh in the same step")]
    SimultaneousChargeDischarge { charge_kwh: f64, discharge_kwh: f64 },
    #[error("{balance} balance off by {residual} kWh at step {step}")]
    Imbalance {
        balance: &'static str,
        step: usize,
        residual: f64,
    },
    #[error("control vector has {actual} socket commands, expected {expected}")]
    SocketCountMismatch { expected: usize, actual: usize },
}

/// Errors returned by [`crate::env::Environment`].
#[derive(Debug, Error)]
pub enum EnvError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("invalid configuration: {}", format_config_errors(.0))]
    InvalidConfig(Vec<ConfigError>),
    #[error("step called before reset")]
    NotReset,
    #[error("episode already terminated after {0} steps; call reset")]
    EpisodeFinished(usize),
}

fn format_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<SchemaError> for EnvError {
    fn from(err: SchemaError) -> Self {
        Self::Dataset(DatasetError::Schema(err))
    }
}
