use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("hour {0} is outside 0..=23")]
    HourOutOfRange(u8),
}

/// Failure of a single sensor query.
///
/// Everything except [`SensorError::Interrupted`] is transient and retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("sensor query timed out")]
    Timeout,
    #[error("no data for sensor {0}")]
    NoData(String),
    #[error("sensor transport error: {0}")]
    Transport(String),
    #[error("sensor query interrupted")]
    Interrupted,
}

/// Operator requested cancellation. Never absorbed as a sensor failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interrupted by operator")]
pub struct Interrupted;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error(transparent)]
    Window(#[from] WindowError),
}

#[derive(Debug, Error)]
pub enum PlugError {
    #[error("failed to launch plug command `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("plug command interrupted by operator")]
    Interrupted,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
