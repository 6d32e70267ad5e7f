use std::path::PathBuf;
use std::process::ExitStatus;

use crate::models::DeviceId;

/// Failures of the device-info provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("device query output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("malformed device line {line:?}: {reason}")]
    Parse { line: String, reason: String },
}

/// Failures loading a monitor config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("device setup failed: {0}")]
    Setup(#[source] ProviderError),

    #[error("device provider reported no GPUs")]
    NoDevices,

    #[error("snapshot fetch failed: {0}")]
    SnapshotFetch(#[source] ProviderError),

    #[error("device {0} was not seen during setup")]
    UnknownDevice(DeviceId),

    #[error("invalid monitor config: {0}")]
    InvalidConfig(String),

    #[error("device registration is closed, rejected {0}")]
    RegistrationClosed(DeviceId),

    #[error("device {0} is already registered")]
    DuplicateDevice(DeviceId),

    #[error("monitor has not been set up")]
    NotSetUp,

    #[error("monitor is already running")]
    AlreadyRunning,
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
