use std::path::PathBuf;
use thiserror::Error;

/// Errors from resolving a picked window to a capture region.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("Window {0} no longer exists")]
    WindowNotFound(u32),
    #[error("Window {0} has zero area")]
    ZeroArea(u32),
    #[error("Failed to enumerate windows: {0}")]
    Enumeration(String),
}

/// Errors from launching the encoder process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LaunchError {
    #[error("Encoder executable not found: {0}. Please install ffmpeg.")]
    ExecutableNotFound(String),
    #[error("Failed to spawn encoder: {0}")]
    SpawnFailed(String),
    #[error("Output file already exists: {}", .0.display())]
    OutputExists(PathBuf),
    #[error("Failed to create recordings directory: {0}")]
    RecordingsDir(String),
}

/// Errors from the free-text configuration fields.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    #[error("{field}: '{value}' is not a valid number")]
    Unparsable { field: &'static str, value: String },
    #[error("{field}: {value} is out of range ({min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },
}

/// Errors observed while supervising a running encoder.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SupervisorError {
    #[error("Encoder exited unexpectedly ({})", exit_label(.exit_code))]
    ProcessCrashed { exit_code: Option<i32> },
    #[error("Failed to signal encoder: {0}")]
    Signal(String),
    #[error("Failed to terminate encoder: {0}")]
    Kill(String),
}

fn exit_label(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Top-level error type for session operations.
///
/// Every variant is recoverable: the controller renders it into the display
/// snapshot and keeps running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Config(#[from] ConfigValidationError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error("Select a window before starting")]
    NoWindowSelected,
    #[error("No recording in progress")]
    NotRecording,
    #[error("Recording already in progress")]
    AlreadyRecording,
    #[error("Failed to remove output file: {0}")]
    StorageError(String),
}
