use thiserror::Error;

/// Calibration-level errors using thiserror for structured error handling.
///
/// Pipeline-internal conditions (pattern not found, worker busy) are normal
/// outcomes and never show up here. Only construction failures, worker
/// death, solver failures and flow misuse cross the session boundary.

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid pattern geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid target observation count: {0}")]
    InvalidTarget(usize),

    #[error("Failed to allocate {bytes} bytes for detection buffers")]
    BufferAllocation { bytes: usize },

    #[error("Failed to start detection worker thread")]
    WorkerSpawn(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSizeMismatch { expected: usize, actual: usize },

    #[error("Detection worker terminated unexpectedly")]
    WorkerTerminated,

    #[error("Detection worker panicked")]
    WorkerPanicked,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Solver did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("Degenerate calibration input: {0}")]
    Degenerate(String),

    #[error("Not enough observations: have {have}, need {need}")]
    InsufficientObservations { have: usize, need: usize },
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Flow has not been started")]
    NotStarted,

    #[error("No active calibration session")]
    NoActiveSession,

    #[error("Detection pipeline failed")]
    Detection(#[from] DetectionError),

    #[error("Failed to create calibration session")]
    Session(#[from] SessionError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to locate the platform config directory")]
    NoConfigDir,
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = SessionError::InvalidDimensions {
            width: 0,
            height: 480,
        };
        assert_eq!(err.to_string(), "Invalid image dimensions: 0x480");

        let err = SolverError::InsufficientObservations { have: 3, need: 10 };
        assert_eq!(err.to_string(), "Not enough observations: have 3, need 10");
    }

    #[test]
    fn test_flow_error_wraps_detection_error() {
        let err: FlowError = DetectionError::WorkerTerminated.into();
        assert_eq!(err.to_string(), "Detection pipeline failed");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_source_chain() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let config_err = ConfigError::LoadFailed {
            path: "/test/config.json".to_string(),
            source: Box::new(io_err),
        };

        assert!(config_err.source().is_some());
        assert_eq!(
            config_err.to_string(),
            "Failed to load configuration from /test/config.json"
        );
    }
}
