//! Error types for the orchestrator pipeline.
//!
//! Errors carry context that chains through layers:
//! Run → Step → Operation → Detail
//!
//! Every error maps onto one of the user-facing failure categories, which
//! the binary turns into its exit code and terminal message.

use std::io;

use thiserror::Error;

use crate::acquire::AcquireError;
use crate::audio::MergeError;
use crate::media::MediaError;
use crate::video::LooperError;
use crate::viz::VizError;

/// User-facing failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Invalid configuration or inputs, caught before heavy processing.
    Configuration,
    /// A source track could not be fetched or decoded.
    Acquisition,
    /// The pipeline itself failed (external tools, I/O, internal checks).
    Processing,
    /// The run was cancelled.
    Cancelled,
}

impl FailureCategory {
    /// Human-readable label for terminal messages.
    pub fn label(&self) -> &'static str {
        match self {
            FailureCategory::Configuration => "Configuration error",
            FailureCategory::Acquisition => "Acquisition error",
            FailureCategory::Processing => "Processing error",
            FailureCategory::Cancelled => "Cancelled",
        }
    }
}

/// Top-level pipeline error with run context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed during execution.
    #[error("Run '{run_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        run_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// Input validation failed before the pipeline started.
    #[error("Run '{run_name}' failed validation: {message}")]
    ValidationFailed { run_name: String, message: String },

    /// Pipeline was cancelled.
    #[error("Run '{run_name}' was cancelled")]
    Cancelled { run_name: String },

    /// Failed to set up the run (create directories, open logs).
    #[error("Run '{run_name}' setup failed: {message}")]
    SetupFailed { run_name: String, message: String },
}

impl PipelineError {
    /// Create a step failed error.
    pub fn step_failed(
        run_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            run_name: run_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    /// Create a validation failed error.
    pub fn validation_failed(run_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            run_name: run_name.into(),
            message: message.into(),
        }
    }

    /// Create a setup failed error.
    pub fn setup_failed(run_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            run_name: run_name.into(),
            message: message.into(),
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(run_name: impl Into<String>) -> Self {
        Self::Cancelled {
            run_name: run_name.into(),
        }
    }

    /// Failure category for exit codes and terminal messages.
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::StepFailed { source, .. } => source.category(),
            Self::ValidationFailed { .. } => FailureCategory::Configuration,
            Self::Cancelled { .. } => FailureCategory::Cancelled,
            Self::SetupFailed { .. } => FailureCategory::Processing,
        }
    }
}

/// Error from a pipeline step with operation context.
#[derive(Error, Debug)]
pub enum StepError {
    /// Input validation failed.
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// Output validation failed.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// A track could not be acquired.
    #[error("track '{source_desc}' could not be acquired: {source}")]
    Acquire {
        source_desc: String,
        #[source]
        source: AcquireError,
    },

    /// Crossfade merge failed.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// The media subsystem failed.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// Visualization setup failed.
    #[error(transparent)]
    Viz(#[from] VizError),

    /// Background looper setup failed.
    #[error(transparent)]
    Looper(#[from] LooperError),

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Generic step error with message.
    #[error("{0}")]
    Other(String),
}

impl StepError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    /// Create an acquisition error with track context.
    pub fn acquire(source_desc: impl Into<String>, source: AcquireError) -> Self {
        Self::Acquire {
            source_desc: source_desc.into(),
            source,
        }
    }

    /// Create an I/O error with context.
    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Failure category for this step error.
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::InvalidInput(_) => FailureCategory::Configuration,
            Self::Acquire { .. } => FailureCategory::Acquisition,
            // Format mismatches mean a bad buffer slipped past acquisition
            Self::Merge(MergeError::SampleRateMismatch { .. })
            | Self::Merge(MergeError::ChannelMismatch { .. }) => FailureCategory::Processing,
            Self::Merge(_) => FailureCategory::Configuration,
            Self::Viz(_) | Self::Looper(_) => FailureCategory::Configuration,
            Self::InvalidOutput(_) | Self::Media(_) | Self::Io { .. } | Self::Other(_) => {
                FailureCategory::Processing
            }
        }
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_displays_context() {
        let err = StepError::io_error(
            "writing tracklist",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("writing tracklist"));
    }

    #[test]
    fn pipeline_error_chains_context() {
        let step_err = StepError::invalid_input("track list is empty");
        let pipeline_err = PipelineError::step_failed("mix_001", "Acquire", step_err);

        let msg = pipeline_err.to_string();
        assert!(msg.contains("mix_001"));
        assert!(msg.contains("Acquire"));
    }

    #[test]
    fn categories_map_as_documented() {
        assert_eq!(
            StepError::invalid_input("x").category(),
            FailureCategory::Configuration
        );
        assert_eq!(
            StepError::from(MergeError::EmptyMix).category(),
            FailureCategory::Configuration
        );
        assert_eq!(
            StepError::from(MergeError::SampleRateMismatch {
                title: "t".into(),
                actual: 48000,
                expected: 44100,
            })
            .category(),
            FailureCategory::Processing
        );
        assert_eq!(
            PipelineError::validation_failed("r", "bad").category(),
            FailureCategory::Configuration
        );
        assert_eq!(
            PipelineError::cancelled("r").category(),
            FailureCategory::Cancelled
        );
    }
}
