//! Build errors.

use abiforge_targets::TargetError;
use thiserror::Error;

/// Errors that can occur during a build run.
///
/// Configuration and host errors surface through [`BuildError::Target`]
/// before any target is attempted.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("build failed for target {target}: {detail}")]
    BuildFailure {
        target: String,
        exit_code: Option<i32>,
        detail: String,
    },

    #[error("verification failed: {warnings} warning(s) across {artifacts} artifact(s)")]
    VerificationFailed { artifacts: usize, warnings: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// True for errors raised before any build work starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BuildError::Target(
                TargetError::MissingConfiguration { .. } | TargetError::UnsupportedHost { .. }
            )
        )
    }
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;
