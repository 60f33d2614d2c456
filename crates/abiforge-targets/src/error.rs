//! Error types for target and toolchain operations.

use std::path::PathBuf;

/// Errors that can occur while resolving targets or the toolchain.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// The toolchain root was not supplied.
    #[error("missing configuration: {what} is not set (export ANDROID_NDK_HOME or pass --ndk-home)")]
    MissingConfiguration {
        /// The missing input.
        what: String,
    },

    /// No known prebuilt layout matches the running host.
    #[error("unsupported host {host}: {detail}")]
    UnsupportedHost {
        /// Host descriptor, e.g. `linux-x86_64`.
        host: String,
        /// What was probed and why it did not match.
        detail: String,
    },

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O error reading catalog or toolchain files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog file not found.
    #[error("catalog file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// A target name did not resolve against the catalog.
    #[error("unknown target '{name}'")]
    UnknownTarget { name: String },

    /// Validation error in a catalog definition.
    #[error("validation error: {detail}")]
    Validation {
        /// Description of the validation failure.
        detail: String,
    },
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;
