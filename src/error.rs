//! Error handling module for kubeprep
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Every fatal condition of a bootstrap run is one of these variants, and
//! `exit_code()` maps it onto the process exit status.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for kubeprep
#[derive(Error, Debug)]
pub enum KubeprepError {
    /// IO errors (file writes, reading os-release, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// OS metadata could not be read or is incomplete
    #[error("OS detection failed: {0}")]
    OsDetection(String),

    /// Machine architecture has no release artifacts
    #[error("Unsupported architecture: {0} (supported: x86_64, aarch64)")]
    UnsupportedArchitecture(String),

    /// Distribution or distribution version is not supported
    #[error("Unsupported OS: {name} {version} (supported: Ubuntu 20.04+, Amazon Linux 2023)")]
    UnsupportedOs { name: String, version: String },

    /// Malformed version string
    #[error("Invalid version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    /// Release endpoint unreachable or returned nothing usable
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Downloaded artifact does not match its published digest
    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    Checksum {
        file: String,
        expected: String,
        actual: String,
    },

    /// Runtime setup has not completed on this host
    #[error("Container runtime setup marker {} not found; run `kubeprep container` first", .0.display())]
    MissingMarker(PathBuf),

    /// External program could not be started
    #[error("Failed to execute command '{cmd}': {source}")]
    CommandLaunch {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    /// External program exited non-zero
    #[error("Command failed (exit code {code}): {cmd}: {stderr}")]
    CommandFailed {
        cmd: String,
        code: i32,
        stderr: String,
    },

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pre-flight environment checks failed
    #[error("Pre-flight check failed: {0}")]
    Preflight(String),
}

/// Result type alias for kubeprep operations
pub type Result<T> = std::result::Result<T, KubeprepError>;

/// Exit code for validation, detection, network and command failures.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for an unsupported OS or OS version.
pub const EXIT_UNSUPPORTED_OS: i32 = 2;
/// Exit code when the runtime-setup marker file is missing.
pub const EXIT_MISSING_MARKER: i32 = 4;

impl KubeprepError {
    /// Create an OS detection error
    pub fn os_detection(msg: impl Into<String>) -> Self {
        Self::OsDetection(msg.into())
    }

    /// Create an invalid version error
    pub fn invalid_version(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidVersion {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a network error
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a pre-flight error
    pub fn preflight(msg: impl Into<String>) -> Self {
        Self::Preflight(msg.into())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnsupportedOs { .. } => EXIT_UNSUPPORTED_OS,
            Self::MissingMarker(_) => EXIT_MISSING_MARKER,
            _ => EXIT_FAILURE,
        }
    }
}
