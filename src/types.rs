//! Type-safe host and outcome types for kubeprep
//!
//! Closed sets of supported distributions and architectures, and the
//! per-component outcome classes shown in the terminal report.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::{KubeprepError, Result};

/// Supported Linux distribution families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display)]
pub enum Distribution {
    #[strum(serialize = "Ubuntu")]
    Ubuntu,
    #[strum(serialize = "Amazon Linux")]
    AmazonLinux,
}

impl Distribution {
    /// Package manager driving this distribution
    pub fn package_manager(self) -> PackageManagerKind {
        match self {
            Self::Ubuntu => PackageManagerKind::Apt,
            Self::AmazonLinux => PackageManagerKind::Dnf,
        }
    }
}

/// Normalized platform tag used in release artifact names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display)]
#[strum(serialize_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
}

impl Architecture {
    /// Map a `uname -m` machine string onto a platform tag.
    pub fn from_machine(machine: &str) -> Result<Self> {
        match machine.trim() {
            "x86_64" => Ok(Self::Amd64),
            "aarch64" => Ok(Self::Arm64),
            other => Err(KubeprepError::UnsupportedArchitecture(other.to_string())),
        }
    }

    /// Platform tag as it appears in download URLs
    pub fn as_platform(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

/// Package manager family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PackageManagerKind {
    Apt,
    Dnf,
}

/// Result class of one bootstrap component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display)]
#[strum(serialize_all = "kebab-case")]
pub enum OutcomeStatus {
    /// Installed, written or enabled by this run
    Installed,
    /// Already in the desired state, nothing changed
    AlreadyPresent,
    /// Removed by this run
    Removed,
    /// Known-safe failure that was logged and ignored
    Tolerated,
    /// Failed; the run aborted here
    Failed,
}

impl OutcomeStatus {
    /// Returns true if the component ended up in the desired state.
    pub fn is_ok(self) -> bool {
        !matches!(self, Self::Failed)
    }

    /// Marker glyph for the terminal report
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Installed | Self::Removed => "✓",
            Self::AlreadyPresent => "=",
            Self::Tolerated => "~",
            Self::Failed => "✗",
        }
    }
}
