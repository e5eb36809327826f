//! Run configuration
//!
//! `BootstrapConfig` can be loaded from a JSON file (`--config`); command
//! line flags are applied on top of it. Every field has a default, so an
//! empty `{}` file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::release::{is_release_version, normalize_version};

/// Default runtime-setup marker
pub const DEFAULT_MARKER_PATH: &str = "/var/lib/kubeprep/container-runtime.done";
/// Default download directory
pub const DEFAULT_WORK_DIR: &str = "/tmp/kubeprep";

/// Configuration for one bootstrap run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Prefix for every host path
    pub root: PathBuf,
    /// Marker written when the container runtime is set up (host path)
    pub marker_path: PathBuf,
    /// Pinned containerd release; latest when unset
    pub containerd_version: Option<String>,
    /// Pinned runc release; latest when unset
    pub runc_version: Option<String>,
    /// Hold (apt) or versionlock (dnf) the node tools after install
    pub hold_packages: bool,
    /// Verify the containerd tarball against its published digest
    pub verify_checksums: bool,
    /// Download directory (host path)
    pub work_dir: PathBuf,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            marker_path: PathBuf::from(DEFAULT_MARKER_PATH),
            containerd_version: None,
            runc_version: None,
            hold_packages: true,
            verify_checksums: true,
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
        }
    }
}

impl BootstrapConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            anyhow::bail!("root must not be empty");
        }

        for (name, path) in [("marker_path", &self.marker_path), ("work_dir", &self.work_dir)] {
            if path.as_os_str().is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
            if !path.is_absolute() {
                anyhow::bail!("{} must be an absolute path, got {:?}", name, path);
            }
        }

        for (name, pin) in [
            ("containerd_version", &self.containerd_version),
            ("runc_version", &self.runc_version),
        ] {
            if let Some(version) = pin {
                if !is_release_version(&normalize_version(version)) {
                    anyhow::bail!("{} must look like 1.7.22, got {:?}", name, version);
                }
            }
        }

        Ok(())
    }
}
