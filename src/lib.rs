//! kubeprep Library
//!
//! This library provides the core functionality for bootstrapping a
//! Kubernetes node: host detection, version resolution, and the container
//! runtime and node tool installers for Ubuntu and Amazon Linux 2023.

pub mod assets;
pub mod bootstrap;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetch;
pub mod host;
pub mod host_command;
pub mod installer;
pub mod layout;
pub mod release;
pub mod report;
pub mod runner;
pub mod sanity;
pub mod types;
pub mod version;

// Re-export main types for convenience
pub use config::BootstrapConfig;
pub use error::{KubeprepError, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use host::HostProfile;
pub use host_command::HostCommand;
pub use installer::{
    AmazonLinuxInstaller, InstallContext, KubetoolsRequest, NodeInstaller, UbuntuInstaller,
    for_host,
};
pub use layout::Layout;
pub use report::{InstallationOutcome, Report};
pub use runner::{CommandOutput, CommandRunner, DryRunRunner, SystemRunner};
pub use types::{Architecture, Distribution, OutcomeStatus};
pub use version::{KubeVersion, VersionResolver, VersionSpec};
