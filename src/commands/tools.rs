//! Version queries for installed tools.

use std::path::PathBuf;

use crate::host_command::HostCommand;

/// A tool's version subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolVersion {
    /// `<path> --version` for release binaries (containerd, runc)
    Binary(PathBuf),
    /// `kubeadm version -o short`
    Kubeadm,
    /// `kubectl version --client`
    Kubectl,
}

impl HostCommand for ToolVersion {
    fn program(&self) -> String {
        match self {
            Self::Binary(path) => path.display().to_string(),
            Self::Kubeadm => "kubeadm".to_string(),
            Self::Kubectl => "kubectl".to_string(),
        }
    }

    fn to_cli_args(&self) -> Vec<String> {
        match self {
            Self::Binary(_) => vec!["--version".to_string()],
            Self::Kubeadm => vec!["version".to_string(), "-o".to_string(), "short".to_string()],
            Self::Kubectl => vec!["version".to_string(), "--client".to_string()],
        }
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

/// Returns true if `--version` output names `version` as a whole token.
///
/// containerd prints `containerd github.com/containerd/containerd v1.7.22 <sha>`,
/// runc prints `runc version 1.1.14` on its first line.
pub fn reports_version(output: &str, version: &str) -> bool {
    let wanted = version.trim_start_matches('v');
    output
        .split_whitespace()
        .any(|token| token.trim_start_matches('v') == wanted)
}
