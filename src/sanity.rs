//! Pre-flight checks for the runtime environment
//!
//! Verified before any host change:
//! - Required binaries are present in PATH
//! - Running with root privileges (EUID 0)
//!
//! The root check is skipped for dry runs, for a non-`/` root prefix and
//! when `KUBEPREP_SKIP_ROOT_CHECK=1` is set.

use tracing::{debug, info, warn};

use crate::error::{KubeprepError, Result};
use crate::types::{Distribution, PackageManagerKind};

/// Environment variable that disables the root check
pub const SKIP_ROOT_ENV: &str = "KUBEPREP_SKIP_ROOT_CHECK";

/// Binaries every flow invokes and none installs. `tar`, `curl` and `gpg`
/// come with the runtime prerequisites.
const REQUIRED_BINARIES: &[&str] = &["systemctl", "modprobe", "sysctl", "install"];

/// Result of environment verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }

    /// One-line description of every failed check.
    pub fn describe(&self) -> String {
        let mut problems = Vec::new();
        if !self.is_root {
            problems.push("root privileges required (run with sudo)".to_string());
        }
        if !self.missing_binaries.is_empty() {
            problems.push(format!(
                "missing required binaries: {}",
                self.missing_binaries.join(", ")
            ));
        }
        problems.join("; ")
    }
}

/// Package manager binaries used on `distribution`.
pub fn package_manager_binaries(distribution: Distribution) -> &'static [&'static str] {
    match distribution.package_manager() {
        PackageManagerKind::Apt => &["apt-get", "apt-mark", "dpkg-query"],
        PackageManagerKind::Dnf => &["dnf", "rpm"],
    }
}

/// Every binary that must be present before a flow starts on `distribution`.
pub fn required_binaries(distribution: Distribution) -> Vec<&'static str> {
    REQUIRED_BINARIES
        .iter()
        .chain(package_manager_binaries(distribution))
        .copied()
        .collect()
}

/// Check if a binary is available in PATH
pub fn binary_exists(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Check if running as root (EUID 0)
fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Perform all checks and return the result
pub fn verify_environment(distribution: Distribution) -> SanityCheckResult {
    let missing_binaries = required_binaries(distribution)
        .into_iter()
        .filter(|binary| !binary_exists(binary))
        .map(|binary| binary.to_string())
        .collect();

    SanityCheckResult {
        missing_binaries,
        is_root: is_running_as_root(),
    }
}

/// Returns true if `KUBEPREP_SKIP_ROOT_CHECK` is set to `1` or `true`.
pub fn should_skip_root_check() -> bool {
    std::env::var(SKIP_ROOT_ENV)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Run pre-flight checks.
///
/// `skip_root` disables the root check; `dry_run` downgrades missing
/// binaries to a warning since nothing is executed.
pub fn run_preflight_checks(distribution: Distribution, skip_root: bool, dry_run: bool) -> Result<()> {
    debug!(
        "Running pre-flight checks (skip_root={}, dry_run={})...",
        skip_root, dry_run
    );

    let mut result = verify_environment(distribution);

    if skip_root || dry_run || should_skip_root_check() {
        if !result.is_root {
            warn!("Root check skipped");
        }
        result.is_root = true;
    }

    if dry_run && !result.missing_binaries.is_empty() {
        warn!(
            "Missing binaries (ignored for dry run): {}",
            result.missing_binaries.join(", ")
        );
        result.missing_binaries.clear();
    }

    if !result.is_ok() {
        return Err(KubeprepError::preflight(result.describe()));
    }

    info!("Pre-flight checks passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_exists() {
        assert!(binary_exists("sh"), "sh should be available");
        assert!(!binary_exists("this_binary_definitely_does_not_exist_12345"));
    }

    #[test]
    fn test_package_manager_binaries() {
        assert!(package_manager_binaries(Distribution::Ubuntu).contains(&"dpkg-query"));
        assert_eq!(package_manager_binaries(Distribution::AmazonLinux), &["dnf", "rpm"]);
    }

    #[test]
    fn test_sanity_result_is_ok() {
        let ok_result = SanityCheckResult {
            missing_binaries: vec![],
            is_root: true,
        };
        assert!(ok_result.is_ok());
        assert_eq!(ok_result.describe(), "");

        let both = SanityCheckResult {
            missing_binaries: vec!["dnf".to_string(), "rpm".to_string()],
            is_root: false,
        };
        assert!(!both.is_ok());
        assert_eq!(
            both.describe(),
            "root privileges required (run with sudo); missing required binaries: dnf, rpm"
        );
    }

    #[test]
    fn test_prerequisite_binaries_not_required() {
        for distribution in [Distribution::Ubuntu, Distribution::AmazonLinux] {
            let required = required_binaries(distribution);
            for installed_by_flow in ["tar", "curl", "gpg"] {
                assert!(
                    !required.contains(&installed_by_flow),
                    "{installed_by_flow} is installed by the {distribution} flow"
                );
            }
            assert!(required.contains(&"systemctl"));
        }
        assert!(required_binaries(Distribution::AmazonLinux).contains(&"rpm"));
    }

    #[test]
    fn test_dry_run_never_fails() {
        assert!(run_preflight_checks(Distribution::AmazonLinux, false, true).is_ok());
    }
}
