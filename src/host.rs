//! Host environment detection
//!
//! Detects the OS distribution, its version and the CPU architecture, and
//! folds them into one immutable `HostProfile` built at startup.
//!
//! # Design
//!
//! - **Fail Fast**: unreadable `os-release`, an unknown architecture or an
//!   unsupported distribution are fatal errors, never guessed defaults.
//! - **No shelling out**: `os-release` is parsed directly and the machine
//!   string comes from `uname(2)` via nix.

use std::collections::HashMap;
use std::fmt;
use std::fs;

use tracing::{debug, info};

use crate::error::{KubeprepError, Result};
use crate::layout::Layout;
use crate::types::{Architecture, Distribution};

/// Location of the os-release file on the host
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Facts about the host, derived once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProfile {
    /// Supported distribution family
    pub distribution: Distribution,
    /// `NAME` as reported by os-release
    pub name: String,
    /// `VERSION_ID` as reported by os-release
    pub version_id: String,
    /// Normalized CPU architecture
    pub architecture: Architecture,
}

impl HostProfile {
    /// Detect the host profile.
    ///
    /// Reads `os-release` under the layout root and the machine string from
    /// `uname(2)`.
    pub fn detect(layout: &Layout) -> Result<Self> {
        let path = layout.resolve(OS_RELEASE_PATH);
        let text = fs::read_to_string(&path).map_err(|e| {
            KubeprepError::os_detection(format!("cannot read {}: {}", path.display(), e))
        })?;
        let uts = nix::sys::utsname::uname()
            .map_err(|e| KubeprepError::os_detection(format!("uname failed: {e}")))?;
        let machine = uts.machine().to_string_lossy().into_owned();

        let profile = Self::from_os_release(&text, &machine)?;
        info!("Host detection: {}", profile);
        Ok(profile)
    }

    /// Build a profile from os-release text and a machine string.
    pub fn from_os_release(text: &str, machine: &str) -> Result<Self> {
        let fields = parse_os_release(text);
        let name = fields
            .get("NAME")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| KubeprepError::os_detection("os-release has no NAME"))?
            .clone();
        let version_id = fields
            .get("VERSION_ID")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| KubeprepError::os_detection("os-release has no VERSION_ID"))?
            .clone();
        debug!("os-release NAME={:?} VERSION_ID={:?}", name, version_id);

        let distribution = classify_distribution(&name, &version_id)?;
        let architecture = Architecture::from_machine(machine)?;

        Ok(Self {
            distribution,
            name,
            version_id,
            architecture,
        })
    }
}

impl fmt::Display for HostProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.distribution, self.version_id, self.architecture
        )
    }
}

/// Parse os-release `KEY=value` lines, stripping shell quoting.
pub fn parse_os_release(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (key.trim().to_string(), unquoted.to_string())
        })
        .collect()
}

/// Map os-release identity onto a supported distribution.
///
/// Amazon Linux must be 2023; Ubuntu must be 20 or newer.
pub fn classify_distribution(name: &str, version_id: &str) -> Result<Distribution> {
    let unsupported = || KubeprepError::UnsupportedOs {
        name: name.to_string(),
        version: version_id.to_string(),
    };

    if name.starts_with("Amazon Linux") {
        if version_id.starts_with("2023") {
            return Ok(Distribution::AmazonLinux);
        }
        return Err(unsupported());
    }

    if name.starts_with("Ubuntu") {
        let major = version_id
            .split('.')
            .next()
            .and_then(|m| m.parse::<u32>().ok())
            .ok_or_else(unsupported)?;
        if major >= 20 {
            return Ok(Distribution::Ubuntu);
        }
    }

    Err(unsupported())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UBUNTU_2204: &str = r#"PRETTY_NAME="Ubuntu 22.04.4 LTS"
NAME="Ubuntu"
VERSION_ID="22.04"
VERSION="22.04.4 LTS (Jammy Jellyfish)"
ID=ubuntu
ID_LIKE=debian
"#;

    const AL2023: &str = r#"NAME="Amazon Linux"
VERSION="2023"
ID="amzn"
ID_LIKE="fedora"
VERSION_ID="2023"
PLATFORM_ID="platform:al2023"
PRETTY_NAME="Amazon Linux 2023.5.20240805"
"#;

    #[test]
    fn test_parse_os_release_strips_quotes() {
        let fields = parse_os_release(UBUNTU_2204);
        assert_eq!(fields.get("NAME").map(String::as_str), Some("Ubuntu"));
        assert_eq!(fields.get("ID").map(String::as_str), Some("ubuntu"));
        assert_eq!(fields.get("VERSION_ID").map(String::as_str), Some("22.04"));
    }

    #[test]
    fn test_profile_ubuntu_amd64() {
        let profile = HostProfile::from_os_release(UBUNTU_2204, "x86_64").unwrap();
        assert_eq!(profile.distribution, Distribution::Ubuntu);
        assert_eq!(profile.architecture, Architecture::Amd64);
        assert_eq!(profile.to_string(), "Ubuntu 22.04 (amd64)");
    }

    #[test]
    fn test_profile_amazon_linux_arm64() {
        let profile = HostProfile::from_os_release(AL2023, "aarch64").unwrap();
        assert_eq!(profile.distribution, Distribution::AmazonLinux);
        assert_eq!(profile.architecture, Architecture::Arm64);
    }

    #[test]
    fn test_missing_fields_are_detection_errors() {
        let err = HostProfile::from_os_release("ID=ubuntu\n", "x86_64").unwrap_err();
        assert!(matches!(err, KubeprepError::OsDetection(_)));
        assert_eq!(err.exit_code(), 1);

        let err = HostProfile::from_os_release("NAME=\"Ubuntu\"\n", "x86_64").unwrap_err();
        assert!(matches!(err, KubeprepError::OsDetection(_)));
    }

    #[test]
    fn test_unsupported_architecture() {
        let err = HostProfile::from_os_release(UBUNTU_2204, "ppc64le").unwrap_err();
        assert!(matches!(err, KubeprepError::UnsupportedArchitecture(_)));
    }

    #[test]
    fn test_classify_distribution() {
        assert_eq!(
            classify_distribution("Ubuntu", "20.04").unwrap(),
            Distribution::Ubuntu
        );
        assert_eq!(
            classify_distribution("Ubuntu", "24.10").unwrap(),
            Distribution::Ubuntu
        );
        assert_eq!(
            classify_distribution("Amazon Linux", "2023").unwrap(),
            Distribution::AmazonLinux
        );

        for (name, version) in [
            ("Ubuntu", "18.04"),
            ("Amazon Linux", "2"),
            ("Fedora Linux", "40"),
            ("Debian GNU/Linux", "12"),
            ("Ubuntu", "jammy"),
        ] {
            let err = classify_distribution(name, version).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{name} {version} should be unsupported");
        }
    }

    #[test]
    fn test_detect_reads_layout_root() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::create_dir_all(dir.path().join("etc")).unwrap();
        std::fs::write(dir.path().join("etc/os-release"), AL2023).unwrap();

        // Only x86_64 and aarch64 build hosts can map their own machine string
        match HostProfile::detect(&layout) {
            Ok(profile) => assert_eq!(profile.distribution, Distribution::AmazonLinux),
            Err(err) => assert!(matches!(err, KubeprepError::UnsupportedArchitecture(_))),
        }
    }

    #[test]
    fn test_detect_without_os_release_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = HostProfile::detect(&Layout::new(dir.path())).unwrap_err();
        assert!(matches!(err, KubeprepError::OsDetection(_)));
    }
}
