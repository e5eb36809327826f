//! containerd and runc release artifacts
//!
//! Latest tags come from the GitHub releases API; binaries and the
//! containerd systemd unit come from GitHub release downloads and raw
//! content.

use std::fs::File;
use std::io;
use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{KubeprepError, Result};
use crate::fetch::Fetcher;
use crate::types::Architecture;

const GITHUB_API: &str = "https://api.github.com/repos";
const GITHUB: &str = "https://github.com";

/// Upstream source of the containerd systemd unit
pub const CONTAINERD_UNIT_URL: &str =
    "https://raw.githubusercontent.com/containerd/containerd/main/containerd.service";

/// A GitHub project publishing binary releases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Project {
    Containerd,
    Runc,
}

impl Project {
    /// `owner/repo` slug on GitHub
    pub fn slug(self) -> &'static str {
        match self {
            Self::Containerd => "containerd/containerd",
            Self::Runc => "opencontainers/runc",
        }
    }

    pub fn latest_release_url(self) -> String {
        format!("{GITHUB_API}/{}/releases/latest", self.slug())
    }

    /// Release asset name for a version and platform.
    pub fn asset_name(self, version: &str, arch: Architecture) -> String {
        match self {
            Self::Containerd => {
                format!("containerd-{version}-linux-{}.tar.gz", arch.as_platform())
            }
            Self::Runc => format!("runc.{}", arch.as_platform()),
        }
    }

    /// Download URL of the release asset.
    pub fn asset_url(self, version: &str, arch: Architecture) -> String {
        format!(
            "{GITHUB}/{}/releases/download/v{version}/{}",
            self.slug(),
            self.asset_name(version, arch)
        )
    }
}

/// GitHub API response for releases
#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
}

/// Look up the latest release of `project`, without the `v` prefix.
pub fn latest_version(fetcher: &dyn Fetcher, project: Project) -> Result<String> {
    let url = project.latest_release_url();
    let body = fetcher.fetch_text(&url)?;
    let release: GitHubRelease = serde_json::from_str(&body)
        .map_err(|e| KubeprepError::network(&url, format!("unexpected response: {e}")))?;

    let version = normalize_version(&release.tag_name);
    if version.is_empty() {
        return Err(KubeprepError::network(&url, "release has an empty tag"));
    }
    info!("Latest {} release is {}", project.slug(), version);
    Ok(version)
}

/// Use `pinned` if set, otherwise the latest release.
pub fn resolve_version(
    fetcher: &dyn Fetcher,
    project: Project,
    pinned: Option<&str>,
) -> Result<String> {
    match pinned {
        Some(version) => Ok(normalize_version(version)),
        None => latest_version(fetcher, project),
    }
}

/// Strip whitespace and a leading `v` from a release tag.
pub fn normalize_version(tag: &str) -> String {
    let tag = tag.trim();
    tag.strip_prefix('v').unwrap_or(tag).to_string()
}

/// Returns true if `version` looks like a release version (`1.7.22`,
/// `1.2.0-rc.1`).
pub fn is_release_version(version: &str) -> bool {
    let core = version.split_once('-').map_or(version, |(core, _)| core);
    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Digest from a `.sha256sum` file (`<hex>  <file name>`).
pub fn parse_checksum_file(text: &str) -> Option<String> {
    let digest = text.split_whitespace().next()?;
    (digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit()))
        .then(|| digest.to_ascii_lowercase())
}

/// Hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check `path` against the published checksum text.
pub fn verify_sha256(path: &Path, checksum_text: &str) -> Result<()> {
    let file = path.display().to_string();
    let expected = parse_checksum_file(checksum_text).ok_or_else(|| KubeprepError::Checksum {
        file: file.clone(),
        expected: checksum_text.trim().to_string(),
        actual: "<unparseable checksum file>".to_string(),
    })?;
    let actual = sha256_file(path)?;
    if actual != expected {
        return Err(KubeprepError::Checksum {
            file,
            expected,
            actual,
        });
    }
    debug!("{} matches sha256 {}", file, actual);
    Ok(())
}
