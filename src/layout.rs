//! Host filesystem layout
//!
//! All host paths kubeprep touches are absolute (`/etc/containerd/config.toml`,
//! `/usr/local/sbin/runc`, ...). `Layout` maps them onto a root prefix so a
//! run can target `/` in production or a staging directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::types::OutcomeStatus;

/// Root prefix for host paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout for the live host (`/`)
    pub fn host() -> Self {
        Self::new("/")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if paths resolve onto the live host.
    pub fn is_host_root(&self) -> bool {
        self.root == Path::new("/")
    }

    /// Resolve an absolute host path under the root prefix.
    ///
    /// The path is joined as given; only its leading `/` is dropped.
    pub fn resolve(&self, host_path: impl AsRef<Path>) -> PathBuf {
        let host_path = host_path.as_ref();
        let relative = host_path.strip_prefix("/").unwrap_or(host_path);
        self.root.join(relative)
    }

    /// Write `content` to a host path unless it already holds exactly that.
    ///
    /// Parent directories are created. Returns `AlreadyPresent` when the file
    /// was left untouched.
    pub fn write_if_changed(
        &self,
        host_path: impl AsRef<Path>,
        content: &[u8],
    ) -> io::Result<OutcomeStatus> {
        let path = self.resolve(host_path);
        if let Ok(existing) = fs::read(&path) {
            if existing == content {
                return Ok(OutcomeStatus::AlreadyPresent);
            }
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(OutcomeStatus::Installed)
    }

    /// Returns true if the content at a host path equals `content`.
    pub fn matches(&self, host_path: impl AsRef<Path>, content: &[u8]) -> bool {
        fs::read(self.resolve(host_path)).is_ok_and(|existing| existing == content)
    }

    pub fn exists(&self, host_path: impl AsRef<Path>) -> bool {
        self.resolve(host_path).exists()
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_on_host_root() {
        let layout = Layout::host();
        assert!(layout.is_host_root());
        assert_eq!(
            layout.resolve("/etc/sysctl.d/k8s.conf"),
            PathBuf::from("/etc/sysctl.d/k8s.conf")
        );
    }

    #[test]
    fn test_resolve_under_prefix_keeps_path_components() {
        let layout = Layout::new("/srv/stage");
        assert!(!layout.is_host_root());
        assert_eq!(
            layout.resolve("/etc/../etc/crictl.yaml"),
            PathBuf::from("/srv/stage/etc/../etc/crictl.yaml")
        );
        assert_eq!(
            layout.resolve("/usr/local/sbin/runc"),
            PathBuf::from("/srv/stage/usr/local/sbin/runc")
        );
    }

    #[test]
    fn test_write_if_changed_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());

        let first = layout
            .write_if_changed("/etc/modules-load.d/k8s.conf", b"overlay\n")
            .unwrap();
        assert_eq!(first, OutcomeStatus::Installed);

        let second = layout
            .write_if_changed("/etc/modules-load.d/k8s.conf", b"overlay\n")
            .unwrap();
        assert_eq!(second, OutcomeStatus::AlreadyPresent);

        let third = layout
            .write_if_changed("/etc/modules-load.d/k8s.conf", b"overlay\nbr_netfilter\n")
            .unwrap();
        assert_eq!(third, OutcomeStatus::Installed);
        assert!(layout.matches("/etc/modules-load.d/k8s.conf", b"overlay\nbr_netfilter\n"));
        assert!(layout.matches("/etc/../etc/modules-load.d/k8s.conf", b"overlay\nbr_netfilter\n"));
    }
}
