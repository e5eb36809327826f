//! Amazon Linux 2023: dnf, rpm and SELinux.

use std::fs;

use tracing::info;

use super::{InstallContext, NodeInstaller};
use crate::assets::{self, KUBE_PACKAGES, SELINUX_CONFIG_PATH, YUM_REPO_ID, YUM_REPO_PATH};
use crate::commands::packages::{Dnf, InstalledPackage, RpmQuery};
use crate::commands::system::SetEnforcePermissive;
use crate::error::Result;
use crate::report::Report;
use crate::types::{Distribution, OutcomeStatus};
use crate::version::{KubeVersion, VersionSpec};

/// Packages needed by the runtime; AL2023 ships the nft-backed iptables
const RUNTIME_PREREQUISITES: &[&str] = &["iptables-nft", "tar"];
/// Distribution packages that conflict with the release binaries
const CONFLICTING_PACKAGES: &[&str] = &["containerd", "runc"];
/// Resolves to the versionlock plugin package
const VERSIONLOCK_PLUGIN: &str = "dnf-command(versionlock)";

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// dnf package arguments for the node tools: `kubelet` or `kubelet-1.30.11`.
///
/// The Debian package revision has no rpm counterpart and is ignored.
pub fn dnf_package_specs(version: &KubeVersion) -> Vec<String> {
    KUBE_PACKAGES
        .iter()
        .map(|name| match version.patch_version() {
            Some(patch) => format!("{name}-{patch}"),
            None => name.to_string(),
        })
        .collect()
}

/// dnf package arguments restricting an unpinned install to the release
/// line: `kubelet-1.30.*`. Pinned versions keep their exact pin.
pub fn dnf_release_line_specs(version: &KubeVersion) -> Vec<String> {
    if version.is_pinned() {
        return dnf_package_specs(version);
    }
    KUBE_PACKAGES
        .iter()
        .map(|name| format!("{name}-{}.{}.*", version.major, version.minor))
        .collect()
}

/// Switch `SELINUX=enforcing` to permissive in an selinux config.
pub fn permissive_selinux_config(config: &str) -> String {
    let mut out: String = config
        .lines()
        .map(|line| {
            if line.trim() == "SELINUX=enforcing" {
                "SELINUX=permissive"
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    if config.ends_with('\n') {
        out.push('\n');
    }
    out
}

pub struct AmazonLinuxInstaller;

impl AmazonLinuxInstaller {
    /// Put SELinux in permissive mode now and on every boot.
    fn selinux_permissive(&self, ctx: &InstallContext) -> Result<OutcomeStatus> {
        let status = ctx.tolerate(
            &SetEnforcePermissive,
            "SELinux is disabled",
            OutcomeStatus::Installed,
        )?;

        let path = ctx.layout.resolve(SELINUX_CONFIG_PATH);
        if let Ok(config) = fs::read_to_string(&path) {
            let permissive = permissive_selinux_config(&config);
            if permissive != config {
                info!("Setting SELINUX=permissive in {}", SELINUX_CONFIG_PATH);
                ctx.write_file(SELINUX_CONFIG_PATH, permissive.as_bytes())?;
            }
        }
        Ok(status)
    }
}

impl NodeInstaller for AmazonLinuxInstaller {
    fn distribution(&self) -> Distribution {
        Distribution::AmazonLinux
    }

    fn prepare_runtime_host(&self, ctx: &InstallContext, report: &mut Report) -> Result<()> {
        report.step("runtime prerequisites", || {
            let packages = owned(RUNTIME_PREREQUISITES);
            let installed = self.installed_packages(ctx, &packages)?;
            if packages
                .iter()
                .all(|name| installed.iter().any(|p| &p.name == name))
            {
                return Ok(OutcomeStatus::AlreadyPresent);
            }
            ctx.run(&Dnf::Install {
                packages,
                disable_excludes: None,
            })?;
            Ok(OutcomeStatus::Installed)
        })?;
        report.step("remove distro containerd/runc", || {
            ctx.tolerate(
                &Dnf::Remove {
                    packages: owned(CONFLICTING_PACKAGES),
                },
                "distribution containerd/runc are not installed",
                OutcomeStatus::Removed,
            )
        })?;
        Ok(())
    }

    fn prepare_kubetools_host(&self, ctx: &InstallContext, report: &mut Report) -> Result<()> {
        report.step("selinux permissive", || self.selinux_permissive(ctx))?;
        Ok(())
    }

    fn configure_repository(
        &self,
        ctx: &InstallContext,
        version: &VersionSpec,
    ) -> Result<OutcomeStatus> {
        ctx.write_file(YUM_REPO_PATH, assets::yum_repo(&version.channel).as_bytes())
    }

    fn installed_packages(
        &self,
        ctx: &InstallContext,
        packages: &[String],
    ) -> Result<Vec<InstalledPackage>> {
        // Non-zero when any package is missing; stdout still names the rest.
        let output = ctx.runner.run(&RpmQuery {
            packages: packages.to_vec(),
        })?;
        Ok(RpmQuery::installed(&output.stdout, packages))
    }

    fn install_packages(
        &self,
        ctx: &InstallContext,
        version: &KubeVersion,
        change_line: bool,
    ) -> Result<()> {
        let packages = if change_line {
            dnf_release_line_specs(version)
        } else {
            dnf_package_specs(version)
        };
        ctx.run(&Dnf::Install {
            packages,
            disable_excludes: Some(YUM_REPO_ID.to_string()),
        })?;
        Ok(())
    }

    fn hold_packages(&self, ctx: &InstallContext, packages: &[String]) -> Result<()> {
        ctx.run(&Dnf::Install {
            packages: vec![VERSIONLOCK_PLUGIN.to_string()],
            disable_excludes: None,
        })?;
        ctx.run(&Dnf::VersionlockAdd {
            packages: packages.to_vec(),
        })?;
        Ok(())
    }

    fn release_holds(&self, ctx: &InstallContext, packages: &[String]) -> Result<()> {
        ctx.tolerate(
            &Dnf::VersionlockDelete {
                packages: packages.to_vec(),
            },
            "no versionlock entries to delete",
            OutcomeStatus::Removed,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dnf_package_specs() {
        let unpinned = KubeVersion::parse("1.30").unwrap();
        assert_eq!(dnf_package_specs(&unpinned), vec!["kubelet", "kubeadm", "kubectl"]);

        let pinned = KubeVersion::parse("1.30.11-1.1").unwrap();
        assert_eq!(
            dnf_package_specs(&pinned),
            vec!["kubelet-1.30.11", "kubeadm-1.30.11", "kubectl-1.30.11"]
        );
    }

    #[test]
    fn test_dnf_release_line_specs() {
        let unpinned = KubeVersion::parse("v1.30").unwrap();
        assert_eq!(
            dnf_release_line_specs(&unpinned),
            vec!["kubelet-1.30.*", "kubeadm-1.30.*", "kubectl-1.30.*"]
        );

        let pinned = KubeVersion::parse("1.30.4").unwrap();
        assert_eq!(dnf_release_line_specs(&pinned)[2], "kubectl-1.30.4");
    }

    #[test]
    fn test_permissive_selinux_config() {
        let config = "# comment\nSELINUX=enforcing\nSELINUXTYPE=targeted\n";
        assert_eq!(
            permissive_selinux_config(config),
            "# comment\nSELINUX=permissive\nSELINUXTYPE=targeted\n"
        );
        let already = "SELINUX=permissive\n";
        assert_eq!(permissive_selinux_config(already), already);
    }
}
