//! Ubuntu (20.04 and newer): apt, dpkg and AppArmor.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

use tracing::info;

use super::{InstallContext, NodeInstaller};
use crate::assets::{
    self, APPARMOR_DISABLE_DIR, APPARMOR_RUNC_PROFILE, APT_KEYRING_PATH, APT_SOURCE_PATH,
    KUBE_PACKAGES,
};
use crate::commands::files::GpgDearmor;
use crate::commands::packages::{AptGet, AptMark, DpkgQuery, InstalledPackage};
use crate::commands::system::ApparmorUnload;
use crate::error::Result;
use crate::report::Report;
use crate::types::{Distribution, OutcomeStatus};
use crate::version::{KubeVersion, VersionSpec};

/// Packages needed to fetch and unpack the runtime releases
const RUNTIME_PREREQUISITES: &[&str] = &["curl", "gpg", "tar"];
/// Packages needed to use the pkgs.k8s.io repository
const REPOSITORY_PREREQUISITES: &[&str] = &["apt-transport-https", "ca-certificates", "curl", "gpg"];
/// Distribution packages that conflict with the release binaries
const CONFLICTING_PACKAGES: &[&str] = &["containerd", "runc"];

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// apt package arguments for the node tools.
///
/// `kubelet` when unpinned, `kubelet=1.30.11-*` for a patch version and
/// `kubelet=1.30.11-1.1` for an exact package revision.
pub fn apt_package_specs(version: &KubeVersion) -> Vec<String> {
    let pin = match (version.patch_version(), &version.revision) {
        (Some(patch), Some(revision)) => Some(format!("{patch}-{revision}")),
        (Some(patch), None) => Some(format!("{patch}-*")),
        (None, _) => None,
    };
    KUBE_PACKAGES
        .iter()
        .map(|name| match &pin {
            Some(pin) => format!("{name}={pin}"),
            None => name.to_string(),
        })
        .collect()
}

/// apt package arguments restricting an unpinned install to the release
/// line: `kubelet=1.30.*`. Pinned versions keep their exact pin.
pub fn apt_release_line_specs(version: &KubeVersion) -> Vec<String> {
    if version.is_pinned() {
        return apt_package_specs(version);
    }
    KUBE_PACKAGES
        .iter()
        .map(|name| format!("{name}={}.{}.*", version.major, version.minor))
        .collect()
}

pub struct UbuntuInstaller;

impl UbuntuInstaller {
    /// Install `packages` unless dpkg reports all of them installed.
    fn ensure_apt_packages(&self, ctx: &InstallContext, packages: &[&str]) -> Result<OutcomeStatus> {
        let packages = owned(packages);
        let installed = self.installed_packages(ctx, &packages)?;
        if packages
            .iter()
            .all(|name| installed.iter().any(|p| &p.name == name))
        {
            return Ok(OutcomeStatus::AlreadyPresent);
        }
        ctx.run(&AptGet::Install {
            packages,
            allow_downgrades: false,
        })?;
        Ok(OutcomeStatus::Installed)
    }

    /// Unload the AppArmor runc profile and keep it disabled across reboots.
    fn disable_apparmor_runc(&self, ctx: &InstallContext) -> Result<OutcomeStatus> {
        let profile = ctx.layout.resolve(APPARMOR_RUNC_PROFILE);
        if !profile.exists() {
            info!("No AppArmor profile at {}, nothing to disable", APPARMOR_RUNC_PROFILE);
            return Ok(OutcomeStatus::Tolerated);
        }

        let status = ctx.tolerate(
            &ApparmorUnload { profile },
            "runc profile is not loaded",
            OutcomeStatus::Installed,
        )?;

        let disable_dir = ctx.create_dir(APPARMOR_DISABLE_DIR)?;
        let link = disable_dir.join("runc");
        if fs::symlink_metadata(&link).is_ok() {
            return Ok(status);
        }
        if ctx.dry_run {
            info!("[dry-run] ln -s {} {}", APPARMOR_RUNC_PROFILE, link.display());
        } else {
            symlink(APPARMOR_RUNC_PROFILE, &link)?;
        }
        Ok(status)
    }
}

impl NodeInstaller for UbuntuInstaller {
    fn distribution(&self) -> Distribution {
        Distribution::Ubuntu
    }

    fn prepare_runtime_host(&self, ctx: &InstallContext, report: &mut Report) -> Result<()> {
        report.step("apt update", || {
            ctx.run(&AptGet::Update)?;
            Ok(OutcomeStatus::Installed)
        })?;
        report.step("runtime prerequisites", || {
            self.ensure_apt_packages(ctx, RUNTIME_PREREQUISITES)
        })?;
        report.step("remove distro containerd/runc", || {
            ctx.tolerate(
                &AptGet::Remove {
                    packages: owned(CONFLICTING_PACKAGES),
                },
                "distribution containerd/runc are not installed",
                OutcomeStatus::Removed,
            )
        })?;
        report.step("apparmor runc profile", || self.disable_apparmor_runc(ctx))?;
        Ok(())
    }

    fn prepare_kubetools_host(&self, ctx: &InstallContext, report: &mut Report) -> Result<()> {
        report.step("repository prerequisites", || {
            ctx.run(&AptGet::Update)?;
            self.ensure_apt_packages(ctx, REPOSITORY_PREREQUISITES)
        })?;
        Ok(())
    }

    fn configure_repository(
        &self,
        ctx: &InstallContext,
        version: &VersionSpec,
    ) -> Result<OutcomeStatus> {
        let channel = &version.channel;
        if let Some(dir) = Path::new(APT_KEYRING_PATH).parent() {
            ctx.create_dir(dir)?;
        }
        let keyring = ctx.layout.resolve(APT_KEYRING_PATH);

        let key = ctx.download(&assets::apt_release_key_url(channel), "Release.key")?;
        ctx.run(&GpgDearmor {
            input: key,
            output: keyring,
        })?;

        let status = ctx.write_file(APT_SOURCE_PATH, assets::apt_source_list(channel).as_bytes())?;
        ctx.run(&AptGet::Update)?;
        Ok(status)
    }

    fn installed_packages(
        &self,
        ctx: &InstallContext,
        packages: &[String],
    ) -> Result<Vec<InstalledPackage>> {
        // Non-zero when any package is unknown; stdout still lists the rest.
        let output = ctx.runner.run(&DpkgQuery {
            packages: packages.to_vec(),
        })?;
        Ok(DpkgQuery::installed(&output.stdout))
    }

    fn install_packages(
        &self,
        ctx: &InstallContext,
        version: &KubeVersion,
        change_line: bool,
    ) -> Result<()> {
        let packages = if change_line {
            apt_release_line_specs(version)
        } else {
            apt_package_specs(version)
        };
        // A pin or a line change may select an older version than installed
        ctx.run(&AptGet::Install {
            packages,
            allow_downgrades: change_line || version.is_pinned(),
        })?;
        Ok(())
    }

    fn hold_packages(&self, ctx: &InstallContext, packages: &[String]) -> Result<()> {
        ctx.run(&AptMark::Hold(packages.to_vec()))?;
        Ok(())
    }

    fn release_holds(&self, ctx: &InstallContext, packages: &[String]) -> Result<()> {
        ctx.run(&AptMark::Unhold(packages.to_vec()))?;
        Ok(())
    }
}
