//! Node installation flows
//!
//! One `NodeInstaller` per supported distribution. The two flows,
//! `install_container_runtime` and `install_kubetools`, are provided
//! methods shared by every distribution; implementors supply the package
//! manager specific hooks.
//!
//! Every step delegates to an external command through the context's
//! `CommandRunner` and records an outcome in the `Report`. The first
//! failing step aborts the flow; known-safe failures go through
//! `InstallContext::tolerate`.

mod amazon;
pub mod steps;
mod ubuntu;

pub use amazon::{AmazonLinuxInstaller, dnf_package_specs, permissive_selinux_config};
pub use ubuntu::{UbuntuInstaller, apt_package_specs};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::assets::KUBE_PACKAGES;
use crate::commands::packages::InstalledPackage;
use crate::config::BootstrapConfig;
use crate::error::{KubeprepError, Result};
use crate::fetch::Fetcher;
use crate::host::HostProfile;
use crate::host_command::HostCommand;
use crate::layout::Layout;
use crate::release::{self, Project};
use crate::report::Report;
use crate::runner::{CommandOutput, CommandRunner};
use crate::types::{Distribution, OutcomeStatus};
use crate::version::{KubeVersion, VersionSpec};

// ============================================================================
// Context
// ============================================================================

/// Everything a flow needs, borrowed for the duration of the run.
pub struct InstallContext<'a> {
    pub host: &'a HostProfile,
    pub config: &'a BootstrapConfig,
    pub layout: Layout,
    pub runner: &'a dyn CommandRunner,
    pub fetcher: &'a dyn Fetcher,
    /// Log file writes and downloads instead of performing them
    pub dry_run: bool,
}

impl<'a> InstallContext<'a> {
    pub fn new(
        host: &'a HostProfile,
        config: &'a BootstrapConfig,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn Fetcher,
    ) -> Self {
        Self {
            host,
            config,
            layout: Layout::new(&config.root),
            runner,
            fetcher,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run a command that must succeed.
    pub fn run(&self, command: &dyn HostCommand) -> Result<CommandOutput> {
        self.runner.run(command)?.ensure_success()
    }

    /// Run a command whose failure is expected in some host states.
    ///
    /// Returns `ok` on success and `Tolerated` when the command failed or
    /// could not be started.
    pub fn tolerate(
        &self,
        command: &dyn HostCommand,
        reason: &str,
        ok: OutcomeStatus,
    ) -> Result<OutcomeStatus> {
        match self.runner.run(command) {
            Ok(output) if output.tolerate(reason) => Ok(ok),
            Ok(_) => Ok(OutcomeStatus::Tolerated),
            Err(KubeprepError::CommandLaunch { cmd, source }) => {
                info!("Ignoring '{}', it could not be started ({}): {}", cmd, source, reason);
                Ok(OutcomeStatus::Tolerated)
            }
            Err(e) => Err(e),
        }
    }

    /// Write a host file unless it already holds `content`.
    pub fn write_file(&self, host_path: impl AsRef<Path>, content: &[u8]) -> Result<OutcomeStatus> {
        let host_path = host_path.as_ref();
        if self.layout.matches(host_path, content) {
            return Ok(OutcomeStatus::AlreadyPresent);
        }
        if self.dry_run {
            info!("[dry-run] write {} ({} bytes)", host_path.display(), content.len());
            return Ok(OutcomeStatus::Installed);
        }
        info!("Writing {}", host_path.display());
        Ok(self.layout.write_if_changed(host_path, content)?)
    }

    /// Create a host directory and its parents.
    pub fn create_dir(&self, host_path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.layout.resolve(host_path);
        if self.dry_run {
            info!("[dry-run] mkdir -p {}", path.display());
        } else {
            fs::create_dir_all(&path)?;
        }
        Ok(path)
    }

    /// Download `url` into the work directory; returns the local path.
    pub fn download(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        let dest = self.layout.resolve(self.config.work_dir.join(file_name));
        if self.dry_run {
            info!("[dry-run] download {} -> {}", url, dest.display());
        } else {
            info!("Downloading {}", url);
            self.fetcher.download(url, &dest)?;
        }
        Ok(dest)
    }
}

// ============================================================================
// Flows
// ============================================================================

/// What the kubetools flow installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubetoolsRequest {
    pub version: VersionSpec,
    /// Reinstall even if the packages are present
    pub force: bool,
    /// Do not require the runtime-setup marker
    pub skip_marker_check: bool,
}

/// Package names of the node tools.
pub fn kube_package_names() -> Vec<String> {
    KUBE_PACKAGES.iter().map(|p| p.to_string()).collect()
}

/// Distribution-specific installation.
pub trait NodeInstaller {
    fn distribution(&self) -> Distribution;

    /// Install container runtime prerequisites and remove conflicting
    /// distribution packages.
    fn prepare_runtime_host(&self, ctx: &InstallContext, report: &mut Report) -> Result<()>;

    /// Host preparation before the Kubernetes repository is configured.
    fn prepare_kubetools_host(&self, ctx: &InstallContext, report: &mut Report) -> Result<()>;

    /// Configure the package repository for the version's channel.
    fn configure_repository(&self, ctx: &InstallContext, version: &VersionSpec)
        -> Result<OutcomeStatus>;

    /// Which of `packages` are installed, with their versions.
    fn installed_packages(
        &self,
        ctx: &InstallContext,
        packages: &[String],
    ) -> Result<Vec<InstalledPackage>>;

    /// Install kubelet, kubeadm and kubectl at `version`.
    ///
    /// `change_line` is set when an installed package is on another release
    /// line; an unpinned install is then restricted to the requested line.
    fn install_packages(
        &self,
        ctx: &InstallContext,
        version: &KubeVersion,
        change_line: bool,
    ) -> Result<()>;

    /// Prevent automatic upgrades of `packages`.
    fn hold_packages(&self, ctx: &InstallContext, packages: &[String]) -> Result<()>;

    /// Undo `hold_packages` so a different version can be installed.
    fn release_holds(&self, ctx: &InstallContext, packages: &[String]) -> Result<()>;

    /// Set up containerd and runc, then write the runtime-setup marker.
    fn install_container_runtime(&self, ctx: &InstallContext, report: &mut Report) -> Result<()> {
        info!("Setting up container runtime on {}", ctx.host);
        self.prepare_runtime_host(ctx, report)?;

        report.step("kernel modules", || steps::kernel_modules(ctx))?;
        report.step("sysctl", || steps::sysctl(ctx))?;

        let containerd_version = release::resolve_version(
            ctx.fetcher,
            Project::Containerd,
            ctx.config.containerd_version.as_deref(),
        )?;
        let runc_version = release::resolve_version(
            ctx.fetcher,
            Project::Runc,
            ctx.config.runc_version.as_deref(),
        )?;

        report.step(&format!("containerd {containerd_version}"), || {
            steps::containerd(ctx, &containerd_version)
        })?;
        report.step(&format!("runc {runc_version}"), || {
            steps::runc(ctx, &runc_version)
        })?;
        report.step("containerd config", || steps::containerd_config(ctx))?;
        report.step("containerd service", || steps::containerd_service(ctx))?;

        steps::verify_containerd(ctx, report)?;

        report.step("runtime marker", || {
            steps::write_marker(ctx, &containerd_version, &runc_version)
        })?;
        Ok(())
    }

    /// Set up kubelet, kubeadm and kubectl.
    fn install_kubetools(
        &self,
        ctx: &InstallContext,
        request: &KubetoolsRequest,
        report: &mut Report,
    ) -> Result<()> {
        if request.skip_marker_check {
            info!("Skipping container runtime marker check");
        } else {
            steps::require_marker(ctx)?;
        }
        info!("Setting up Kubernetes {} on {}", request.version, ctx.host);

        report.step("kernel modules", || steps::kernel_modules(ctx))?;
        report.step("sysctl", || steps::sysctl(ctx))?;
        self.prepare_kubetools_host(ctx, report)?;

        let channel = &request.version.channel;
        report.step(&format!("kubernetes repository {channel}"), || {
            self.configure_repository(ctx, &request.version)
        })?;

        let packages = kube_package_names();
        report.step("kubelet kubeadm kubectl", || {
            self.ensure_kube_packages(ctx, request, &packages)
        })?;
        if ctx.config.hold_packages {
            report.step("package hold", || {
                self.hold_packages(ctx, &packages)?;
                Ok(OutcomeStatus::Installed)
            })?;
        }

        report.step("swap", || steps::disable_swap(ctx))?;
        report.step("crictl", || steps::crictl(ctx))?;
        report.step("kubelet service", || steps::enable_kubelet(ctx))?;

        steps::verify_kubetools(ctx, report)?;
        Ok(())
    }

    /// Install the node tools unless they are all present on the requested
    /// release line already.
    ///
    /// A pinned version or `force` always reinstalls.
    fn ensure_kube_packages(
        &self,
        ctx: &InstallContext,
        request: &KubetoolsRequest,
        packages: &[String],
    ) -> Result<OutcomeStatus> {
        let wanted = &request.version.full;
        let installed = self.installed_packages(ctx, packages)?;
        let off_line: Vec<&InstalledPackage> = installed
            .iter()
            .filter(|p| !p.on_release_line(wanted.major, wanted.minor))
            .collect();
        let all_present = packages
            .iter()
            .all(|name| installed.iter().any(|p| &p.name == name));

        if all_present && off_line.is_empty() && !request.force && !wanted.is_pinned() {
            info!("{} already installed from {}", packages.join(", "), wanted.channel());
            return Ok(OutcomeStatus::AlreadyPresent);
        }
        for package in &off_line {
            info!(
                "{} {} is not on {}, moving it to the requested release",
                package.name,
                package.version,
                wanted.channel()
            );
        }
        if !installed.is_empty() && ctx.config.hold_packages {
            let names: Vec<String> = installed.iter().map(|p| p.name.clone()).collect();
            self.release_holds(ctx, &names)?;
        }
        self.install_packages(ctx, wanted, !off_line.is_empty())?;
        Ok(OutcomeStatus::Installed)
    }
}

/// Select the installer for a host.
pub fn for_host(host: &HostProfile) -> Box<dyn NodeInstaller> {
    match host.distribution {
        Distribution::Ubuntu => Box::new(UbuntuInstaller),
        Distribution::AmazonLinux => Box::new(AmazonLinuxInstaller),
    }
}
