//! Steps shared by every distribution.
//!
//! Each step returns the `OutcomeStatus` recorded for it: `AlreadyPresent`
//! when the host was already in the desired state, `Installed` otherwise.

use std::fs;

use tracing::{debug, info};

use super::InstallContext;
use crate::assets::{
    self, CONTAINERD_BINARY, CONTAINERD_CONFIG, CONTAINERD_CONFIG_PATH, CONTAINERD_PREFIX,
    CONTAINERD_UNIT_PATH, CRICTL_CONFIG_PATH, FSTAB_PATH, KERNEL_MODULES, MODULES_LOAD_PATH,
    RUNC_BINARY, SYSCTL_PATH,
};
use crate::commands::files::{InstallFile, TarExtract};
use crate::commands::system::{Modprobe, SwapOff, SysctlSystem, Systemctl};
use crate::commands::tools::{ToolVersion, reports_version};
use crate::error::{KubeprepError, Result};
use crate::host_command::HostCommand;
use crate::release::{self, CONTAINERD_UNIT_URL, Project};
use crate::report::Report;
use crate::types::OutcomeStatus;

// ============================================================================
// Kernel
// ============================================================================

/// Persist and load the kernel modules containerd networking needs.
pub fn kernel_modules(ctx: &InstallContext) -> Result<OutcomeStatus> {
    let status = ctx.write_file(MODULES_LOAD_PATH, assets::modules_load_conf().as_bytes())?;
    for module in KERNEL_MODULES {
        ctx.run(&Modprobe {
            module: module.to_string(),
        })?;
    }
    Ok(status)
}

/// Persist and apply the bridge/forwarding sysctls.
pub fn sysctl(ctx: &InstallContext) -> Result<OutcomeStatus> {
    let status = ctx.write_file(SYSCTL_PATH, assets::sysctl_conf().as_bytes())?;
    ctx.run(&SysctlSystem)?;
    Ok(status)
}

// ============================================================================
// Container runtime
// ============================================================================

/// Returns true if the binary at `host_path` reports `version`.
fn binary_at_version(ctx: &InstallContext, host_path: &str, version: &str) -> Result<bool> {
    let path = ctx.layout.resolve(host_path);
    if !path.exists() {
        return Ok(false);
    }
    let output = ctx.runner.run(&ToolVersion::Binary(path))?;
    Ok(output.success && reports_version(&output.stdout, version))
}

/// Install the containerd release tarball under `/usr/local`.
pub fn containerd(ctx: &InstallContext, version: &str) -> Result<OutcomeStatus> {
    if binary_at_version(ctx, CONTAINERD_BINARY, version)? {
        info!("containerd {} already installed", version);
        return Ok(OutcomeStatus::AlreadyPresent);
    }

    let arch = ctx.host.architecture;
    let url = Project::Containerd.asset_url(version, arch);
    let archive = ctx.download(&url, &Project::Containerd.asset_name(version, arch))?;

    if ctx.config.verify_checksums && !ctx.dry_run {
        let sums = ctx.fetcher.fetch_text(&format!("{url}.sha256sum"))?;
        release::verify_sha256(&archive, &sums)?;
    }

    ctx.run(&TarExtract {
        archive,
        dest: ctx.layout.resolve(CONTAINERD_PREFIX),
    })?;
    Ok(OutcomeStatus::Installed)
}

/// Install the runc release binary as `/usr/local/sbin/runc`.
pub fn runc(ctx: &InstallContext, version: &str) -> Result<OutcomeStatus> {
    if binary_at_version(ctx, RUNC_BINARY, version)? {
        info!("runc {} already installed", version);
        return Ok(OutcomeStatus::AlreadyPresent);
    }

    let arch = ctx.host.architecture;
    let binary = ctx.download(
        &Project::Runc.asset_url(version, arch),
        &Project::Runc.asset_name(version, arch),
    )?;
    ctx.run(&InstallFile {
        source: binary,
        dest: ctx.layout.resolve(RUNC_BINARY),
        mode: 0o755,
    })?;
    Ok(OutcomeStatus::Installed)
}

pub fn containerd_config(ctx: &InstallContext) -> Result<OutcomeStatus> {
    ctx.write_file(CONTAINERD_CONFIG_PATH, CONTAINERD_CONFIG.as_bytes())
}

/// Install the upstream containerd unit and start the service.
pub fn containerd_service(ctx: &InstallContext) -> Result<OutcomeStatus> {
    let status = if ctx.dry_run {
        info!("[dry-run] install {} from {}", CONTAINERD_UNIT_PATH, CONTAINERD_UNIT_URL);
        OutcomeStatus::Installed
    } else {
        let unit = ctx.fetcher.fetch_text(CONTAINERD_UNIT_URL)?;
        ctx.write_file(CONTAINERD_UNIT_PATH, unit.as_bytes())?
    };
    ctx.run(&Systemctl::DaemonReload)?;
    ctx.run(&Systemctl::EnableNow("containerd".to_string()))?;
    Ok(status)
}

// ============================================================================
// Runtime marker
// ============================================================================

/// Record that the container runtime is set up.
pub fn write_marker(
    ctx: &InstallContext,
    containerd_version: &str,
    runc_version: &str,
) -> Result<OutcomeStatus> {
    let content = format!("containerd {containerd_version}\nrunc {runc_version}\n");
    ctx.write_file(&ctx.config.marker_path, content.as_bytes())
}

/// Fail with `MissingMarker` unless the container flow has completed.
pub fn require_marker(ctx: &InstallContext) -> Result<()> {
    let marker = &ctx.config.marker_path;
    if ctx.layout.exists(marker) {
        debug!("Found runtime marker {}", marker.display());
        Ok(())
    } else {
        Err(KubeprepError::MissingMarker(marker.clone()))
    }
}

// ============================================================================
// Kubelet prerequisites
// ============================================================================

/// Drop swap entries from fstab content. Comment lines are kept.
pub fn strip_swap_entries(fstab: &str) -> String {
    let cleaned = fstab
        .lines()
        .filter(|line| {
            line.trim_start().starts_with('#')
                || line
                    .split_whitespace()
                    .nth(2)
                    .is_none_or(|fs_type| fs_type != "swap")
        })
        .collect::<Vec<_>>()
        .join("\n");
    if fstab.ends_with('\n') && !cleaned.is_empty() {
        cleaned + "\n"
    } else {
        cleaned
    }
}

/// Turn swap off now and on every boot.
pub fn disable_swap(ctx: &InstallContext) -> Result<OutcomeStatus> {
    ctx.run(&SwapOff)?;

    let fstab_path = ctx.layout.resolve(FSTAB_PATH);
    let Ok(original) = fs::read_to_string(&fstab_path) else {
        info!("{} is missing or unreadable, nothing to clean", FSTAB_PATH);
        return Ok(OutcomeStatus::AlreadyPresent);
    };
    let cleaned = strip_swap_entries(&original);
    if cleaned == original {
        return Ok(OutcomeStatus::AlreadyPresent);
    }
    info!("Removing swap entries from {}", FSTAB_PATH);
    ctx.write_file(FSTAB_PATH, cleaned.as_bytes())
}

/// Point crictl at the containerd socket.
pub fn crictl(ctx: &InstallContext) -> Result<OutcomeStatus> {
    ctx.write_file(CRICTL_CONFIG_PATH, assets::crictl_yaml().as_bytes())
}

pub fn enable_kubelet(ctx: &InstallContext) -> Result<OutcomeStatus> {
    ctx.run(&Systemctl::EnableNow("kubelet".to_string()))?;
    Ok(OutcomeStatus::Installed)
}

// ============================================================================
// Verify
// ============================================================================

/// Run a version command and record its first output line.
pub fn verify_tool(
    ctx: &InstallContext,
    report: &mut Report,
    tool: &str,
    command: &dyn HostCommand,
) -> Result<()> {
    match ctx.run(command) {
        Ok(output) => {
            let line = output.stdout.lines().next().unwrap_or("").trim();
            let summary = if line.is_empty() && ctx.dry_run {
                "(dry run)"
            } else {
                line
            };
            report.verified(tool, summary);
            Ok(())
        }
        Err(e) => {
            report.record(format!("verify {tool}"), OutcomeStatus::Failed);
            Err(e)
        }
    }
}

pub fn verify_containerd(ctx: &InstallContext, report: &mut Report) -> Result<()> {
    let containerd = ToolVersion::Binary(ctx.layout.resolve(CONTAINERD_BINARY));
    let runc = ToolVersion::Binary(ctx.layout.resolve(RUNC_BINARY));
    verify_tool(ctx, report, "containerd", &containerd)?;
    verify_tool(ctx, report, "runc", &runc)
}

pub fn verify_kubetools(ctx: &InstallContext, report: &mut Report) -> Result<()> {
    verify_tool(ctx, report, "kubeadm", &ToolVersion::Kubeadm)?;
    verify_tool(ctx, report, "kubectl", &ToolVersion::Kubectl)
}
