//! Type-safe system configuration commands.
//!
//! - `Systemctl` for unit management
//! - `Modprobe`, `SysctlSystem` for kernel settings
//! - `SwapOff`, `SetEnforcePermissive`, `ApparmorUnload` for host policy toggles

use std::path::PathBuf;

use crate::host_command::HostCommand;

// ============================================================================
// systemctl
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Systemctl {
    DaemonReload,
    /// `systemctl enable --now <unit>`
    EnableNow(String),
}

impl HostCommand for Systemctl {
    fn program(&self) -> String {
        "systemctl".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        match self {
            Self::DaemonReload => vec!["daemon-reload".to_string()],
            Self::EnableNow(unit) => {
                vec!["enable".to_string(), "--now".to_string(), unit.clone()]
            }
        }
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

// ============================================================================
// Kernel
// ============================================================================

/// `modprobe <module>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modprobe {
    pub module: String,
}

impl HostCommand for Modprobe {
    fn program(&self) -> String {
        "modprobe".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.module.clone()]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

/// `sysctl --system`, reloading every sysctl.d drop-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysctlSystem;

impl HostCommand for SysctlSystem {
    fn program(&self) -> String {
        "sysctl".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["--system".to_string()]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

// ============================================================================
// Host policy
// ============================================================================

/// `swapoff -a`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOff;

impl HostCommand for SwapOff {
    fn program(&self) -> String {
        "swapoff".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-a".to_string()]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

/// `setenforce 0`, switching SELinux to permissive until reboot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetEnforcePermissive;

impl HostCommand for SetEnforcePermissive {
    fn program(&self) -> String {
        "setenforce".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["0".to_string()]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

/// `apparmor_parser -R <profile>`, unloading a profile from the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApparmorUnload {
    pub profile: PathBuf,
}

impl HostCommand for ApparmorUnload {
    fn program(&self) -> String {
        "apparmor_parser".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-R".to_string(), self.profile.display().to_string()]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}
