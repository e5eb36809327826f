//! Type-safe package manager commands.
//!
//! - `AptGet` / `AptMark` / `DpkgQuery` for Ubuntu
//! - `Dnf` / `RpmQuery` for Amazon Linux 2023

use crate::host_command::HostCommand;

/// A package reported as installed by `dpkg-query` or `rpm -q`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    /// Version as the package manager prints it (`1.30.11-1.1`, `1.30.11`)
    pub version: String,
}

impl InstalledPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Returns true if the installed version is on release line `major.minor`.
    /// An epoch prefix (`1:`) is ignored.
    pub fn on_release_line(&self, major: u32, minor: u32) -> bool {
        let version = self
            .version
            .split_once(':')
            .map_or(self.version.as_str(), |(_, v)| v);
        let mut parts = version.split(['.', '-']).map(|p| p.parse::<u32>().ok());
        parts.next().flatten() == Some(major) && parts.next().flatten() == Some(minor)
    }
}

// ============================================================================
// apt-get
// ============================================================================

/// `apt-get` invocations. Always non-interactive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AptGet {
    Update,
    Install {
        packages: Vec<String>,
        /// Allow replacing an installed package with an older version
        allow_downgrades: bool,
    },
    Remove { packages: Vec<String> },
}

impl HostCommand for AptGet {
    fn program(&self) -> String {
        "apt-get".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        match self {
            Self::Update => vec!["update".to_string()],
            Self::Install {
                packages,
                allow_downgrades,
            } => {
                let mut args = vec!["install".to_string(), "-y".to_string()];
                if *allow_downgrades {
                    args.push("--allow-downgrades".to_string());
                }
                args.extend(packages.iter().cloned());
                args
            }
            Self::Remove { packages } => {
                let mut args = vec!["remove".to_string(), "-y".to_string()];
                args.extend(packages.iter().cloned());
                args
            }
        }
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())]
    }
}

/// `apt-mark hold|unhold <packages>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AptMark {
    Hold(Vec<String>),
    Unhold(Vec<String>),
}

impl HostCommand for AptMark {
    fn program(&self) -> String {
        "apt-mark".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let (action, packages) = match self {
            Self::Hold(packages) => ("hold", packages),
            Self::Unhold(packages) => ("unhold", packages),
        };
        let mut args = vec![action.to_string()];
        args.extend(packages.iter().cloned());
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

/// `dpkg-query -W -f='${Package} ${Version} ${Status}\n' <packages>`
///
/// Prints one line per known package; unknown packages go to stderr and
/// make the exit status non-zero, so only stdout is meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpkgQuery {
    pub packages: Vec<String>,
}

impl DpkgQuery {
    /// Packages from the query output whose status is fully installed.
    pub fn installed(stdout: &str) -> Vec<InstalledPackage> {
        stdout
            .lines()
            .filter_map(|line| {
                let mut fields = line.trim().splitn(3, ' ');
                let (name, version, status) = (fields.next()?, fields.next()?, fields.next()?);
                let installed = matches!(
                    status.trim(),
                    "install ok installed" | "hold ok installed"
                );
                installed.then(|| InstalledPackage::new(name, version))
            })
            .collect()
    }
}

impl HostCommand for DpkgQuery {
    fn program(&self) -> String {
        "dpkg-query".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["-W".to_string(), "-f=${Package} ${Version} ${Status}\\n".to_string()];
        args.extend(self.packages.iter().cloned());
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

// ============================================================================
// dnf / rpm
// ============================================================================

/// `dnf` invocations. Always `-y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dnf {
    Install {
        packages: Vec<String>,
        /// Repository whose `exclude=` list is bypassed for this install
        disable_excludes: Option<String>,
    },
    Remove {
        packages: Vec<String>,
    },
    VersionlockAdd {
        packages: Vec<String>,
    },
    VersionlockDelete {
        packages: Vec<String>,
    },
}

impl HostCommand for Dnf {
    fn program(&self) -> String {
        "dnf".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        match self {
            Self::Install {
                packages,
                disable_excludes,
            } => {
                let mut args = vec!["install".to_string(), "-y".to_string()];
                args.extend(packages.iter().cloned());
                if let Some(repo) = disable_excludes {
                    args.push(format!("--disableexcludes={repo}"));
                }
                args
            }
            Self::Remove { packages } => {
                let mut args = vec!["remove".to_string(), "-y".to_string()];
                args.extend(packages.iter().cloned());
                args
            }
            Self::VersionlockAdd { packages } => {
                let mut args = vec!["versionlock".to_string(), "add".to_string()];
                args.extend(packages.iter().cloned());
                args
            }
            Self::VersionlockDelete { packages } => {
                let mut args = vec!["versionlock".to_string(), "delete".to_string()];
                args.extend(packages.iter().cloned());
                args
            }
        }
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

/// `rpm -q --qf '%{NAME} %{VERSION}\n' <packages>`
///
/// Installed packages print their name and version; missing ones print
/// `package X is not installed` and set a non-zero exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpmQuery {
    pub packages: Vec<String>,
}

impl RpmQuery {
    /// Requested packages the query output reports as installed.
    pub fn installed(stdout: &str, requested: &[String]) -> Vec<InstalledPackage> {
        stdout
            .lines()
            .filter_map(|line| line.trim().split_once(' '))
            .filter(|(name, _)| requested.iter().any(|p| p == name))
            .map(|(name, version)| InstalledPackage::new(name, version.trim()))
            .collect()
    }
}

impl HostCommand for RpmQuery {
    fn program(&self) -> String {
        "rpm".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["-q".to_string(), "--qf".to_string(), "%{NAME} %{VERSION}\\n".to_string()];
        args.extend(self.packages.iter().cloned());
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}
