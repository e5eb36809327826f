use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// kubeprep - Kubernetes node bootstrapper
#[derive(Parser, Debug)]
#[command(name = "kubeprep")]
#[command(about = "Installs containerd, runc, kubelet, kubeadm and kubectl on Ubuntu and Amazon Linux 2023")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: log every command and file write without changing the host.
    ///
    /// Version lookups against release endpoints still happen so the plan
    /// shows the versions that would be installed.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Prefix for every host path (default: /)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Set up containerd and runc
    Container(RuntimeArgs),
    /// Set up kubelet, kubeadm and kubectl (after `container`)
    Kubetools {
        #[command(flatten)]
        kube: KubeArgs,
        /// Do not require the container runtime marker
        #[arg(long)]
        skip_marker_check: bool,
    },
    /// Set up the container runtime, then the Kubernetes node tools
    All {
        #[command(flatten)]
        runtime: RuntimeArgs,
        #[command(flatten)]
        kube: KubeArgs,
    },
    /// Print the detected host profile
    Probe,
    /// Print the resolved Kubernetes version and repository channel
    Resolve {
        /// Kubernetes version (MAJOR.MINOR or MAJOR.MINOR.PATCH); latest stable if omitted
        version: Option<String>,
        /// Use the minor release before the resolved one
        #[arg(long)]
        previous_minor: bool,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        config: PathBuf,
    },
}

/// Container runtime release pins
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeArgs {
    /// containerd release to install (default: latest)
    #[arg(long)]
    pub containerd_version: Option<String>,
    /// runc release to install (default: latest)
    #[arg(long)]
    pub runc_version: Option<String>,
}

/// Kubernetes version selection
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct KubeArgs {
    /// Kubernetes version (MAJOR.MINOR or MAJOR.MINOR.PATCH); latest stable if omitted
    pub version: Option<String>,
    /// Prompt for the version on stdin
    #[arg(short, long, conflicts_with = "version")]
    pub interactive: bool,
    /// Install the minor release before the resolved one
    #[arg(long)]
    pub previous_minor: bool,
    /// Reinstall packages even if they are already present
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

/// Ask for a Kubernetes version.
///
/// Returns `None` for an empty line or end of input, meaning latest stable.
pub fn prompt_version<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<Option<String>> {
    write!(
        output,
        "Kubernetes version to install (e.g. 1.30 or 1.30.11, empty for latest stable): "
    )?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let trimmed = line.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["kubeprep"]).is_err());
    }

    #[test]
    fn test_cli_container_with_pins() {
        let cli = Cli::try_parse_from([
            "kubeprep",
            "container",
            "--containerd-version",
            "1.7.22",
        ])
        .unwrap();
        match cli.command {
            Commands::Container(runtime) => {
                assert_eq!(runtime.containerd_version.as_deref(), Some("1.7.22"));
                assert_eq!(runtime.runc_version, None);
            }
            other => panic!("Expected Container command, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_kubetools_with_version() {
        let cli = Cli::try_parse_from([
            "kubeprep",
            "--dry-run",
            "kubetools",
            "1.30",
            "--force",
            "--skip-marker-check",
        ])
        .unwrap();
        assert!(cli.dry_run);
        match cli.command {
            Commands::Kubetools {
                kube,
                skip_marker_check,
            } => {
                assert_eq!(kube.version.as_deref(), Some("1.30"));
                assert!(kube.force);
                assert!(!kube.interactive);
                assert!(skip_marker_check);
            }
            other => panic!("Expected Kubetools command, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_interactive_conflicts_with_version() {
        let result = Cli::try_parse_from(["kubeprep", "kubetools", "1.30", "--interactive"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "kubeprep",
            "all",
            "--root",
            "/srv/node",
            "-vv",
            "--config",
            "/etc/kubeprep.json",
        ])
        .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/srv/node")));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/kubeprep.json")));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::All { .. }));
    }

    #[test]
    fn test_cli_resolve_previous_minor() {
        let cli = Cli::try_parse_from(["kubeprep", "resolve", "v1.31", "--previous-minor"]).unwrap();
        match cli.command {
            Commands::Resolve {
                version,
                previous_minor,
            } => {
                assert_eq!(version.as_deref(), Some("v1.31"));
                assert!(previous_minor);
            }
            other => panic!("Expected Resolve command, got {other:?}"),
        }
    }

    #[test]
    fn test_prompt_version() {
        let mut output = Vec::new();
        let answer = prompt_version(&mut "  1.29.4 \n".as_bytes(), &mut output).unwrap();
        assert_eq!(answer.as_deref(), Some("1.29.4"));
        assert!(String::from_utf8(output).unwrap().starts_with("Kubernetes version"));

        let mut output = Vec::new();
        assert_eq!(prompt_version(&mut "\n".as_bytes(), &mut output).unwrap(), None);
        assert_eq!(prompt_version(&mut "".as_bytes(), &mut output).unwrap(), None);
    }
}
