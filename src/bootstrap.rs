//! Command dispatch
//!
//! probe → resolve → install → configure → verify, driven by the parsed
//! command line. Library errors surface as `KubeprepError` inside the
//! returned `anyhow::Error`; `main` maps them onto exit codes.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::{Cli, Commands, KubeArgs, RuntimeArgs, prompt_version};
use crate::config::BootstrapConfig;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::host::HostProfile;
use crate::installer::{self, InstallContext, KubetoolsRequest};
use crate::layout::Layout;
use crate::report::Report;
use crate::runner::{CommandRunner, DryRunRunner, SystemRunner};
use crate::sanity;
use crate::version::{VersionResolver, VersionSpec};

/// Load the configuration file, if any, and apply command line overrides.
pub fn load_config(cli: &Cli) -> Result<BootstrapConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            BootstrapConfig::load_from_file(path)?
        }
        None => BootstrapConfig::default(),
    };

    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    let runtime = match &cli.command {
        Commands::Container(runtime) | Commands::All { runtime, .. } => Some(runtime),
        _ => None,
    };
    if let Some(RuntimeArgs {
        containerd_version,
        runc_version,
    }) = runtime
    {
        if containerd_version.is_some() {
            config.containerd_version = containerd_version.clone();
        }
        if runc_version.is_some() {
            config.runc_version = runc_version.clone();
        }
    }

    config.validate().context("Invalid configuration")?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Resolve the Kubernetes version requested by `kube`.
///
/// With `--interactive` the version is read from `input` after a prompt on
/// `prompt`.
pub fn resolve_kube_version<R: BufRead, W: Write>(
    kube: &KubeArgs,
    fetcher: &dyn Fetcher,
    input: &mut R,
    prompt: &mut W,
) -> Result<VersionSpec> {
    let input = if kube.interactive {
        prompt_version(input, prompt).context("Failed to read version from stdin")?
    } else {
        kube.version.clone()
    };

    let spec = VersionResolver::new(fetcher).resolve(input.as_deref())?;
    if kube.previous_minor {
        let previous = spec.into_previous_minor()?;
        info!("Using previous minor release {}", previous);
        return Ok(previous);
    }
    Ok(spec)
}

/// Execute the parsed command. Outcomes are collected in `report`, command
/// output (`probe`, `resolve`, `validate`) is written to `out`.
pub fn execute(cli: &Cli, report: &mut Report, out: &mut dyn Write) -> Result<()> {
    if let Commands::Validate { config } = &cli.command {
        let loaded = BootstrapConfig::load_from_file(config)?;
        loaded.validate()?;
        writeln!(out, "✓ Configuration file is valid: {}", config.display())?;
        return Ok(());
    }

    // Version resolution does not depend on the host
    if let Commands::Resolve {
        version,
        previous_minor,
    } = &cli.command
    {
        let kube = KubeArgs {
            version: version.clone(),
            previous_minor: *previous_minor,
            ..KubeArgs::default()
        };
        let fetcher = HttpFetcher::new()?;
        let spec =
            resolve_kube_version(&kube, &fetcher, &mut io::stdin().lock(), &mut io::stderr())?;
        writeln!(out, "version: {}", spec.full)?;
        writeln!(out, "channel: {}", spec.channel)?;
        return Ok(());
    }

    let config = load_config(cli)?;
    let layout = Layout::new(&config.root);
    let host = HostProfile::detect(&layout)?;

    if let Commands::Probe = &cli.command {
        writeln!(out, "distribution: {}", host.distribution)?;
        writeln!(out, "name:         {}", host.name)?;
        writeln!(out, "version:      {}", host.version_id)?;
        writeln!(out, "architecture: {}", host.architecture)?;
        writeln!(out, "packages:     {}", host.distribution.package_manager())?;
        return Ok(());
    }

    let fetcher = HttpFetcher::new()?;

    sanity::run_preflight_checks(host.distribution, !layout.is_host_root(), cli.dry_run)?;

    let runner: &dyn CommandRunner = if cli.dry_run {
        &DryRunRunner
    } else {
        &SystemRunner
    };
    let ctx = InstallContext::new(&host, &config, runner, &fetcher).with_dry_run(cli.dry_run);
    let node = installer::for_host(&host);

    match &cli.command {
        Commands::Container(_) => {
            node.install_container_runtime(&ctx, report)?;
        }
        Commands::Kubetools {
            kube,
            skip_marker_check,
        } => {
            let request = KubetoolsRequest {
                version: resolve_kube_version(
                    kube,
                    &fetcher,
                    &mut io::stdin().lock(),
                    &mut io::stderr(),
                )?,
                force: kube.force,
                skip_marker_check: *skip_marker_check,
            };
            node.install_kubetools(&ctx, &request, report)?;
        }
        Commands::All { kube, .. } => {
            // Version errors abort before any host change.
            let version =
                resolve_kube_version(kube, &fetcher, &mut io::stdin().lock(), &mut io::stderr())?;
            node.install_container_runtime(&ctx, report)?;
            let request = KubetoolsRequest {
                version,
                force: kube.force,
                // Runtime was set up above; a dry run writes no marker.
                skip_marker_check: true,
            };
            node.install_kubetools(&ctx, &request, report)?;
        }
        Commands::Probe | Commands::Resolve { .. } | Commands::Validate { .. } => {}
    }

    info!("Bootstrap finished on {}", host);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::Path;

    use crate::error::KubeprepError;
    use crate::version::STABLE_RELEASE_URL;

    /// Serves stable.txt and counts lookups.
    struct StableTxt {
        calls: Cell<usize>,
    }

    impl StableTxt {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl Fetcher for StableTxt {
        fn fetch_text(&self, url: &str) -> crate::error::Result<String> {
            assert_eq!(url, STABLE_RELEASE_URL);
            self.calls.set(self.calls.get() + 1);
            Ok("v1.31.2\n".to_string())
        }

        fn download(&self, url: &str, _dest: &Path) -> crate::error::Result<()> {
            Err(KubeprepError::network(url, "downloads are not served"))
        }
    }

    fn resolve(kube: &KubeArgs, fetcher: &StableTxt, stdin: &str) -> (VersionSpec, String) {
        let mut prompt = Vec::new();
        let spec = resolve_kube_version(kube, fetcher, &mut stdin.as_bytes(), &mut prompt).unwrap();
        (spec, String::from_utf8(prompt).unwrap())
    }

    #[test]
    fn test_previous_minor_channel() {
        let fetcher = StableTxt::new();
        let kube = KubeArgs {
            version: Some("1.30".to_string()),
            previous_minor: true,
            ..KubeArgs::default()
        };
        let (spec, prompt) = resolve(&kube, &fetcher, "");
        assert_eq!(spec.channel, "v1.29");
        assert_eq!(spec.full.patch, None);
        assert!(prompt.is_empty());
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[test]
    fn test_interactive_empty_line_uses_latest_stable() {
        let fetcher = StableTxt::new();
        let kube = KubeArgs {
            interactive: true,
            ..KubeArgs::default()
        };
        let (spec, prompt) = resolve(&kube, &fetcher, "\n");
        assert_eq!(spec.channel, "v1.31");
        assert_eq!(spec.full.patch, Some(2));
        assert!(prompt.starts_with("Kubernetes version"));
        assert_eq!(fetcher.calls.get(), 1);
    }

    #[test]
    fn test_interactive_answer_with_previous_minor() {
        let fetcher = StableTxt::new();
        let kube = KubeArgs {
            interactive: true,
            previous_minor: true,
            ..KubeArgs::default()
        };
        let (spec, _) = resolve(&kube, &fetcher, "1.30.4\n");
        assert_eq!(spec.channel, "v1.29");
        assert!(!spec.full.is_pinned());
        assert_eq!(spec.raw_input.as_deref(), Some("1.30.4"));
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[test]
    fn test_invalid_interactive_answer_is_rejected() {
        let fetcher = StableTxt::new();
        let kube = KubeArgs {
            interactive: true,
            ..KubeArgs::default()
        };
        let mut prompt: Vec<u8> = Vec::new();
        let err = resolve_kube_version(&kube, &fetcher, &mut "latest\n".as_bytes(), &mut prompt)
            .unwrap_err();
        let invalid = err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<KubeprepError>(),
                Some(KubeprepError::InvalidVersion { .. })
            )
        });
        assert!(invalid, "{err:#}");
    }
}
