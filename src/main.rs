//! kubeprep - Main entry point
//!
//! Parses the command line, installs the logger, runs the command and maps
//! failures onto process exit codes.

use std::io::{self, Write};
use std::process::ExitCode;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use kubeprep::bootstrap;
use kubeprep::cli::Cli;
use kubeprep::error::{EXIT_FAILURE, KubeprepError};
use kubeprep::report::Report;

/// Initialize the logger. `RUST_LOG` overrides the `-v` level.
fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Exit code for a failed run.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    let code = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<KubeprepError>())
        .map_or(EXIT_FAILURE, KubeprepError::exit_code);
    u8::try_from(code).unwrap_or(1)
}

/// Print the outcome report; a write failure is logged and reported as false.
fn print_report<W: Write>(report: &Report, out: &mut W) -> bool {
    match write!(out, "{}", report.render()).and_then(|()| out.flush()) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to print the installation report: {}", e);
            false
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    info!("kubeprep {} starting up", env!("CARGO_PKG_VERSION"));
    debug!("CLI arguments parsed: {:?}", cli);

    let mut report = Report::new();
    let mut stdout = io::stdout();
    let result = bootstrap::execute(&cli, &mut report, &mut stdout);

    if !report.is_empty() {
        print_report(&report, &mut stdout);
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use kubeprep::types::OutcomeStatus;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_exit_code_for() {
        let marker = anyhow::Error::new(KubeprepError::MissingMarker(PathBuf::from("/x")));
        assert_eq!(exit_code_for(&marker), 4);

        let os = anyhow::Error::new(KubeprepError::UnsupportedOs {
            name: "Debian GNU/Linux".into(),
            version: "12".into(),
        })
        .context("Host detection failed");
        assert_eq!(exit_code_for(&os), 2);

        assert_eq!(exit_code_for(&anyhow::anyhow!("Invalid configuration")), 1);
    }

    #[test]
    fn test_print_report() {
        let mut report = Report::new();
        report.record("sysctl", OutcomeStatus::Installed);

        let mut out = Vec::new();
        assert!(print_report(&report, &mut out));
        assert!(String::from_utf8(out).unwrap().contains("sysctl"));

        assert!(!print_report(&report, &mut ClosedPipe));
    }
}
