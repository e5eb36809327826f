//! Host command execution
//!
//! Every external program goes through a `CommandRunner`:
//!
//! - `SystemRunner` spawns the program and captures its output
//! - `DryRunRunner` logs the exact command line and reports success
//!
//! A runner never judges the exit status. Callers decide with
//! `CommandOutput::ensure_success` (abort the run) or
//! `CommandOutput::tolerate` (log and carry on) which failures matter.

use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::{KubeprepError, Result};
use crate::host_command::HostCommand;

/// Executes host commands.
pub trait CommandRunner {
    /// Run `command` to completion.
    ///
    /// `Err` only when the program could not be started; a non-zero exit
    /// is reported through `CommandOutput::success`.
    fn run(&self, command: &dyn HostCommand) -> Result<CommandOutput>;
}

/// Output from a host command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Command line that produced this output.
    pub command_line: String,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the program exited successfully (exit code 0).
    pub success: bool,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn succeeded(command_line: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(command_line: impl Into<String>, code: i32, stderr: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
            success: false,
        }
    }

    /// Check that the command succeeded and return an error if not.
    pub fn ensure_success(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(KubeprepError::CommandFailed {
                cmd: self.command_line,
                code: self.exit_code.unwrap_or(-1),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }

    /// Accept a known-safe failure.
    ///
    /// Returns true if the command succeeded; otherwise logs `reason` at
    /// info level and returns false.
    pub fn tolerate(&self, reason: &str) -> bool {
        if !self.success {
            info!(
                "Ignoring failure of '{}' (exit code {}): {}",
                self.command_line,
                self.exit_code.unwrap_or(-1),
                reason
            );
        }
        self.success
    }
}

/// Runs commands on the live host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &dyn HostCommand) -> Result<CommandOutput> {
        let command_line = command.command_line();
        let env_vars = command.get_env_vars();
        info!("Running: {}", command_line);
        if !env_vars.is_empty() {
            debug!("  env={:?}", env_vars);
        }

        let output = Command::new(command.program())
            .args(command.to_cli_args())
            .envs(env_vars)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| KubeprepError::CommandLaunch {
                cmd: command_line.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code();

        if output.status.success() {
            debug!("'{}' succeeded", command_line);
        } else {
            debug!(
                "'{}' failed with exit code {}",
                command_line,
                exit_code.unwrap_or(-1)
            );
        }

        Ok(CommandOutput {
            command_line,
            stdout,
            stderr,
            exit_code,
            success: output.status.success(),
        })
    }
}

/// Logs commands instead of running them.
///
/// Every command "succeeds" with empty output, so presence queries report
/// nothing installed and the full plan is logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    fn run(&self, command: &dyn HostCommand) -> Result<CommandOutput> {
        let command_line = command.command_line();
        info!("[dry-run] {}", command_line);
        Ok(CommandOutput::succeeded(command_line, ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shell(&'static str);

    impl HostCommand for Shell {
        fn program(&self) -> String {
            "sh".to_string()
        }

        fn to_cli_args(&self) -> Vec<String> {
            vec!["-c".to_string(), self.0.to_string()]
        }

        fn get_env_vars(&self) -> Vec<(String, String)> {
            vec![("KUBEPREP_TEST".to_string(), "yes".to_string())]
        }
    }

    struct Missing;

    impl HostCommand for Missing {
        fn program(&self) -> String {
            "this_binary_definitely_does_not_exist_12345".to_string()
        }

        fn to_cli_args(&self) -> Vec<String> {
            vec![]
        }

        fn get_env_vars(&self) -> Vec<(String, String)> {
            vec![]
        }
    }

    #[test]
    fn test_system_runner_captures_output_and_env() {
        let output = SystemRunner.run(&Shell("echo $KUBEPREP_TEST")).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "yes");
        assert_eq!(output.exit_code, Some(0));
    }

    #[test]
    fn test_system_runner_reports_failure_without_error() {
        let output = SystemRunner.run(&Shell("echo oops >&2; exit 3")).unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));

        let err = output.ensure_success().unwrap_err();
        match err {
            KubeprepError::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_system_runner_missing_program_is_launch_error() {
        let err = SystemRunner.run(&Missing).unwrap_err();
        assert!(matches!(err, KubeprepError::CommandLaunch { .. }));
    }

    #[test]
    fn test_tolerate() {
        let ok = CommandOutput::succeeded("true", "");
        assert!(ok.tolerate("never mind"));

        let failed = CommandOutput::failed("dnf remove -y containerd", 1, "No match");
        assert!(!failed.tolerate("containerd was not installed"));
    }

    #[test]
    fn test_dry_run_runner_never_spawns() {
        let output = DryRunRunner.run(&Missing).unwrap();
        assert!(output.success);
        assert!(output.stdout.is_empty());
    }
}
