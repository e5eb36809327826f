//! Type-safe host command contracts.
//!
//! Every external program kubeprep invokes (`dnf`, `apt-get`, `systemctl`,
//! `tar`, ...) is described by a struct implementing `HostCommand`. The
//! struct definition is the contract: flag spelling lives in exactly one
//! place and the compiler catches a misspelled field.
//!
//! # Example
//!
//! ```ignore
//! use kubeprep::commands::packages::Dnf;
//! use kubeprep::host_command::HostCommand;
//!
//! let cmd = Dnf::Install {
//!     packages: vec!["kubelet".into(), "kubeadm".into(), "kubectl".into()],
//!     disable_excludes: Some("kubernetes".into()),
//! };
//! assert_eq!(cmd.command_line(), "dnf install -y kubelet kubeadm kubectl --disableexcludes=kubernetes");
//! ```

/// Trait for typed host command invocations.
///
/// # Contract
///
/// - `program()`: executable name or absolute path.
/// - `to_cli_args()`: arguments exactly as the program expects them.
/// - `get_env_vars()`: environment variables the invocation requires.
pub trait HostCommand {
    /// Executable to run (looked up in `PATH` unless absolute).
    fn program(&self) -> String;

    /// Convert struct fields to CLI arguments.
    fn to_cli_args(&self) -> Vec<String>;

    /// Get required environment variables.
    fn get_env_vars(&self) -> Vec<(String, String)>;

    /// Human-readable command line for logs and errors.
    fn command_line(&self) -> String {
        let mut line = self.program();
        for arg in self.to_cli_args() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}
