//! Type-safe file placement commands.
//!
//! - `TarExtract` unpacks release tarballs
//! - `InstallFile` places a binary with a mode
//! - `GpgDearmor` converts an ASCII-armored key into a keyring

use std::path::PathBuf;

use crate::host_command::HostCommand;

/// `tar -C <dest> -xzf <archive>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarExtract {
    pub archive: PathBuf,
    pub dest: PathBuf,
}

impl HostCommand for TarExtract {
    fn program(&self) -> String {
        "tar".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-C".to_string(),
            self.dest.display().to_string(),
            "-xzf".to_string(),
            self.archive.display().to_string(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

/// `install -D -m <mode> <source> <dest>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFile {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub mode: u32,
}

impl HostCommand for InstallFile {
    fn program(&self) -> String {
        "install".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-D".to_string(),
            "-m".to_string(),
            format!("{:o}", self.mode),
            self.source.display().to_string(),
            self.dest.display().to_string(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

/// `gpg --batch --yes --dearmor -o <output> <input>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpgDearmor {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl HostCommand for GpgDearmor {
    fn program(&self) -> String {
        "gpg".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "--batch".to_string(),
            "--yes".to_string(),
            "--dearmor".to_string(),
            "-o".to_string(),
            self.output.display().to_string(),
            self.input.display().to_string(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tar_extract_args() {
        let cmd = TarExtract {
            archive: PathBuf::from("/tmp/kubeprep/containerd-1.7.22-linux-amd64.tar.gz"),
            dest: PathBuf::from("/usr/local"),
        };
        assert_eq!(
            cmd.command_line(),
            "tar -C /usr/local -xzf /tmp/kubeprep/containerd-1.7.22-linux-amd64.tar.gz"
        );
    }

    #[test]
    fn test_install_file_mode_is_octal() {
        let cmd = InstallFile {
            source: PathBuf::from("/tmp/kubeprep/runc.arm64"),
            dest: PathBuf::from("/usr/local/sbin/runc"),
            mode: 0o755,
        };
        assert_eq!(
            cmd.to_cli_args(),
            vec!["-D", "-m", "755", "/tmp/kubeprep/runc.arm64", "/usr/local/sbin/runc"]
        );
    }

    #[test]
    fn test_gpg_dearmor_args() {
        let cmd = GpgDearmor {
            input: PathBuf::from("/tmp/kubeprep/Release.key"),
            output: PathBuf::from("/etc/apt/keyrings/kubernetes-apt-keyring.gpg"),
        };
        assert!(cmd.command_line().starts_with("gpg --batch --yes --dearmor -o /etc/apt/keyrings/"));
    }
}
