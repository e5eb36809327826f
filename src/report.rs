//! Terminal report of a bootstrap run

use std::fmt::Write as _;

use serde::Serialize;
use tracing::{error, info};

use crate::error::Result;
use crate::types::OutcomeStatus;

/// Result of one bootstrap component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationOutcome {
    pub component: String,
    pub status: OutcomeStatus,
}

/// Version reported by an installed tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedTool {
    pub tool: String,
    pub version: String,
}

/// Outcomes collected over a run, in execution order.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Report {
    outcomes: Vec<InstallationOutcome>,
    verified: Vec<VerifiedTool>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome.
    pub fn record(&mut self, component: impl Into<String>, status: OutcomeStatus) {
        let component = component.into();
        match status {
            OutcomeStatus::Failed => error!("{} {}: {}", status.glyph(), component, status),
            _ => info!("{} {}: {}", status.glyph(), component, status),
        }
        self.outcomes.push(InstallationOutcome { component, status });
    }

    /// Run one component and record its outcome.
    ///
    /// An error is recorded as `Failed` and returned unchanged.
    pub fn step<F>(&mut self, component: &str, run: F) -> Result<OutcomeStatus>
    where
        F: FnOnce() -> Result<OutcomeStatus>,
    {
        info!("==> {}", component);
        match run() {
            Ok(status) => {
                self.record(component, status);
                Ok(status)
            }
            Err(e) => {
                self.record(component, OutcomeStatus::Failed);
                Err(e)
            }
        }
    }

    /// Record the version line of a verified tool.
    pub fn verified(&mut self, tool: impl Into<String>, version: impl Into<String>) {
        let tool = tool.into();
        let version = version.into();
        info!("{} reports: {}", tool, version);
        self.verified.push(VerifiedTool { tool, version });
    }

    pub fn outcomes(&self) -> &[InstallationOutcome] {
        &self.outcomes
    }

    pub fn verified_tools(&self) -> &[VerifiedTool] {
        &self.verified
    }

    /// Status of the most recent outcome for `component`.
    pub fn status_of(&self, component: &str) -> Option<OutcomeStatus> {
        self.outcomes
            .iter()
            .rev()
            .find(|o| o.component == component)
            .map(|o| o.status)
    }

    /// Returns true if no component failed.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_ok())
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty() && self.verified.is_empty()
    }

    /// Render the report for the terminal.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let width = self
            .outcomes
            .iter()
            .map(|o| o.component.len())
            .max()
            .unwrap_or(0);

        for outcome in &self.outcomes {
            let _ = writeln!(
                out,
                " {} {:<width$}  {}",
                outcome.status.glyph(),
                outcome.component,
                outcome.status,
            );
        }

        if !self.verified.is_empty() {
            out.push_str("\nVerified:\n");
            for tool in &self.verified {
                let _ = writeln!(out, "   {}: {}", tool.tool, tool.version);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KubeprepError;

    #[test]
    fn test_step_records_success_and_failure() {
        let mut report = Report::new();

        let status = report
            .step("kernel modules", || Ok(OutcomeStatus::Installed))
            .unwrap();
        assert_eq!(status, OutcomeStatus::Installed);

        let err = report
            .step("containerd", || Err(KubeprepError::network("https://github.com", "timeout")))
            .unwrap_err();
        assert!(matches!(err, KubeprepError::Network { .. }));

        assert_eq!(report.outcomes().len(), 2);
        assert_eq!(report.status_of("containerd"), Some(OutcomeStatus::Failed));
        assert!(!report.is_success());
    }

    #[test]
    fn test_status_of_prefers_latest() {
        let mut report = Report::new();
        report.record("sysctl", OutcomeStatus::Installed);
        report.record("sysctl", OutcomeStatus::AlreadyPresent);
        assert_eq!(report.status_of("sysctl"), Some(OutcomeStatus::AlreadyPresent));
        assert_eq!(report.status_of("kubelet"), None);
        assert!(report.is_success());
    }

    #[test]
    fn test_render() {
        let mut report = Report::new();
        assert!(report.is_empty());
        report.record("crictl", OutcomeStatus::Installed);
        report.record("remove distro runc", OutcomeStatus::Tolerated);
        report.verified("kubeadm", "v1.30.11");

        let text = report.render();
        assert!(text.contains(" ✓ crictl              installed\n"));
        assert!(text.contains(" ~ remove distro runc  tolerated\n"));
        assert!(text.contains("Verified:\n   kubeadm: v1.30.11\n"));
    }
}
