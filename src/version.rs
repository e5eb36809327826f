//! Kubernetes version resolution
//!
//! Turns an optional user-supplied version into a concrete `VersionSpec`:
//! the full version (possibly pinned to a patch release) and the
//! `vMAJOR.MINOR` channel that selects the package repository.
//!
//! Accepted input, with an optional leading `v`:
//!
//! - `MAJOR.MINOR` (e.g. `1.30`), installs the newest patch of the channel
//! - `MAJOR.MINOR.PATCH` (e.g. `1.30.11`)
//! - either of the above followed by a package revision, e.g. `1.30.11-1.1`
//!   as listed by `apt-cache madison kubeadm`
//!
//! No input means "latest stable", looked up on `dl.k8s.io`.

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::error::{KubeprepError, Result};
use crate::fetch::Fetcher;

/// Endpoint publishing the latest stable Kubernetes tag (e.g. `v1.31.2`)
pub const STABLE_RELEASE_URL: &str = "https://dl.k8s.io/release/stable.txt";

/// A parsed Kubernetes version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KubeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
    /// Distribution package revision (`1.1` in `1.30.11-1.1`)
    pub revision: Option<String>,
}

impl KubeVersion {
    /// Parse a version string.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let invalid = |reason: &str| KubeprepError::invalid_version(input, reason);

        if trimmed.is_empty() {
            return Err(invalid("version is empty"));
        }

        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let (core, revision) = match body.split_once('-') {
            Some((core, rev)) => {
                if !is_dotted_numeric(rev) {
                    return Err(invalid("package revision must be dot-separated numbers"));
                }
                (core, Some(rev.to_string()))
            }
            None => (body, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(invalid("expected MAJOR.MINOR or MAJOR.MINOR.PATCH"));
        }
        let numbers = parts
            .iter()
            .map(|part| parse_component(part))
            .collect::<Option<Vec<u32>>>()
            .ok_or_else(|| invalid("version components must be numbers"))?;

        if revision.is_some() && numbers.len() == 2 {
            return Err(invalid("package revision requires a patch version"));
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers.get(2).copied(),
            revision,
        })
    }

    /// Repository channel, e.g. `v1.30`.
    pub fn channel(&self) -> String {
        format!("v{}.{}", self.major, self.minor)
    }

    /// Returns true if a specific patch release was requested.
    pub fn is_pinned(&self) -> bool {
        self.patch.is_some()
    }

    /// The release line one minor below this one, unpinned.
    pub fn previous_minor(&self) -> Result<Self> {
        if self.minor == 0 {
            return Err(KubeprepError::invalid_version(
                self.to_string(),
                "there is no minor release before .0",
            ));
        }
        Ok(Self {
            major: self.major,
            minor: self.minor - 1,
            patch: None,
            revision: None,
        })
    }

    /// `MAJOR.MINOR.PATCH` without revision, if pinned.
    pub fn patch_version(&self) -> Option<String> {
        self.patch
            .map(|patch| format!("{}.{}.{}", self.major, self.minor, patch))
    }
}

impl fmt::Display for KubeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(patch) = self.patch {
            write!(f, ".{patch}")?;
        }
        if let Some(revision) = &self.revision {
            write!(f, "-{revision}")?;
        }
        Ok(())
    }
}

impl FromStr for KubeVersion {
    type Err = KubeprepError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_component(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

fn is_dotted_numeric(text: &str) -> bool {
    !text.is_empty() && text.split('.').all(|part| parse_component(part).is_some())
}

/// Resolved version, constructed once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    /// What the operator typed, if anything
    pub raw_input: Option<String>,
    /// Version that drives package selection
    pub full: KubeVersion,
    /// Repository channel, e.g. `v1.30`
    pub channel: String,
}

impl VersionSpec {
    fn new(raw_input: Option<String>, full: KubeVersion) -> Self {
        let channel = full.channel();
        Self {
            raw_input,
            full,
            channel,
        }
    }

    /// Step down to the previous minor channel, dropping any patch pin.
    pub fn into_previous_minor(self) -> Result<Self> {
        let previous = self.full.previous_minor()?;
        Ok(Self::new(self.raw_input, previous))
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (channel {})", self.full, self.channel)
    }
}

/// Resolves optional user input into a `VersionSpec`.
pub struct VersionResolver<'a> {
    fetcher: &'a dyn Fetcher,
    stable_url: String,
}

impl<'a> VersionResolver<'a> {
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self {
            fetcher,
            stable_url: STABLE_RELEASE_URL.to_string(),
        }
    }

    /// Use a different "latest stable" endpoint.
    pub fn with_stable_url(mut self, url: impl Into<String>) -> Self {
        self.stable_url = url.into();
        self
    }

    /// Resolve `input`; blank or absent input means latest stable.
    pub fn resolve(&self, input: Option<&str>) -> Result<VersionSpec> {
        match input.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let full = KubeVersion::parse(raw)?;
                info!("Using requested Kubernetes version {}", full);
                Ok(VersionSpec::new(Some(raw.to_string()), full))
            }
            None => {
                let tag = self.latest_stable()?;
                let full = KubeVersion::parse(&tag)?;
                info!("Latest stable Kubernetes release is {}", full);
                Ok(VersionSpec::new(None, full))
            }
        }
    }

    /// Fetch the latest stable tag.
    pub fn latest_stable(&self) -> Result<String> {
        let body = self.fetcher.fetch_text(&self.stable_url)?;
        let tag = body.trim();
        if tag.is_empty() {
            return Err(KubeprepError::network(&self.stable_url, "empty response"));
        }
        Ok(tag.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::Path;

    struct StableFetcher {
        body: &'static str,
        calls: Cell<usize>,
    }

    impl Fetcher for StableFetcher {
        fn fetch_text(&self, url: &str) -> Result<String> {
            assert_eq!(url, STABLE_RELEASE_URL);
            self.calls.set(self.calls.get() + 1);
            Ok(self.body.to_string())
        }

        fn download(&self, url: &str, _dest: &Path) -> Result<()> {
            panic!("unexpected download of {url}");
        }
    }

    fn fetcher(body: &'static str) -> StableFetcher {
        StableFetcher {
            body,
            calls: Cell::new(0),
        }
    }

    #[test]
    fn test_parse_major_minor() {
        let v = KubeVersion::parse("1.30").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 30, None));
        assert!(!v.is_pinned());
        assert_eq!(v.channel(), "v1.30");
        assert_eq!(v.to_string(), "1.30");
    }

    #[test]
    fn test_parse_with_prefix_and_patch() {
        let v = KubeVersion::parse("v1.31.2").unwrap();
        assert_eq!(v.patch, Some(2));
        assert_eq!(v.channel(), "v1.31");
        assert_eq!(v.patch_version().as_deref(), Some("1.31.2"));
    }

    #[test]
    fn test_parse_package_revision() {
        let v = KubeVersion::parse("1.30.11-1.1").unwrap();
        assert_eq!(v.channel(), "v1.30");
        assert_eq!(v.revision.as_deref(), Some("1.1"));
        assert_eq!(v.to_string(), "1.30.11-1.1");
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for input in [
            "", "   ", "1", "1.", ".30", "1.30.", "1.30.1.2", "one.two", "V1.30", "vv1.30",
            "1.30-1.1", "1.30.11-", "1.30.11-a", "1.-30", "+1.30",
        ] {
            let err = KubeVersion::parse(input).unwrap_err();
            assert!(
                matches!(err, KubeprepError::InvalidVersion { .. }),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(KubeVersion::parse(" 1.30\n").unwrap().channel(), "v1.30");
    }

    #[test]
    fn test_parse_rejects_overflow() {
        assert!(KubeVersion::parse("1.99999999999").is_err());
    }

    #[test]
    fn test_previous_minor() {
        let v = KubeVersion::parse("1.30.4").unwrap();
        let prev = v.previous_minor().unwrap();
        assert_eq!(prev.channel(), "v1.29");
        assert!(!prev.is_pinned());
        assert!(KubeVersion::parse("2.0").unwrap().previous_minor().is_err());
    }

    #[test]
    fn test_resolve_explicit_does_not_fetch() {
        let f = fetcher("v9.9.9\n");
        let spec = VersionResolver::new(&f).resolve(Some("1.30")).unwrap();
        assert_eq!(spec.channel, "v1.30");
        assert_eq!(spec.raw_input.as_deref(), Some("1.30"));
        assert_eq!(f.calls.get(), 0);
    }

    #[test]
    fn test_resolve_empty_uses_latest_stable() {
        let f = fetcher("v1.31.2\n");
        let resolver = VersionResolver::new(&f);

        let spec = resolver.resolve(None).unwrap();
        assert_eq!(spec.full, KubeVersion::parse("1.31.2").unwrap());
        assert_eq!(spec.channel, "v1.31");
        assert_eq!(spec.raw_input, None);

        let blank = resolver.resolve(Some("  ")).unwrap();
        assert_eq!(blank, spec);
        assert_eq!(f.calls.get(), 2);
    }

    #[test]
    fn test_resolve_empty_response_is_network_error() {
        let f = fetcher("\n");
        let err = VersionResolver::new(&f).resolve(None).unwrap_err();
        assert!(matches!(err, KubeprepError::Network { .. }));
    }

    #[test]
    fn test_into_previous_minor_keeps_input() {
        let f = fetcher("v1.31.2");
        let spec = VersionResolver::new(&f)
            .resolve(Some("1.31.2"))
            .unwrap()
            .into_previous_minor()
            .unwrap();
        assert_eq!(spec.channel, "v1.30");
        assert_eq!(spec.raw_input.as_deref(), Some("1.31.2"));
        assert_eq!(spec.to_string(), "1.30 (channel v1.30)");
    }
}
