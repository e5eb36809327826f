//! HTTP access to release endpoints
//!
//! `Fetcher` is the seam between the resolver/installers and the network:
//! `HttpFetcher` talks to the real endpoints with a blocking reqwest client,
//! tests substitute canned responses.

use std::fs::{self, File};
use std::path::Path;

use tracing::debug;

use crate::error::{KubeprepError, Result};

/// User agent sent with every request; the GitHub API rejects anonymous clients.
pub const USER_AGENT: &str = concat!("kubeprep/", env!("CARGO_PKG_VERSION"));

/// Read-only access to release endpoints.
pub trait Fetcher {
    /// Fetch a URL and return its body as text.
    fn fetch_text(&self, url: &str) -> Result<String>;

    /// Download a URL to `dest`, replacing any existing file.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Blocking HTTP fetcher. No retries: a failed request is a failed run.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| KubeprepError::network("<client>", e.to_string()))?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        debug!("GET {}", url);
        self.client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| KubeprepError::network(url, e.to_string()))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_text(&self, url: &str) -> Result<String> {
        self.get(url)?
            .text()
            .map_err(|e| KubeprepError::network(url, e.to_string()))
    }

    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut response = self.get(url)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(dest)?;
        let bytes = response
            .copy_to(&mut file)
            .map_err(|e| KubeprepError::network(url, e.to_string()))?;
        debug!("Downloaded {} bytes to {}", bytes, dest.display());
        Ok(())
    }
}
