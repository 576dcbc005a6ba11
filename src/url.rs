//! Base URL parsing for the relay and download-link rendering

use crate::error::{Error, Result};
use crate::protocol::{endpoint, session_path};

/// Normalized relay base URL (scheme + authority + optional prefix, no trailing slash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let s_trim = raw.trim();
        let lower = s_trim.to_ascii_lowercase();
        let scheme_end = lower
            .find("://")
            .ok_or_else(|| Error::Validation(format!("Invalid relay URL '{}': missing scheme", raw)))?;
        let scheme = &lower[..scheme_end];
        if scheme != "http" && scheme != "https" {
            return Err(Error::Validation(format!(
                "Invalid relay URL '{}': scheme must be http or https",
                raw
            )));
        }
        let rest = s_trim[scheme_end + 3..].trim_end_matches('/');
        let host = rest.split('/').next().unwrap_or("");
        if host.is_empty() {
            return Err(Error::Validation(format!(
                "Invalid relay URL '{}': missing host",
                raw
            )));
        }
        Ok(BaseUrl(format!("{}://{}", scheme, rest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute URL for a relay path such as `/setup` or `/ul/<id>`
    pub fn join(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }

    /// Where a downloader fetches the payload of a session
    pub fn download_url(&self, conduit_id: &str) -> String {
        self.join(&session_path(endpoint::DOWNLOAD, conduit_id))
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
