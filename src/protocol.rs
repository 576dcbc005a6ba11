//! Shared constants for the Fileway relay HTTP contract

// Header carrying the shared secret on every relay call
pub const SECRET_HEADER: &str = "x-fileway-secret";

// The relay screens crawler user agents; identify as the uploader
pub const USER_AGENT: &str = "FilewayUploader";

// Endpoint paths (relative to the base URL)
pub mod endpoint {
    pub const SETUP: &str = "/setup";
    pub const PING: &str = "/ping";
    pub const UPLOAD: &str = "/ul";
    pub const DOWNLOAD: &str = "/dl";
}

// Query parameter names for setup
pub mod query {
    pub const FILENAME: &str = "filename";
    pub const SIZE: &str = "size";
    pub const TEXT: &str = "txt";
}

// Centralized timeout constants
pub mod timeouts {
    // Per-call timeout for setup, ping and upload requests (s)
    pub const REQUEST_SECS: u64 = 30;

    // Fixed interval between readiness polls (ms)
    pub const POLL_INTERVAL_MS: u64 = 1000;
}

/// Build `{base}{endpoint}/{id}` for the per-session endpoints
pub fn session_path(endpoint: &str, conduit_id: &str) -> String {
    format!("{}/{}", endpoint, conduit_id)
}
