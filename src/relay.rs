//! Transport seam between the transfer state machine and the relay
//!
//! `TransferClient` only ever talks to a [`Transport`]. Production uses the
//! blocking [`HttpTransport`]; tests substitute an in-memory script.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{Error, Result};
use crate::protocol::{self, timeouts};
use crate::url::BaseUrl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
}

/// One relay call. `path` is relative to the base URL (e.g. `/ping/abc123`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub secret: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RelayResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Response body as text, for error details and session ids
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }
}

/// Failure below the HTTP layer: no status code was received
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Failed(String),
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e.to_string())
    }
}

pub trait Transport {
    fn send(&self, request: &RelayRequest) -> std::result::Result<RelayResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &RelayRequest) -> std::result::Result<RelayResponse, TransportError> {
        (**self).send(request)
    }
}

/// Blocking HTTP transport with a fixed per-call timeout
pub struct HttpTransport {
    http: Client,
    base_url: BaseUrl,
}

impl HttpTransport {
    pub fn new(base_url: BaseUrl) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(timeouts::REQUEST_SECS))
    }

    pub fn with_timeout(base_url: BaseUrl, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(protocol::USER_AGENT)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &RelayRequest) -> std::result::Result<RelayResponse, TransportError> {
        let url = self.base_url.join(&request.path);
        let builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Put => self.http.put(&url).body(request.body.clone()),
        };
        let resp = builder
            .query(&request.query)
            .header(protocol::SECRET_HEADER, &request.secret)
            .send()
            .map_err(map_reqwest_error)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(map_reqwest_error)?.to_vec();
        Ok(RelayResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Failed(e.to_string())
    }
}
