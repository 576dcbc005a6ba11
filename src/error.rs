//! Error taxonomy for the uploader

use std::path::PathBuf;

use crate::transfer::TransferState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad input detected before the relay is contacted
    #[error("{0}")]
    Validation(String),

    #[error("Error in setting up: {detail} (HTTP {status})")]
    SetupFailed { status: u16, detail: String },

    /// Malformed or inconsistent chunk plan; usually a relay/client version mismatch
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("Error while waiting for a downloader: {detail} (HTTP {status})")]
    PollFailed { status: u16, detail: String },

    #[error("relay not ready after {0} polls")]
    PollExhausted(u64),

    #[error("Error in uploading chunk {chunk}: {detail} (HTTP {status})")]
    UploadFailed {
        chunk: usize,
        status: u16,
        detail: String,
    },

    #[error("upload timed out")]
    SessionExpired,

    #[error("chunk {chunk}: expected {expected} bytes from payload, got {actual}")]
    ShortRead {
        chunk: usize,
        expected: u64,
        actual: u64,
    },

    #[error("Permissions for {} must be '0400' (found '{mode:04o}')", .path.display())]
    InsecurePermissions { path: PathBuf, mode: u32 },

    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Error creating ZIP file: {0}")]
    Packaging(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interrupted")]
    Interrupted,

    #[error("session is {0:?}; no further requests allowed")]
    Terminal(TransferState),
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Packaging(e.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        Error::Packaging(e.to_string())
    }
}

impl Error {
    /// Process exit status for this error (130 mirrors 128 + SIGINT)
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Interrupted => 130,
            _ => 1,
        }
    }
}
