//! Fileway uploader library
//!
//! Sends a file, a ZIP bundle of several paths, or a short text through a
//! Fileway relay: setup, poll until a downloader connects and the relay hands
//! out a chunk plan, then PUT the payload chunk by chunk.

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod fs_enum;
pub mod logger;
pub mod packager;
pub mod progress;
pub mod prompt;
pub mod protocol;
pub mod relay;
pub mod transfer;
pub mod url;

pub use error::{Error, Result};
pub use transfer::{ChunkPlan, Payload, PayloadMeta, PollPolicy, Session, TransferClient, TransferState};
