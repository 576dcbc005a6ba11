//! Command-line arguments and their validation into a send mode

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Uploader for Fileway
#[derive(Clone, Debug, Default, Parser)]
#[command(name = "fileway-ul", version, about = "Uploader for Fileway")]
pub struct Args {
    /// Send a text. Incompatible with --zip.
    #[arg(long)]
    pub txt: bool,

    /// Save the secret to user home.
    #[arg(long)]
    pub save: bool,

    /// Enable zip mode. Incompatible with --txt.
    #[arg(long)]
    pub zip: bool,

    /// Relay base URL (overrides FILEWAY_URL and the config file)
    #[arg(long)]
    pub url: Option<String>,

    /// Append transfer events to this file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// No progress display
    #[arg(short, long)]
    pub quiet: bool,

    /// Show processing stages
    #[arg(short, long)]
    pub verbose: bool,

    /// List of files if --zip, just one if not; a text if --txt.
    pub payloads: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendMode {
    Text(String),
    Zip(Vec<PathBuf>),
    File(PathBuf),
}

impl Args {
    /// Check flag combinations and inputs; nothing here touches the network
    pub fn mode(&self) -> Result<SendMode> {
        if self.payloads.is_empty() {
            return Err(Error::Validation("No files specified".to_string()));
        }
        if self.txt && self.zip {
            return Err(Error::Validation(
                "Error: --txt and --zip are incompatible.".to_string(),
            ));
        }

        if self.txt {
            let text = self.payloads.join(" ");
            if text.is_empty() {
                return Err(Error::Validation("Error: the text is empty.".to_string()));
            }
            return Ok(SendMode::Text(text));
        }

        if self.zip {
            return Ok(SendMode::Zip(self.payloads.iter().map(PathBuf::from).collect()));
        }

        if self.payloads.len() > 1 {
            return Err(Error::Validation(
                "To upload multiple files, specify '--zip'".to_string(),
            ));
        }
        let path = PathBuf::from(&self.payloads[0]);
        validate_file(&path)?;
        Ok(SendMode::File(path))
    }
}

/// A single upload payload must be an existing, readable, non-empty regular file
pub fn validate_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::Validation(format!(
            "Error: File '{}' does not exist.",
            path.display()
        )));
    }
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(Error::Validation(format!(
            "Error: '{}' is not a file.",
            path.display()
        )));
    }
    if std::fs::File::open(path).is_err() {
        return Err(Error::Validation(format!(
            "Error: Unable to read file '{}'. Check file permissions.",
            path.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(Error::Validation(format!(
            "Error: File '{}' is empty.",
            path.display()
        )));
    }
    Ok(())
}
