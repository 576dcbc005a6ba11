//! Shared-secret resolution and the obfuscated per-user credential file
//!
//! Resolution order, first hit wins:
//! 1. `FILEWAY_SECRET`
//! 2. `FILEWAY_PASSWORD` (deprecated, prints a notice)
//! 3. `~/.fileway-creds`, trusted only with mode `0400`
//! 4. interactive prompt, optionally saved to the credential file
//!
//! The file content is XOR-obfuscated so that `cat`-ing it does not show the
//! secret. That is obstruction, not encryption.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::home_dir;
use crate::error::{Error, Result};
use crate::prompt::SecretPrompt;

pub const SECRET_ENV: &str = "FILEWAY_SECRET";
pub const DEPRECATED_SECRET_ENV: &str = "FILEWAY_PASSWORD";
pub const CREDS_FILE_NAME: &str = ".fileway-creds";

/// Owner read-only
pub const REQUIRED_MODE: u32 = 0o400;

const OBFUSCATION_KEY: u32 = 17;

/// XOR every Unicode scalar with a fixed key. Self-inverse.
pub fn obfuscate(text: &str) -> String {
    text.chars()
        .map(|c| {
            // Flipping bits 0 and 4 never lands in the surrogate range or past U+10FFFF
            char::from_u32(c as u32 ^ OBFUSCATION_KEY).unwrap_or(c)
        })
        .collect()
}

pub fn deobfuscate(text: &str) -> String {
    obfuscate(text)
}

/// Secret values found in the environment
#[derive(Debug, Clone, Default)]
pub struct CredentialSources {
    pub secret: Option<String>,
    pub deprecated: Option<String>,
}

impl CredentialSources {
    pub fn from_env() -> Self {
        Self {
            secret: std::env::var(SECRET_ENV).ok(),
            deprecated: std::env::var(DEPRECATED_SECRET_ENV).ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretOrigin {
    Environment,
    DeprecatedEnvironment,
    CredentialFile,
    Prompt { saved: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    pub secret: String,
    pub origin: SecretOrigin,
}

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.fileway-creds`
    pub fn default_path() -> PathBuf {
        home_dir().join(CREDS_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn resolve(
        &self,
        sources: &CredentialSources,
        prompt: &dyn SecretPrompt,
        save: bool,
    ) -> Result<ResolvedSecret> {
        if let Some(secret) = &sources.secret {
            return Ok(ResolvedSecret {
                secret: secret.clone(),
                origin: SecretOrigin::Environment,
            });
        }

        if let Some(secret) = &sources.deprecated {
            eprintln!(
                "'{}' environment variable is deprecated, use '{}' instead.",
                DEPRECATED_SECRET_ENV, SECRET_ENV
            );
            return Ok(ResolvedSecret {
                secret: secret.clone(),
                origin: SecretOrigin::DeprecatedEnvironment,
            });
        }

        if let Some(secret) = self.load()? {
            return Ok(ResolvedSecret {
                secret,
                origin: SecretOrigin::CredentialFile,
            });
        }

        let secret = prompt.read_secret("Please enter the secret: ")?;
        if save {
            self.store(&secret)?;
        }
        Ok(ResolvedSecret {
            secret,
            origin: SecretOrigin::Prompt { saved: save },
        })
    }

    /// Read the credential file. `Ok(None)` when it does not exist.
    pub fn load(&self) -> Result<Option<String>> {
        let mut file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = file.metadata()?.permissions().mode() & 0o777;
            if mode != REQUIRED_MODE {
                return Err(Error::InsecurePermissions {
                    path: self.path.clone(),
                    mode,
                });
            }
        }

        let mut data = String::new();
        file.read_to_string(&mut data)?;
        Ok(Some(deobfuscate(data.trim_end_matches(['\r', '\n']))))
    }

    /// Write the obfuscated secret and lock the file down to `0400`
    pub fn store(&self, secret: &str) -> Result<()> {
        self.store_with(secret, |f, data| {
            f.write_all(data)?;
            f.sync_all()
        })
    }

    fn store_with<W>(&self, secret: &str, write: W) -> Result<()>
    where
        W: FnOnce(&mut fs::File, &[u8]) -> std::io::Result<()>,
    {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut f = options.open(&self.path)?;
        // A half-written 0600 file would fail every later load
        if let Err(e) = write(&mut f, obfuscate(secret).as_bytes()) {
            drop(f);
            let _ = fs::remove_file(&self.path);
            return Err(e.into());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(REQUIRED_MODE))?;
        }
        #[cfg(not(unix))]
        {
            let mut perms = f.metadata()?.permissions();
            perms.set_readonly(true);
            fs::set_permissions(&self.path, perms)?;
        }
        Ok(())
    }
}
