// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ephemeral TSIG key files
//!
//! `dig` and `nsupdate` read TSIG keys from a file (`-k`). Passing the secret on
//! the command line (`-y`) would expose it in the process table, so each
//! operation writes the key to its own short-lived file instead:
//!
//! - the directory is created with mode 0700, the file with mode 0600
//! - file names combine a timestamp and a random suffix
//! - [`KeyFile::release`] deletes the file; if a handle is dropped without
//!   being released (panic, cancelled future) `Drop` deletes it instead

use rand::{distributions::Alphanumeric, Rng};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{metrics, tsig::TsigKey};

/// Key file errors
#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("Failed to prepare key directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write key file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove key file {path}: {source}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Creates one key file per external invocation inside a private directory
#[derive(Debug, Clone)]
pub struct KeyFileManager {
    dir: PathBuf,
}

impl KeyFileManager {
    /// Create a manager owning `dir`. Nothing touches the filesystem until
    /// the first [`acquire`](Self::acquire).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `key` to a fresh file and return its handle
    pub fn acquire(&self, key: &TsigKey) -> Result<KeyFile, KeyFileError> {
        self.ensure_dir()?;

        let path = self.dir.join(unique_file_name());
        write_private(&path, key.to_key_stanza().as_bytes()).map_err(|source| {
            // create_new may have created the file before the write failed
            let _ = fs::remove_file(&path);
            KeyFileError::Write {
                path: path.clone(),
                source,
            }
        })?;

        debug!("Materialized key {} at {}", key.name(), path.display());
        metrics::KEY_FILES_ACTIVE.inc();

        Ok(KeyFile {
            path,
            released: false,
        })
    }

    /// Create the directory if needed and (re)apply owner-only permissions
    fn ensure_dir(&self) -> Result<(), KeyFileError> {
        let to_err = |source| KeyFileError::Directory {
            path: self.dir.clone(),
            source,
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
            fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(&self.dir)
                .map_err(to_err)?;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700)).map_err(to_err)?;
        }

        #[cfg(not(unix))]
        {
            fs::create_dir_all(&self.dir).map_err(to_err)?;
        }

        Ok(())
    }
}

/// Handle to a materialized key file
///
/// The path is only valid for the invocation that acquired it.
#[derive(Debug)]
pub struct KeyFile {
    path: PathBuf,
    released: bool,
}

impl KeyFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file
    pub fn release(mut self) -> Result<(), KeyFileError> {
        self.released = true;
        metrics::KEY_FILES_ACTIVE.dec();
        remove(&self.path)
    }
}

impl Drop for KeyFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        metrics::KEY_FILES_ACTIVE.dec();
        match remove(&self.path) {
            Ok(()) => debug!("Key file {} removed on drop", self.path.display()),
            Err(e) => warn!("{}", e),
        }
    }
}

fn remove(path: &Path) -> Result<(), KeyFileError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        // Already gone is as good as removed
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(KeyFileError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// `tsig-<unix millis>-<16 random alphanumerics>.key`
fn unique_file_name() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    format!(
        "tsig-{}-{}.key",
        chrono::Utc::now().timestamp_millis(),
        suffix
    )
}

/// Create `path` (which must not exist) readable and writable by the owner only
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    #[cfg(unix)]
    let mut file = {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)?
    };

    #[cfg(not(unix))]
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;

    file.write_all(contents)?;
    file.sync_all()
}
