// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Target directory preparation.
//!
//! The filesystem server only accepts absolute roots that already exist, so
//! the directory is created and probed for writability before the server is
//! launched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Name of the probe file written to check writability.
const PROBE_FILE: &str = ".write_test";

#[derive(Debug, thiserror::Error)]
pub enum TargetDirError {
    #[error("cannot expand `{path}`: {message}")]
    Expand { path: String, message: String },

    #[error("cannot create directory {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("directory {} is not writable: {source}", path.display())]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Make sure `path` exists and is writable; return it as an absolute path.
///
/// `~` and `$VAR` references are expanded first, and relative paths are
/// resolved against the current working directory.
pub fn setup_target_directory(path: &str) -> Result<PathBuf, TargetDirError> {
    let expanded = shellexpand::full(path).map_err(|e| TargetDirError::Expand {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    let target = absolutize(Path::new(expanded.as_ref()))
        .map_err(|source| TargetDirError::Create { path: PathBuf::from(path), source })?;

    fs::create_dir_all(&target)
        .map_err(|source| TargetDirError::Create { path: target.clone(), source })?;

    let probe = target.join(PROBE_FILE);
    fs::write(&probe, "test")
        .and_then(|()| fs::remove_file(&probe))
        .map_err(|source| TargetDirError::NotWritable { path: target.clone(), source })?;

    debug!(path = %target.display(), "target directory is writable");
    info!("Target directory: {}", target.display());
    Ok(target)
}

fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
