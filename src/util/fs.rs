//! Small file helpers for the persisted session and intent records.

use std::fs;
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Read a TOML record, returning `None` when the file does not exist.
pub fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ReadError> {
    let raw = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(toml::from_str(&raw)?))
}

/// Serialize `value` as TOML and atomically replace `path` with it.
pub fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<(), WriteError> {
    let serialized = toml::to_string(value)?;
    atomic_write(path, serialized.as_bytes())
}

/// Remove `path`; a missing file is not an error.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("write failed: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("{0} has no file name")]
    NoFileName(PathBuf),
}

/// Default state directory (`~/.statement-gate`).
pub fn default_state_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".statement-gate"))
        .unwrap_or_else(|| PathBuf::from(".statement-gate"))
}

/// Lowercase, dash-separated file label; blank input maps to `default`.
pub fn normalize_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    let out: String = trimmed
        .chars()
        .map(|ch| {
            let lower = ch.to_ascii_lowercase();
            if lower.is_ascii_alphanumeric() || lower == '-' {
                lower
            } else {
                '-'
            }
        })
        .collect();
    if out.trim_matches('-').is_empty() {
        "default".to_string()
    } else {
        out
    }
}

/// Write to a private sibling temp file, then rename over `path` so readers
/// never observe a partial record.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), WriteError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| WriteError::NoFileName(path.to_path_buf()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let staging = path.with_file_name(format!(
        ".{}.{}-{stamp}.partial",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let staged = write_private(&staging, data).and_then(|()| fs::rename(&staging, path));
    if let Err(err) = staged {
        let _ = fs::remove_file(&staging);
        return Err(err.into());
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}
