// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawTaskFile, TaskFile};
use crate::errors::Result;

/// Load a task file from a given path and return the raw `RawTaskFile`.
///
/// This only performs TOML deserialization; it does **not** resolve relative
/// paths or validate anything. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawTaskFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawTaskFile = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load a task file from path, resolve a relative `cwd` against the file's
/// directory, and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<TaskFile> {
    let path = path.as_ref();
    let mut raw = load_from_path(path)?;

    if let Some(cwd) = raw.cwd.take() {
        raw.cwd = Some(match path.parent() {
            Some(base) if cwd.is_relative() && !base.as_os_str().is_empty() => base.join(cwd),
            _ => cwd,
        });
    }

    TaskFile::try_from(raw)
}
