// src/config/validate.rs

use crate::config::model::{RawTaskFile, TaskFile};
use crate::errors::{Result, TaskStreamError};

impl TryFrom<RawTaskFile> for TaskFile {
    type Error = crate::errors::TaskStreamError;

    fn try_from(raw: RawTaskFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_task_file(&raw)?;
        Ok(TaskFile::new_unchecked(raw))
    }
}

fn validate_raw_task_file(raw: &RawTaskFile) -> Result<()> {
    validate_program(raw)?;
    validate_args(raw)?;
    validate_cwd(raw)?;
    validate_env(raw)?;
    Ok(())
}

fn validate_program(raw: &RawTaskFile) -> Result<()> {
    if raw.program.trim().is_empty() {
        return Err(TaskStreamError::ConfigError(
            "`program` must not be empty".to_string(),
        ));
    }
    if raw.program.contains('\0') {
        return Err(TaskStreamError::ConfigError(
            "`program` must not contain NUL bytes".to_string(),
        ));
    }
    Ok(())
}

fn validate_args(raw: &RawTaskFile) -> Result<()> {
    if let Some(pos) = raw.args.iter().position(|arg| arg.contains('\0')) {
        return Err(TaskStreamError::ConfigError(format!(
            "argument {} contains a NUL byte",
            pos
        )));
    }
    Ok(())
}

fn validate_cwd(raw: &RawTaskFile) -> Result<()> {
    if let Some(ref cwd) = raw.cwd {
        if !cwd.is_dir() {
            return Err(TaskStreamError::ConfigError(format!(
                "`cwd` '{}' is not an existing directory",
                cwd.display()
            )));
        }
    }
    Ok(())
}

fn validate_env(raw: &RawTaskFile) -> Result<()> {
    let Some(ref env) = raw.env else {
        return Ok(());
    };

    for (key, value) in env.iter() {
        if key.is_empty() {
            return Err(TaskStreamError::ConfigError(
                "[env] keys must not be empty".to_string(),
            ));
        }
        if key.contains('=') || key.contains('\0') {
            return Err(TaskStreamError::ConfigError(format!(
                "[env] key '{}' must not contain '=' or NUL",
                key
            )));
        }
        if value.contains('\0') {
            return Err(TaskStreamError::ConfigError(format!(
                "[env] value of '{}' must not contain NUL",
                key
            )));
        }
    }
    Ok(())
}
