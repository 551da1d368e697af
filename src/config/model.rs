// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::task::{InputEncoding, StdinSource, Task};

/// A task description as read from a TOML file, before validation.
///
/// ```toml
/// program = "/bin/sh"
/// args = ["-c", "cat"]
/// cwd = "work"
/// stdin = ["hello\n"]
/// stdin_encoding = "ascii"
///
/// [env]
/// PATH = "/usr/bin:/bin"
/// ```
///
/// Everything except `program` is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTaskFile {
    /// Path of the executable.
    pub program: String,

    /// Arguments, passed verbatim.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory. Relative paths are resolved against the directory
    /// containing the task file.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Replacement environment. If absent, the caller's is inherited.
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,

    /// Text units written to the child's stdin, in order.
    #[serde(default)]
    pub stdin: Option<Vec<String>>,

    /// How `stdin` units are encoded: `"utf8"` (default) or `"ascii"`.
    #[serde(default)]
    pub stdin_encoding: InputEncoding,
}

/// A validated task file.
///
/// Obtain one through [`load_and_validate`](crate::config::load_and_validate)
/// or `TaskFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct TaskFile {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Option<BTreeMap<String, String>>,
    pub stdin: Option<Vec<String>>,
    pub stdin_encoding: InputEncoding,
}

impl TaskFile {
    pub(crate) fn new_unchecked(raw: RawTaskFile) -> Self {
        Self {
            program: raw.program,
            args: raw.args,
            cwd: raw.cwd,
            env: raw.env,
            stdin: raw.stdin,
            stdin_encoding: raw.stdin_encoding,
        }
    }

    /// Build the launchable [`Task`] this file describes.
    pub fn to_task(&self) -> Task {
        let mut task = Task::new(&self.program).args(self.args.iter().cloned());

        if let Some(ref cwd) = self.cwd {
            task = task.current_dir(cwd);
        }
        if let Some(ref env) = self.env {
            task = task.envs(env.clone());
        }
        if let Some(ref units) = self.stdin {
            task = task.stdin(StdinSource::encoded(units.clone(), self.stdin_encoding));
        }

        task
    }
}
