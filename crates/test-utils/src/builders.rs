use std::collections::BTreeMap;
use std::path::PathBuf;

use taskstream::InputEncoding;
use taskstream::config::{RawTaskFile, TaskFile};

/// Builder for `TaskFile` to simplify test setup.
pub struct TaskFileBuilder {
    raw: RawTaskFile,
}

impl TaskFileBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            raw: RawTaskFile {
                program: program.to_string(),
                args: vec![],
                cwd: None,
                env: None,
                stdin: None,
                stdin_encoding: InputEncoding::default(),
            },
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.raw.args.push(arg.to_string());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.raw
            .env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn stdin(mut self, unit: &str) -> Self {
        self.raw.stdin.get_or_insert_with(Vec::new).push(unit.to_string());
        self
    }

    pub fn stdin_encoding(mut self, encoding: InputEncoding) -> Self {
        self.raw.stdin_encoding = encoding;
        self
    }

    pub fn build_raw(self) -> RawTaskFile {
        self.raw
    }

    pub fn build(self) -> TaskFile {
        TaskFile::try_from(self.raw).expect("Failed to build valid task file from builder")
    }
}
