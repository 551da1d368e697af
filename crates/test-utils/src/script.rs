use std::io::Write;
use std::path::Path;

use tempfile::TempPath;
use taskstream::Task;

/// A throwaway shell script, deleted when dropped.
///
/// Scripts are run through `/bin/sh` rather than executed directly, which
/// avoids `ETXTBSY` when another test thread forks while the file is still
/// being written.
pub struct ScriptFile {
    path: TempPath,
}

impl ScriptFile {
    pub fn new(commands: &[&str]) -> anyhow::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("taskstream-")
            .suffix(".sh")
            .tempfile()?;

        writeln!(file, "#!/bin/sh")?;
        for command in commands {
            writeln!(file, "{command}")?;
        }
        file.flush()?;

        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A task that runs this script.
    pub fn task(&self) -> Task {
        Task::new("/bin/sh").arg(self.path.to_string_lossy())
    }
}
