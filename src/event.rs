// src/event.rs

//! Events and terminal errors produced by a launched [`Task`](crate::task::Task).

use std::fmt;

use thiserror::Error;

/// One emission in the lifecycle stream of a launched task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// The process has been spawned. Always the first event, exactly once.
    Start { command: String },

    /// A chunk of bytes read from the process's stdout pipe.
    StdOut(Vec<u8>),

    /// A chunk of bytes read from the process's stderr pipe.
    StdErr(Vec<u8>),

    /// The process exited with status 0. Always the last event.
    Exit { status_code: i32 },
}

impl TaskEvent {
    /// Status code carried by an `Exit` event.
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            TaskEvent::Exit { status_code } => Some(*status_code),
            _ => None,
        }
    }

    /// Payload of a `StdOut` or `StdErr` event.
    pub fn output(&self) -> Option<&[u8]> {
        match self {
            TaskEvent::StdOut(data) | TaskEvent::StdErr(data) => Some(data),
            _ => None,
        }
    }

    /// Owned variant of [`TaskEvent::output`].
    pub fn into_output(self) -> Option<Vec<u8>> {
        match self {
            TaskEvent::StdOut(data) | TaskEvent::StdErr(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskEvent::Exit { .. })
    }
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskEvent::Start { command } => write!(f, "start: {command}"),
            TaskEvent::StdOut(data) => write!(f, "stdout: {:?}", String::from_utf8_lossy(data)),
            TaskEvent::StdErr(data) => write!(f, "stderr: {:?}", String::from_utf8_lossy(data)),
            TaskEvent::Exit { status_code } => write!(f, "exit: {status_code}"),
        }
    }
}

/// Terminal failure of a task stream.
///
/// A stream yields at most one of these, and nothing after it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The process exited normally with a non-zero status.
    #[error("process exited with status {status_code}")]
    ExitFailure { status_code: i32 },

    /// The process was terminated by a signal instead of exiting.
    #[error("process was terminated by an uncaught signal")]
    UncaughtSignal,

    /// A unit of piped stdin could not be encoded into bytes.
    #[error("could not encode stdin input: {text:?}")]
    InputEncodingFailure { text: String },

    /// Waiting on the process failed, so its outcome is unknown.
    #[error("lost track of the process: {reason}")]
    Wait { reason: String },
}

impl TaskError {
    /// Exit code a CLI wrapper should mirror for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskError::ExitFailure { status_code } => *status_code,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_pick_the_right_variants() {
        let out = TaskEvent::StdOut(b"hi\n".to_vec());
        let err = TaskEvent::StdErr(b"oops\n".to_vec());
        let start = TaskEvent::Start {
            command: "/bin/true".to_string(),
        };
        let exit = TaskEvent::Exit { status_code: 0 };

        assert_eq!(out.output(), Some(&b"hi\n"[..]));
        assert_eq!(err.clone().into_output(), Some(b"oops\n".to_vec()));
        assert_eq!(start.output(), None);
        assert_eq!(start.exit_status(), None);
        assert_eq!(exit.exit_status(), Some(0));
        assert!(exit.is_terminal());
        assert!(!out.is_terminal());
    }

    #[test]
    fn events_compare_by_variant_and_payload() {
        assert_eq!(
            TaskEvent::StdOut(b"a".to_vec()),
            TaskEvent::StdOut(b"a".to_vec())
        );
        assert_ne!(
            TaskEvent::StdOut(b"a".to_vec()),
            TaskEvent::StdErr(b"a".to_vec())
        );
        assert_ne!(
            TaskEvent::Exit { status_code: 0 },
            TaskEvent::Exit { status_code: 1 }
        );
    }

    #[test]
    fn display_escapes_output_chunks() {
        assert_eq!(
            TaskEvent::StdOut(b"hello\n".to_vec()).to_string(),
            r#"stdout: "hello\n""#
        );
        assert_eq!(TaskEvent::Exit { status_code: 0 }.to_string(), "exit: 0");
    }

    #[test]
    fn exit_code_mirrors_child_status() {
        assert_eq!(TaskError::ExitFailure { status_code: 100 }.exit_code(), 100);
        assert_eq!(TaskError::UncaughtSignal.exit_code(), 1);
    }
}
