// src/exec/mod.rs

//! Process execution layer.
//!
//! This module maps one OS process onto a stream of [`TaskEvent`]s, using
//! `tokio::process::Command` underneath.
//!
//! - [`process`] owns the spawned child, its pipes, and the pipe reader /
//!   stdin feeder tasks.
//! - [`stream`] wraps a process in the public [`TaskEventStream`]: ordering,
//!   outcome classification and cancellation.
//! - [`projection`] provides the `only_exit_status` / `only_output` views.
//!
//! [`TaskEvent`]: crate::event::TaskEvent

pub mod process;
pub mod projection;
pub mod stream;

pub use process::{ProcessHandle, ProcessOutput, Termination};
pub use projection::{ExitStatuses, Outputs, TaskStreamExt};
pub use stream::TaskEventStream;
