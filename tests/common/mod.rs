#![allow(dead_code, unused_imports)]

use futures::StreamExt;
use taskstream::{Task, TaskError, TaskEvent};

pub use taskstream_test_utils::{ScriptFile, init_tracing, with_timeout};

/// Every item a launch yields, errors included, in order.
pub async fn items_of(task: &Task) -> Vec<Result<TaskEvent, TaskError>> {
    let stream = task.launch().expect("task should launch");
    with_timeout(stream.collect::<Vec<_>>()).await
}

/// Concatenated stdout bytes of a run.
pub fn stdout_of(items: &[Result<TaskEvent, TaskError>]) -> Vec<u8> {
    items
        .iter()
        .filter_map(|item| match item {
            Ok(TaskEvent::StdOut(data)) => Some(data.as_slice()),
            _ => None,
        })
        .flatten()
        .copied()
        .collect()
}
