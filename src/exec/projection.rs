// src/exec/projection.rs

//! Narrowed views over a task event stream.

use futures::future::{Ready, ready};
use futures::stream::{FilterMap, Stream, StreamExt};

use crate::event::{TaskError, TaskEvent};

type Item = Result<TaskEvent, TaskError>;
type Project<T> = fn(Item) -> Ready<Option<Result<T, TaskError>>>;

/// Stream of exit status values, see [`TaskStreamExt::only_exit_status`].
pub type ExitStatuses<S> = FilterMap<S, Ready<Option<Result<i32, TaskError>>>, Project<i32>>;

/// Stream of output payloads, see [`TaskStreamExt::only_output`].
pub type Outputs<S> = FilterMap<S, Ready<Option<Result<Vec<u8>, TaskError>>>, Project<Vec<u8>>>;

/// Projections available on any stream of task events.
pub trait TaskStreamExt: Stream<Item = Item> + Sized {
    /// Keep only the status codes of `Exit` events.
    ///
    /// Errors and completion pass through unchanged, so a failing task yields
    /// no value, just its error.
    fn only_exit_status(self) -> ExitStatuses<Self> {
        self.filter_map(exit_status_of as Project<i32>)
    }

    /// Keep only stdout and stderr payloads, in arrival order.
    fn only_output(self) -> Outputs<Self> {
        self.filter_map(output_of as Project<Vec<u8>>)
    }
}

impl<S> TaskStreamExt for S where S: Stream<Item = Item> {}

fn exit_status_of(item: Item) -> Ready<Option<Result<i32, TaskError>>> {
    ready(match item {
        Ok(event) => event.exit_status().map(Ok),
        Err(err) => Some(Err(err)),
    })
}

fn output_of(item: Item) -> Ready<Option<Result<Vec<u8>, TaskError>>> {
    ready(match item {
        Ok(event) => event.into_output().map(Ok),
        Err(err) => Some(Err(err)),
    })
}
