// src/exec/stream.rs

//! The public event stream of a launched task.

use std::future::pending;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{FusedStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep_until};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::event::{TaskError, TaskEvent};
use crate::exec::process::{ProcessHandle, ProcessOutput, Termination};
use crate::task::Task;

const EVENT_BUFFER: usize = 64;
const OUTPUT_BUFFER: usize = 32;

/// How long a pipe may stay quiet after the process exited before the
/// remaining output is abandoned. Background processes that inherited the
/// pipes would otherwise hold the stream open.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

type Item = std::result::Result<TaskEvent, TaskError>;
type Feeder = JoinHandle<std::result::Result<(), TaskError>>;

/// Ordered, cancellable stream of [`TaskEvent`]s for one launch.
///
/// Yields `Start`, then output chunks, then exactly one terminal outcome:
/// `Ok(Exit { status_code: 0 })` or an `Err(TaskError)`. The stream ends right
/// after the terminal outcome.
///
/// Dropping the stream, or calling [`cancel`](Self::cancel), kills the
/// process if it is still running.
pub struct TaskEventStream {
    command: String,
    pid: Option<u32>,
    events: mpsc::Receiver<Item>,
    cancel: CancellationToken,
    _teardown: DropGuard,
    done: bool,
}

impl TaskEventStream {
    pub(crate) fn launch(task: &Task) -> Result<Self> {
        let command = task.command();
        let mut process = ProcessHandle::spawn(task)?;
        let pid = process.pid();

        let (events_tx, events_rx) = mpsc::channel::<Item>(EVENT_BUFFER);
        let (output_tx, output_rx) = mpsc::channel::<ProcessOutput>(OUTPUT_BUFFER);
        process.forward_output(output_tx);

        let feeder = task
            .stdin_source()
            .and_then(|source| process.feed_input(source));

        let cancel = CancellationToken::new();
        tokio::spawn(pump(process, output_rx, feeder, events_tx, cancel.clone()));

        Ok(Self {
            command,
            pid,
            events: events_rx,
            _teardown: cancel.clone().drop_guard(),
            cancel,
            done: false,
        })
    }

    /// The descriptive command line carried by the `Start` event.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// OS process id of the child.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Stop observing and kill the process if it is still running.
    ///
    /// The stream yields nothing after this. Calling it more than once, or
    /// after the stream completed, does nothing.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            debug!(cmd = %self.command, "task stream cancelled by consumer");
            self.cancel.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive the stream to its end, returning every event or the terminal
    /// error.
    pub async fn collect_events(mut self) -> std::result::Result<Vec<TaskEvent>, TaskError> {
        let mut events = Vec::new();
        while let Some(item) = self.next().await {
            events.push(item?);
        }
        Ok(events)
    }
}

impl Stream for TaskEventStream {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        if self.cancel.is_cancelled() {
            self.done = true;
            self.events.close();
            return Poll::Ready(None);
        }

        let polled = self.events.poll_recv(cx);
        if let Poll::Ready(None) = polled {
            self.done = true;
        }
        polled
    }
}

impl FusedStream for TaskEventStream {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

/// Single writer for a stream: sends `Start`, hands over to [`observe`], then
/// tears the process down.
async fn pump(
    mut process: ProcessHandle,
    mut output: mpsc::Receiver<ProcessOutput>,
    feeder: Option<Feeder>,
    events: mpsc::Sender<Item>,
    cancel: CancellationToken,
) {
    let command = process.command().to_string();

    let start = Ok(TaskEvent::Start {
        command: command.clone(),
    });
    let outcome = if forward(&events, start, &cancel).await {
        observe(&mut process, &mut output, feeder, &events, &cancel).await
    } else {
        None
    };

    // Teardown runs on every path; it is a no-op if the process already exited.
    process.terminate();

    match outcome {
        Some(item) => {
            forward(&events, item, &cancel).await;
        }
        None => debug!(cmd = %command, "consumer stopped observing; no terminal event sent"),
    }

    if let Err(e) = process.wait().await {
        debug!(cmd = %command, error = %e, "failed to reap task process");
    }
}

/// Forward output until the terminal outcome is known. Returns `None` if the
/// consumer stopped observing first.
///
/// The outcome is known once the process exited and its output pipes
/// drained. After exit, a pipe that stays quiet for [`DRAIN_GRACE`] counts as
/// drained.
async fn observe(
    process: &mut ProcessHandle,
    output: &mut mpsc::Receiver<ProcessOutput>,
    mut feeder: Option<Feeder>,
    events: &mpsc::Sender<Item>,
    cancel: &CancellationToken,
) -> Option<Item> {
    let command = process.command().to_string();
    let mut output_open = true;
    let mut termination: Option<Termination> = None;
    let mut drain_deadline: Option<Instant> = None;

    loop {
        if !output_open {
            if let Some(termination) = termination {
                return Some(classify(termination));
            }
        }

        tokio::select! {
            biased;

            _ = cancel.cancelled() => return None,

            chunk = output.recv(), if output_open => match chunk {
                Some(chunk) => {
                    if !forward(events, Ok(chunk.into()), cancel).await {
                        return None;
                    }
                    if termination.is_some() {
                        drain_deadline = Some(Instant::now() + DRAIN_GRACE);
                    }
                }
                None => output_open = false,
            },

            fed = join_feeder(&mut feeder), if feeder.is_some() => {
                feeder = None;
                if let Err(err) = fed {
                    return Some(Err(err));
                }
            }

            waited = process.wait(), if termination.is_none() => match waited {
                Ok(t) => {
                    info!(cmd = %command, termination = ?t, "task process exited");
                    termination = Some(t);
                    drain_deadline = Some(Instant::now() + DRAIN_GRACE);
                }
                Err(e) => return Some(Err(wait_failed(e))),
            },

            _ = drain_expired(drain_deadline), if output_open && drain_deadline.is_some() => {
                warn!(
                    cmd = %command,
                    "task exited but its output pipes are still open, likely held by a background process; not waiting for them"
                );
                output_open = false;
            }
        }
    }
}

/// Send one item unless the consumer cancels first. Returns `false` if the
/// consumer is gone.
async fn forward(events: &mpsc::Sender<Item>, item: Item, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = events.send(item) => sent.is_ok(),
    }
}

async fn join_feeder(feeder: &mut Option<Feeder>) -> std::result::Result<(), TaskError> {
    match feeder {
        Some(handle) => match handle.await {
            Ok(result) => result,
            Err(e) => {
                debug!(error = %e, "stdin feeder did not finish");
                Ok(())
            }
        },
        None => pending().await,
    }
}

async fn drain_expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

fn classify(termination: Termination) -> Item {
    match termination {
        Termination::Exited(0) => Ok(TaskEvent::Exit { status_code: 0 }),
        Termination::Exited(status_code) => Err(TaskError::ExitFailure { status_code }),
        Termination::Signalled(_) => Err(TaskError::UncaughtSignal),
    }
}

fn wait_failed(e: io::Error) -> TaskError {
    TaskError::Wait {
        reason: e.to_string(),
    }
}
