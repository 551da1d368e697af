// src/exec/process.rs

//! One live OS process plus the pipes wired to it.

use std::io;
use std::process::{ExitStatus, Stdio};

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::errors::{Result, TaskStreamError};
use crate::event::{TaskError, TaskEvent};
use crate::task::{StdinSource, Task};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// A chunk of bytes read from one of the child's output pipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutput {
    StdOut(Vec<u8>),
    StdErr(Vec<u8>),
}

impl From<ProcessOutput> for TaskEvent {
    fn from(output: ProcessOutput) -> Self {
        match output {
            ProcessOutput::StdOut(data) => TaskEvent::StdOut(data),
            ProcessOutput::StdErr(data) => TaskEvent::StdErr(data),
        }
    }
}

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Normal exit with a status code.
    Exited(i32),
    /// Killed by a signal. The number is only known on Unix.
    Signalled(Option<i32>),
}

impl From<ExitStatus> for Termination {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => Termination::Exited(code),
            None => Termination::Signalled(signal_of(&status)),
        }
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Owns one spawned process, its pipes, and the background tasks that read
/// from or write to those pipes.
///
/// - [`forward_output`](Self::forward_output) drains stdout/stderr into a
///   channel, one message per read.
/// - [`feed_input`](Self::feed_input) writes a [`StdinSource`] into stdin.
/// - [`wait`](Self::wait) reports the termination exactly once.
/// - [`terminate`](Self::terminate) kills the process if it is still running.
///
/// Dropping the handle aborts the pipe tasks and kills a still-running child.
pub struct ProcessHandle {
    command: String,
    pid: Option<u32>,
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    stdin: Option<ChildStdin>,
    termination: Option<Termination>,
    workers: Vec<AbortHandle>,
}

impl ProcessHandle {
    /// Spawn the process described by `task`.
    ///
    /// stdout and stderr are always piped. stdin is piped only when the task
    /// carries a [`StdinSource`]; otherwise the child reads from the null
    /// device.
    pub fn spawn(task: &Task) -> Result<Self> {
        let command = task.command();

        let mut cmd = Command::new(task.program());
        cmd.args(task.arguments());

        if let Some(dir) = task.working_directory() {
            cmd.current_dir(dir);
        }
        if let Some(env) = task.environment() {
            cmd.env_clear().envs(env);
        }

        let stdin = if task.stdin_source().is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        cmd.stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| TaskStreamError::Launch {
            command: command.clone(),
            source,
        })?;

        let pid = child.id();
        info!(cmd = %command, pid = ?pid, "started task process");

        Ok(Self {
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            stdin: child.stdin.take(),
            command,
            pid,
            child,
            termination: None,
            workers: Vec::new(),
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// OS process id, as observed right after spawning.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Start draining stdout and stderr into `sink`.
    ///
    /// Each successful read becomes one message. The channel closes once both
    /// pipes reached EOF, which is the signal that every buffered byte has
    /// been delivered. Calling this twice is a no-op.
    pub fn forward_output(&mut self, sink: mpsc::Sender<ProcessOutput>) {
        if let Some(stdout) = self.stdout.take() {
            let reader = spawn_reader(stdout, sink.clone(), ProcessOutput::StdOut, "stdout");
            self.workers.push(reader.abort_handle());
        }
        if let Some(stderr) = self.stderr.take() {
            let reader = spawn_reader(stderr, sink, ProcessOutput::StdErr, "stderr");
            self.workers.push(reader.abort_handle());
        }
    }

    /// Start writing `source` into the child's stdin.
    ///
    /// Returns `None` if stdin was not piped or was already taken. The
    /// returned task resolves to an error if a unit could not be encoded;
    /// stdin is closed when the task ends either way. The task is aborted
    /// together with this handle.
    pub fn feed_input(
        &mut self,
        source: &StdinSource,
    ) -> Option<JoinHandle<std::result::Result<(), TaskError>>> {
        let mut stdin = self.stdin.take()?;
        let mut units = source.open();
        let command = self.command.clone();

        let feeder = tokio::spawn(async move {
            let mut written = 0usize;

            while let Some(unit) = units.next().await {
                let bytes = match unit {
                    Ok(bytes) => bytes,
                    Err(e) => return Err(TaskError::from(e)),
                };

                if let Err(e) = stdin.write_all(&bytes).await {
                    if e.kind() == io::ErrorKind::BrokenPipe {
                        debug!(cmd = %command, written, "child closed stdin; dropping remaining input");
                    } else {
                        warn!(cmd = %command, error = %e, "failed to write to child stdin");
                    }
                    return Ok(());
                }
                written += bytes.len();
            }

            debug!(cmd = %command, written, "stdin source exhausted; closing pipe");
            Ok(())
        });

        self.workers.push(feeder.abort_handle());
        Some(feeder)
    }

    /// Wait for the process to terminate.
    ///
    /// The first successful call records the termination; later calls
    /// return it immediately.
    pub async fn wait(&mut self) -> io::Result<Termination> {
        if let Some(termination) = self.termination {
            return Ok(termination);
        }

        let status = self.child.wait().await?;
        let termination = Termination::from(status);
        self.termination = Some(termination);
        Ok(termination)
    }

    /// Whether the process is still running. A status that cannot be
    /// queried counts as running, so [`terminate`](Self::terminate) still
    /// tries to kill it.
    pub fn is_running(&mut self) -> bool {
        if self.termination.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.termination = Some(status.into());
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(cmd = %self.command, error = %e, "cannot query task process status");
                true
            }
        }
    }

    /// Request that the process be killed.
    ///
    /// Does nothing once the process has exited, so calling it repeatedly is
    /// harmless. Does not wait for the process to die.
    pub fn terminate(&mut self) {
        if !self.is_running() {
            return;
        }

        match self.child.start_kill() {
            Ok(()) => info!(cmd = %self.command, pid = ?self.pid, "terminating task process"),
            Err(e) => warn!(
                cmd = %self.command,
                pid = ?self.pid,
                error = %e,
                "failed to kill task process"
            ),
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        for worker in self.workers.drain(..) {
            worker.abort();
        }
    }
}

fn spawn_reader<R>(
    pipe: R,
    sink: mpsc::Sender<ProcessOutput>,
    wrap: fn(Vec<u8>) -> ProcessOutput,
    name: &'static str,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match read_pipe(pipe, &sink, wrap).await {
            Ok(()) => debug!(pipe = name, "output pipe closed"),
            Err(e) => warn!(pipe = name, error = %e, "reading output pipe failed; remaining output is lost"),
        }
    })
}

/// Copy `pipe` into `sink` one read at a time until EOF, a read error, or the
/// receiver going away.
async fn read_pipe<R>(
    mut pipe: R,
    sink: &mpsc::Sender<ProcessOutput>,
    wrap: fn(Vec<u8>) -> ProcessOutput,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => {
                if sink.send(wrap(buf[..n].to_vec())).await.is_err() {
                    debug!("output receiver dropped; stopping reader");
                    return Ok(());
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn termination_distinguishes_exit_from_signal() {
        // Raw wait statuses: exit code lives in the high byte, signal in the low bits.
        assert_eq!(
            Termination::from(ExitStatus::from_raw(0)),
            Termination::Exited(0)
        );
        assert_eq!(
            Termination::from(ExitStatus::from_raw(100 << 8)),
            Termination::Exited(100)
        );
        assert_eq!(
            Termination::from(ExitStatus::from_raw(15)),
            Termination::Signalled(Some(15))
        );
    }

    #[tokio::test]
    async fn terminate_is_idempotent_after_exit() {
        let mut handle = ProcessHandle::spawn(&Task::new("/bin/sh").args(["-c", "exit 3"]))
            .expect("spawn /bin/sh");

        assert_eq!(handle.wait().await.unwrap(), Termination::Exited(3));
        handle.terminate();
        handle.terminate();
        assert!(!handle.is_running());
        assert_eq!(handle.wait().await.unwrap(), Termination::Exited(3));
    }

    #[tokio::test]
    async fn terminate_kills_a_running_process() {
        let mut handle = ProcessHandle::spawn(&Task::new("/bin/sh").args(["-c", "sleep 30"]))
            .expect("spawn /bin/sh");

        assert!(handle.is_running());
        handle.terminate();
        handle.terminate();

        let termination = tokio::time::timeout(std::time::Duration::from_secs(5), handle.wait())
            .await
            .expect("process did not die")
            .unwrap();
        assert_eq!(termination, Termination::Signalled(Some(9)));
    }

    /// Yields one chunk, then fails.
    struct FailingPipe {
        sent: bool,
    }

    impl AsyncRead for FailingPipe {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            if self.sent {
                return std::task::Poll::Ready(Err(io::Error::other("pipe broke")));
            }
            self.sent = true;
            buf.put_slice(b"partial");
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn read_errors_are_reported_after_delivered_chunks() {
        let (tx, mut rx) = mpsc::channel(8);

        let result = read_pipe(FailingPipe { sent: false }, &tx, ProcessOutput::StdOut).await;

        assert_eq!(result.unwrap_err().to_string(), "pipe broke");
        assert_eq!(
            rx.recv().await,
            Some(ProcessOutput::StdOut(b"partial".to_vec()))
        );
    }

    #[tokio::test]
    async fn terminate_without_prior_status_check_kills_the_child() {
        let mut handle = ProcessHandle::spawn(&Task::new("/bin/sh").args(["-c", "sleep 30"]))
            .expect("spawn /bin/sh");

        handle.terminate();

        let termination = tokio::time::timeout(std::time::Duration::from_secs(5), handle.wait())
            .await
            .expect("process did not die")
            .unwrap();
        assert!(matches!(termination, Termination::Signalled(_)));
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn output_channel_closes_after_both_pipes_drain() {
        let task = Task::new("/bin/sh").args(["-c", "echo out; echo err 1>&2"]);
        let mut handle = ProcessHandle::spawn(&task).expect("spawn /bin/sh");
        let (tx, mut rx) = mpsc::channel(8);
        handle.forward_output(tx);

        let mut seen = Vec::new();
        while let Some(chunk) = rx.recv().await {
            seen.push(chunk);
        }

        assert!(seen.contains(&ProcessOutput::StdOut(b"out\n".to_vec())));
        assert!(seen.contains(&ProcessOutput::StdErr(b"err\n".to_vec())));
        assert_eq!(handle.wait().await.unwrap(), Termination::Exited(0));
    }
}
