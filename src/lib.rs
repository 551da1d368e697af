// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod event;
pub mod exec;
pub mod logging;
pub mod task;

pub use event::{TaskError, TaskEvent};
pub use exec::{ProcessHandle, TaskEventStream, TaskStreamExt};
pub use task::{InputEncoding, InputEncodingError, StdinSource, Task};

use anyhow::{Result, bail};
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::cli::{CliArgs, OutputMode};
use crate::config::load_and_validate;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - task construction (command line or task file)
/// - launching and printing the selected projection of the stream
/// - Ctrl-C handling, which cancels the stream and so kills the child
///
/// Returns the exit code the binary should use.
pub async fn run(args: CliArgs) -> Result<i32> {
    let task = build_task(&args)?;

    if args.dry_run {
        print_dry_run(&task);
        return Ok(0);
    }

    let mut stream = task.launch()?;
    info!(cmd = %stream.command(), pid = ?stream.pid(), mode = ?args.mode, "task launched");

    tokio::select! {
        code = drive(&mut stream, args.mode) => code,
        _ = interrupted() => {
            info!("Ctrl-C received; cancelling task");
            stream.cancel();
            Ok(130)
        }
    }
}

/// Build the task from `--task-file` or the positional command, then apply
/// command-line overrides.
pub fn build_task(args: &CliArgs) -> Result<Task> {
    let mut task = match (&args.task_file, &args.program) {
        (Some(path), _) => load_and_validate(path)?.to_task(),
        (None, Some(program)) => Task::new(program).args(args.args.iter().cloned()),
        (None, None) => bail!("either PROGRAM or --task-file is required"),
    };

    if let Some(ref dir) = args.cwd {
        task = task.current_dir(dir);
    }
    if !args.env.is_empty() {
        task = task.envs(args.env.iter().cloned());
    }
    if !args.input.is_empty() {
        task = task.stdin(StdinSource::text(args.input.iter().cloned()));
    }

    Ok(task)
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Print the chosen projection of `stream` to stdout.
async fn drive(stream: &mut TaskEventStream, mode: OutputMode) -> Result<i32> {
    let mut out = tokio::io::stdout();

    let failure = match mode {
        OutputMode::Events => print_events(stream, &mut out).await?,
        OutputMode::Output => print_output(stream, &mut out).await?,
        OutputMode::ExitStatus => print_exit_status(stream, &mut out).await?,
    };
    out.flush().await?;

    match failure {
        None => Ok(0),
        Some(err) => {
            error!(error = %err, "task failed");
            Ok(err.exit_code())
        }
    }
}

async fn print_events<W>(stream: &mut TaskEventStream, out: &mut W) -> Result<Option<TaskError>>
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => out.write_all(format!("{event}\n").as_bytes()).await?,
            Err(err) => return Ok(Some(err)),
        }
    }
    Ok(None)
}

async fn print_output<W>(stream: &mut TaskEventStream, out: &mut W) -> Result<Option<TaskError>>
where
    W: AsyncWrite + Unpin,
{
    let mut outputs = stream.only_output();
    while let Some(item) = outputs.next().await {
        match item {
            Ok(bytes) => out.write_all(&bytes).await?,
            Err(err) => return Ok(Some(err)),
        }
    }
    Ok(None)
}

async fn print_exit_status<W>(
    stream: &mut TaskEventStream,
    out: &mut W,
) -> Result<Option<TaskError>>
where
    W: AsyncWrite + Unpin,
{
    let mut statuses = stream.only_exit_status();
    while let Some(item) = statuses.next().await {
        match item {
            Ok(code) => out.write_all(format!("{code}\n").as_bytes()).await?,
            Err(err) => return Ok(Some(err)),
        }
    }
    Ok(None)
}

/// Simple dry-run output: print what would be launched.
fn print_dry_run(task: &Task) {
    println!("taskstream dry-run");
    println!("  command: {task}");
    if let Some(dir) = task.working_directory() {
        println!("  cwd: {}", dir.display());
    }
    if let Some(env) = task.environment() {
        println!("  env ({} vars, replaces inherited environment):", env.len());
        for key in env.keys() {
            println!("    {key}");
        }
    }
    if task.stdin_source().is_some() {
        println!("  stdin: piped");
    }

    debug!("dry-run complete (no execution)");
}
