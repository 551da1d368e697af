// src/task.rs

//! The immutable launch descriptor and its lazy stdin source.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::Deserialize;
use thiserror::Error;

use crate::errors::Result;
use crate::event::TaskError;
use crate::exec::TaskEventStream;

/// A unit of stdin that could not be turned into bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot encode {text:?}")]
pub struct InputEncodingError {
    pub text: String,
}

impl From<InputEncodingError> for TaskError {
    fn from(err: InputEncodingError) -> Self {
        TaskError::InputEncodingFailure { text: err.text }
    }
}

/// One unit produced by a [`StdinSource`].
pub type InputUnit = std::result::Result<Vec<u8>, InputEncodingError>;

/// Text encoding applied to textual stdin units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputEncoding {
    #[default]
    Utf8,
    Ascii,
}

impl InputEncoding {
    pub fn encode(self, text: String) -> InputUnit {
        match self {
            InputEncoding::Utf8 => Ok(text.into_bytes()),
            InputEncoding::Ascii if text.is_ascii() => Ok(text.into_bytes()),
            InputEncoding::Ascii => Err(InputEncodingError { text }),
        }
    }
}

impl FromStr for InputEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(InputEncoding::Utf8),
            "ascii" => Ok(InputEncoding::Ascii),
            other => Err(format!(
                "invalid stdin encoding: {other} (expected \"utf8\" or \"ascii\")"
            )),
        }
    }
}

/// Factory for the lazy sequence of stdin units fed to a launched task.
///
/// Every launch opens a fresh stream, so a `Task` carrying a source can be
/// launched more than once. Units are pulled only as fast as the child's
/// stdin pipe accepts them.
#[derive(Clone)]
pub struct StdinSource {
    factory: Arc<dyn Fn() -> BoxStream<'static, InputUnit> + Send + Sync>,
}

impl StdinSource {
    /// Build a source from an arbitrary stream factory.
    pub fn from_fn<F, S>(f: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = InputUnit> + Send + 'static,
    {
        Self {
            factory: Arc::new(move || f().boxed()),
        }
    }

    /// Raw byte chunks, written as-is.
    pub fn bytes<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        let chunks: Vec<Vec<u8>> = chunks.into_iter().map(Into::into).collect();
        Self::from_fn(move || stream::iter(chunks.clone().into_iter().map(Ok)))
    }

    /// Text chunks, encoded as UTF-8.
    pub fn text<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::encoded(chunks, InputEncoding::Utf8)
    }

    /// Text chunks, each encoded with `encoding` when it is pulled.
    pub fn encoded<I, S>(chunks: I, encoding: InputEncoding) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks: Vec<String> = chunks.into_iter().map(Into::into).collect();
        Self::from_fn(move || {
            stream::iter(
                chunks
                    .clone()
                    .into_iter()
                    .map(move |text| encoding.encode(text)),
            )
        })
    }

    pub(crate) fn open(&self) -> BoxStream<'static, InputUnit> {
        (self.factory)()
    }

    /// Whether both handles point at the same source.
    pub fn ptr_eq(&self, other: &StdinSource) -> bool {
        Arc::ptr_eq(&self.factory, &other.factory)
    }
}

impl fmt::Debug for StdinSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StdinSource(..)")
    }
}

/// Immutable description of a process to launch.
///
/// ```no_run
/// # async fn demo() -> taskstream::errors::Result<()> {
/// use futures::StreamExt;
/// use taskstream::Task;
///
/// let mut events = Task::new("/bin/echo").args(["hello", "world"]).launch()?;
/// while let Some(event) = events.next().await {
///     println!("{:?}", event);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Task {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: Option<BTreeMap<String, String>>,
    stdin: Option<StdinSource>,
}

impl Task {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: None,
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir` instead of the caller's working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add one variable to the replacement environment.
    ///
    /// As soon as any variable is set the child no longer inherits the
    /// caller's environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replace the environment wholesale.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn stdin(mut self, source: StdinSource) -> Self {
        self.stdin = Some(source);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn environment(&self) -> Option<&BTreeMap<String, String>> {
        self.env.as_ref()
    }

    pub fn stdin_source(&self) -> Option<&StdinSource> {
        self.stdin.as_ref()
    }

    /// Program followed by its arguments, space-joined, unquoted.
    ///
    /// Descriptive only; never re-executed.
    pub fn command(&self) -> String {
        self.to_string()
    }

    /// Spawn the process and return its event stream.
    ///
    /// Fails synchronously if the process cannot be spawned. Must be called
    /// from within a Tokio runtime.
    pub fn launch(&self) -> Result<TaskEventStream> {
        TaskEventStream::launch(self)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        let stdin_eq = match (&self.stdin, &other.stdin) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        };

        self.program == other.program
            && self.args == other.args
            && self.cwd == other.cwd
            && self.env == other.env
            && stdin_eq
    }
}

impl Eq for Task {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_program_and_args_space_joined() {
        let task = Task::new("/bin/echo").args(["hello", "big world"]);
        assert_eq!(task.command(), "/bin/echo hello big world");
        assert_eq!(Task::new("/bin/true").command(), "/bin/true");
    }

    #[test]
    fn absent_env_only_equals_absent_env() {
        let bare = Task::new("/bin/true");
        let empty_env = Task::new("/bin/true").envs(Vec::<(String, String)>::new());

        assert_eq!(bare, Task::new("/bin/true"));
        assert_ne!(bare, empty_env);
        assert_eq!(
            empty_env,
            Task::new("/bin/true").envs(Vec::<(String, String)>::new())
        );
    }

    #[test]
    fn stdin_sources_compare_by_identity() {
        let source = StdinSource::text(["a"]);
        let a = Task::new("/bin/cat").stdin(source.clone());
        let b = Task::new("/bin/cat").stdin(source);
        let c = Task::new("/bin/cat").stdin(StdinSource::text(["a"]));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Task::new("/bin/cat"));
    }

    #[test]
    fn ascii_encoding_rejects_non_ascii_text() {
        assert_eq!(InputEncoding::Ascii.encode("abc".into()), Ok(b"abc".to_vec()));
        assert_eq!(
            InputEncoding::Ascii.encode("héllo".into()),
            Err(InputEncodingError {
                text: "héllo".to_string()
            })
        );
        assert_eq!(
            InputEncoding::Utf8.encode("héllo".into()),
            Ok("héllo".as_bytes().to_vec())
        );
    }

    #[test]
    fn encoding_parses_from_str() {
        assert_eq!("UTF-8".parse::<InputEncoding>(), Ok(InputEncoding::Utf8));
        assert_eq!(" ascii ".parse::<InputEncoding>(), Ok(InputEncoding::Ascii));
        assert!("latin1".parse::<InputEncoding>().is_err());
    }
}
