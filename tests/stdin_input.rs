// tests/stdin_input.rs
mod common;
use crate::common::{init_tracing, items_of, stdout_of};

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream;
use taskstream::{InputEncoding, StdinSource, Task, TaskError, TaskEvent};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn stdin_units_reach_the_child_in_order() -> TestResult {
    init_tracing();

    let task = Task::new("/bin/cat").stdin(StdinSource::text(["hello\n", "world\n"]));
    let items = items_of(&task).await;

    assert_eq!(stdout_of(&items), b"hello\nworld\n".to_vec());
    assert_eq!(items.last(), Some(&Ok(TaskEvent::Exit { status_code: 0 })));
    Ok(())
}

#[tokio::test]
async fn raw_byte_chunks_are_written_verbatim() -> TestResult {
    init_tracing();

    let task = Task::new("/bin/cat").stdin(StdinSource::bytes([vec![0xffu8, 0x00, b'\n']]));
    let items = items_of(&task).await;

    assert_eq!(stdout_of(&items), vec![0xff, 0x00, b'\n']);
    Ok(())
}

#[tokio::test]
async fn without_a_source_stdin_is_empty() -> TestResult {
    init_tracing();

    let items = items_of(&Task::new("/bin/cat")).await;

    assert_eq!(
        items,
        vec![
            Ok(TaskEvent::Start {
                command: "/bin/cat".to_string()
            }),
            Ok(TaskEvent::Exit { status_code: 0 }),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn unencodable_unit_fails_the_stream() -> TestResult {
    init_tracing();

    let source = StdinSource::encoded(["ok\n", "héllo\n"], InputEncoding::Ascii);
    let items = items_of(&Task::new("/bin/cat").stdin(source)).await;

    assert_eq!(
        items.last(),
        Some(&Err(TaskError::InputEncodingFailure {
            text: "héllo\n".to_string()
        }))
    );
    assert!(
        !items
            .iter()
            .any(|item| matches!(item, Ok(TaskEvent::Exit { .. })))
    );
    Ok(())
}

#[tokio::test]
async fn each_launch_opens_a_fresh_source() -> TestResult {
    init_tracing();

    let opened = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&opened);
    let source = StdinSource::from_fn(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        stream::iter(vec![Ok(format!("run {n}\n").into_bytes())])
    });
    let task = Task::new("/bin/cat").stdin(source);

    assert_eq!(stdout_of(&items_of(&task).await), b"run 1\n".to_vec());
    assert_eq!(stdout_of(&items_of(&task).await), b"run 2\n".to_vec());
    assert_eq!(opened.load(Ordering::SeqCst), 2);
    Ok(())
}
