//! Output collection: one reader task per pipe
//!
//! Each reader appends complete lines under the process's buffer lock and
//! exits when its pipe reaches end-of-stream. Readers never touch the
//! lifecycle fields. Bytes that are not valid UTF-8 are replaced rather
//! than ending the reader, so the pipe stays drained and the child never
//! sees a closed pipe. An I/O error ends that reader only.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::task::JoinHandle;
use tracing::debug;

use super::{ProcessState, Stream};
use crate::core::ProcessId;

/// Spawn the stdout and stderr readers for a freshly started child
pub(crate) fn spawn_collectors(
    id: &ProcessId,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    state: &Arc<Mutex<ProcessState>>,
) -> Vec<JoinHandle<()>> {
    let mut reader_tasks = Vec::with_capacity(2);

    if let Some(stdout) = stdout {
        reader_tasks.push(tokio::spawn(collect(
            id.clone(),
            stdout,
            Stream::Stdout,
            Arc::clone(state),
        )));
    }

    if let Some(stderr) = stderr {
        reader_tasks.push(tokio::spawn(collect(
            id.clone(),
            stderr,
            Stream::Stderr,
            Arc::clone(state),
        )));
    }

    reader_tasks
}

async fn collect<R>(id: ProcessId, pipe: R, stream: Stream, state: Arc<Mutex<ProcessState>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(trim_line_ending(&buf));
                state.lock().append(stream, &line);
            }
            Err(e) => {
                debug!(id = %id, ?stream, error = %e, "Output reader stopped on error");
                break;
            }
        }
    }
    debug!(id = %id, ?stream, "Output reader finished");
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_appends_lines_in_order() {
        let state = Arc::new(Mutex::new(ProcessState::new(100)));
        let input: &[u8] = b"one\ntwo\nthree";
        collect("t".into(), input, Stream::Stdout, Arc::clone(&state)).await;

        assert_eq!(state.lock().output.render(None), "one\ntwo\nthree\n");
        assert!(state.lock().errors.is_empty());
    }

    #[tokio::test]
    async fn test_collect_tags_stderr() {
        let state = Arc::new(Mutex::new(ProcessState::new(100)));
        let input: &[u8] = b"boom\n";
        collect("t".into(), input, Stream::Stderr, Arc::clone(&state)).await;

        let state = state.lock();
        assert_eq!(state.output.render(None), "[ERROR] boom\n");
        assert_eq!(state.errors.render(None), "boom\n");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced_and_reading_continues() {
        let state = Arc::new(Mutex::new(ProcessState::new(100)));
        let input: &[u8] = b"good\n\xff\xfe\nstill here\r\n";
        collect("t".into(), input, Stream::Stdout, Arc::clone(&state)).await;

        assert_eq!(
            state.lock().output.render(None),
            "good\n\u{FFFD}\u{FFFD}\nstill here\n"
        );
    }

    #[tokio::test]
    async fn test_concurrent_readers_do_not_tear_lines() {
        let state = Arc::new(Mutex::new(ProcessState::new(10_000)));
        let out: Vec<u8> = (0..500)
            .flat_map(|i| format!("out {i}\n").into_bytes())
            .collect();
        let err: Vec<u8> = (0..500)
            .flat_map(|i| format!("err {i}\n").into_bytes())
            .collect();

        let a = tokio::spawn(collect(
            "t".into(),
            std::io::Cursor::new(out),
            Stream::Stdout,
            Arc::clone(&state),
        ));
        let b = tokio::spawn(collect(
            "t".into(),
            std::io::Cursor::new(err),
            Stream::Stderr,
            Arc::clone(&state),
        ));
        a.await.unwrap();
        b.await.unwrap();

        let state = state.lock();
        assert_eq!(state.output.len(), 1000);
        assert_eq!(state.errors.len(), 500);

        // Per-stream order is preserved inside the combined view
        let stdout_lines: Vec<_> = state
            .output
            .lines()
            .filter(|l| !l.is_stderr)
            .map(|l| l.content.clone())
            .collect();
        let expected: Vec<_> = (0..500).map(|i| format!("out {i}")).collect();
        assert_eq!(stdout_lines, expected);
        assert!(state
            .output
            .lines()
            .filter(|l| l.is_stderr)
            .all(|l| l.content.starts_with("[ERROR] err ")));
    }
}
