// SPDX-License-Identifier: MIT OR Apache-2.0
//! Drain coordinator tests: deadlock freedom, stdin round-trips, and
//! per-stream chunk ordering.

use std::time::Duration;

use proptest::prelude::*;
use taskpipe::{InputSource, TaskEvent, TaskSpec};
use tokio_stream::StreamExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn find_bin(candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|p| std::path::Path::new(p).exists())
        .map(|p| (*p).to_string())
}

macro_rules! require_python {
    () => {
        match find_bin(&["/usr/bin/python3", "/usr/local/bin/python3", "/usr/bin/python"]) {
            Some(p) => p,
            None => {
                eprintln!("SKIP: python not found");
                return;
            }
        }
    };
}

fn cat_bin() -> Option<String> {
    find_bin(&["/bin/cat", "/usr/bin/cat"])
}

/// Drain a run fully, returning (stdout aggregate, stderr aggregate, outcome).
async fn drain_both(
    spec: &TaskSpec,
    input: InputSource,
) -> (Vec<u8>, Vec<u8>, Result<(), taskpipe::TaskError>) {
    let (events, outcome, wait, _cancel) = spec.launch(input).into_parts();
    let events: Vec<TaskEvent> = events.collect().await;

    let stdout: Vec<u8> = events
        .iter()
        .filter_map(TaskEvent::stdout)
        .flatten()
        .copied()
        .collect();
    let stderr: Vec<u8> = events
        .iter()
        .filter_map(TaskEvent::stderr)
        .flatten()
        .copied()
        .collect();

    let result = outcome.await.expect("outcome channel open");
    wait.await.expect("drain task should finish");
    (stdout, stderr, result)
}

// ---------------------------------------------------------------------------
// Deadlock freedom
// ---------------------------------------------------------------------------

// 256 KiB to each stream, interleaved in 4 KiB writes, comfortably past the
// usual 64 KiB pipe buffer. Sequential draining would wedge here.
const FLOOD: &str = "\
import sys
chunk = b'x' * 4096
for _ in range(64):
    sys.stdout.buffer.write(chunk)
    sys.stderr.buffer.write(chunk)
sys.stdout.buffer.flush()
sys.stderr.buffer.flush()
";

#[tokio::test]
async fn floods_on_both_streams_drain_without_deadlock() {
    let py = require_python!();
    let spec = TaskSpec::new(&py).arg("-c").arg(FLOOD);

    let (stdout, stderr, result) =
        tokio::time::timeout(Duration::from_secs(60), drain_both(&spec, InputSource::None))
            .await
            .expect("concurrent drain must not deadlock");

    result.expect("flood script should succeed");
    assert_eq!(stdout.len(), 64 * 4096);
    assert_eq!(stderr.len(), 64 * 4096);
}

// ---------------------------------------------------------------------------
// Stdin round-trips
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cat_round_trips_non_utf8_bytes() {
    let Some(cat) = cat_bin() else {
        eprintln!("SKIP: cat not found");
        return;
    };
    let payload: Vec<u8> = (0u8..=255).cycle().take(8 * 1024).collect();

    let out = TaskSpec::new(&cat)
        .output(InputSource::bytes(payload.clone()))
        .await
        .expect("cat should succeed");
    assert_eq!(out, payload);
}

#[tokio::test]
async fn stdin_is_closed_when_no_input_is_given() {
    let Some(cat) = cat_bin() else {
        eprintln!("SKIP: cat not found");
        return;
    };
    // cat would block forever if the engine left the stdin pipe open.
    let out = tokio::time::timeout(
        Duration::from_secs(10),
        TaskSpec::new(&cat).output(InputSource::None),
    )
    .await
    .expect("stdin must be closed for cat to finish")
    .expect("cat should succeed");
    assert!(out.is_empty());
}

#[tokio::test]
async fn stalled_input_producer_does_not_block_completion() {
    let Some(bin) = find_bin(&["/usr/bin/true", "/bin/true"]) else {
        eprintln!("SKIP: true not found");
        return;
    };
    // A producer that never yields a chunk; `true` exits without reading
    // stdin, and its exit alone must gate completion.
    let input = InputSource::stream(futures::stream::pending::<Vec<u8>>());

    let out = tokio::time::timeout(Duration::from_secs(10), TaskSpec::new(&bin).output(input))
        .await
        .expect("completion must not wait on the stdin producer")
        .expect("true should succeed");
    assert!(out.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn cat_round_trips_arbitrary_chunk_sequences(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 0..8)
    ) {
        let Some(cat) = cat_bin() else { return Ok(()) };
        let expected: Vec<u8> = chunks.iter().flatten().copied().collect();

        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let out = rt
            .block_on(TaskSpec::new(&cat).output(InputSource::chunks(chunks)))
            .expect("cat should succeed");
        prop_assert_eq!(out, expected);
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

const NUMBERED: &str = "\
import sys
for i in range(200):
    sys.stdout.write('out %d\\n' % i)
    sys.stderr.write('err %d\\n' % i)
";

#[tokio::test]
async fn chunk_order_is_preserved_within_each_stream() {
    let py = require_python!();
    let spec = TaskSpec::new(&py).arg("-c").arg(NUMBERED);

    let (stdout, stderr, result) = drain_both(&spec, InputSource::None).await;
    result.expect("script should succeed");

    let expected_out: String = (0..200).map(|i| format!("out {i}\n")).collect();
    let expected_err: String = (0..200).map(|i| format!("err {i}\n")).collect();
    assert_eq!(stdout, expected_out.as_bytes());
    assert_eq!(stderr, expected_err.as_bytes());
}

#[tokio::test]
async fn lazy_input_streams_are_written_chunk_by_chunk() {
    let Some(cat) = cat_bin() else {
        eprintln!("SKIP: cat not found");
        return;
    };

    // A producer that suspends between chunks.
    let input = InputSource::stream(async_stream_chunks());
    let out = TaskSpec::new(&cat)
        .output(input)
        .await
        .expect("cat should succeed");
    assert_eq!(out, b"first second third ");
}

fn async_stream_chunks() -> impl futures::Stream<Item = Vec<u8>> + Send {
    futures::stream::unfold(0u8, |i| async move {
        if i >= 3 {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        let chunk = match i {
            0 => b"first ".to_vec(),
            1 => b"second ".to_vec(),
            _ => b"third ".to_vec(),
        };
        Some((chunk, i + 1))
    })
}
