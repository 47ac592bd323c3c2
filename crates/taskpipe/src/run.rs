// SPDX-License-Identifier: MIT OR Apache-2.0
//! Launching a task and draining its stdio as an ordered event stream.

use std::io;
use std::process::ExitStatus;
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::ChildStdin;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::TaskError;
use crate::event::TaskEvent;
use crate::input::InputSource;
use crate::process::{self, ChildPipes};
use crate::spec::TaskSpec;

/// Read size per chunk. Not semantically significant; chunk boundaries are
/// whatever the pipe delivers.
const CHUNK_SIZE: usize = 8 * 1024;

/// Event channel depth before the drain applies caller backpressure.
const EVENT_CHANNEL_DEPTH: usize = 64;

impl TaskSpec {
    /// Launch the task, feeding `input` to its stdin.
    ///
    /// Returns immediately with a [`TaskRun`] whose `events` stream carries
    /// `Launched` followed by stdout/stderr chunks in arrival order, and
    /// whose `outcome` resolves once both output streams hit end-of-stream
    /// and the child has been reaped. A spawn refusal produces no events
    /// and an outcome of [`TaskError::LaunchFailed`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn launch(&self, input: InputSource) -> TaskRun {
        let (ev_tx, ev_rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);
        let (out_tx, out_rx) = oneshot::channel();
        let cancel = CancelToken::new();

        let spec = self.clone();
        let token = cancel.clone();
        let wait = tokio::spawn(async move {
            let result = drive(spec, input, ev_tx, token).await;
            let _ = out_tx.send(result);
        });

        TaskRun {
            events: ReceiverStream::new(ev_rx),
            outcome: out_rx,
            wait,
            cancel: cancel.clone(),
            spec: self.clone(),
            guard: CancelGuard(Some(cancel)),
        }
    }

    /// Launch, aggregate stdout in memory, and wait for completion.
    ///
    /// One-call convenience over [`TaskSpec::launch`] +
    /// [`TaskRun::wait_aggregated`].
    pub async fn output(&self, input: InputSource) -> Result<Vec<u8>, TaskError> {
        self.launch(input).wait_aggregated().await
    }
}

/// An in-flight task run.
///
/// Dropping a `TaskRun` cancels it: the child is killed (best effort) and
/// reaped, and every pipe end is closed. Use [`TaskRun::into_parts`] to opt
/// out of cancel-on-drop.
#[derive(Debug)]
pub struct TaskRun {
    /// Ordered lifecycle events. Consuming this stream drives the drain;
    /// abandoning it (by dropping the run) cancels the child.
    pub events: ReceiverStream<TaskEvent>,

    /// The terminal verdict. Resolves only after `events` is exhausted, so
    /// callers awaiting it should drain `events` first (or concurrently).
    pub outcome: oneshot::Receiver<Result<(), TaskError>>,

    /// Handle to the background drain task.
    pub wait: tokio::task::JoinHandle<()>,

    /// Cancels the run: kills and reaps the child, closes all pipes.
    pub cancel: CancelToken,

    spec: TaskSpec,
    guard: CancelGuard,
}

impl TaskRun {
    /// Drain all events, aggregating stdout chunks in memory, then wait for
    /// the outcome.
    ///
    /// Buffers the child's entire stdout; for unbounded output consume
    /// `events` directly instead.
    pub async fn wait_aggregated(self) -> Result<Vec<u8>, TaskError> {
        let Self {
            mut events,
            outcome,
            spec,
            guard: _guard,
            ..
        } = self;

        let mut aggregated = Vec::new();
        while let Some(event) = events.next().await {
            if let TaskEvent::Stdout(chunk) = event {
                aggregated.extend_from_slice(&chunk);
            }
        }

        let result = outcome.await.unwrap_or_else(|_| {
            Err(TaskError::Io {
                spec,
                source: io::Error::other("drain task ended without reporting an outcome"),
            })
        });
        result.map(|()| aggregated)
    }

    /// Consume the run and return its parts, disabling cancel-on-drop.
    ///
    /// The caller becomes responsible for either draining the run to
    /// completion or cancelling it via the returned token.
    pub fn into_parts(
        self,
    ) -> (
        ReceiverStream<TaskEvent>,
        oneshot::Receiver<Result<(), TaskError>>,
        tokio::task::JoinHandle<()>,
        CancelToken,
    ) {
        let Self {
            events,
            outcome,
            wait,
            cancel,
            mut guard,
            ..
        } = self;
        guard.0 = None;
        (events, outcome, wait, cancel)
    }
}

/// Cancels the run when dropped, unless disarmed.
#[derive(Debug)]
struct CancelGuard(Option<CancelToken>);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(token) = &self.0 {
            token.cancel();
        }
    }
}

/// One full run: spawn, announce, drain, classify.
async fn drive(
    spec: TaskSpec,
    input: InputSource,
    ev_tx: mpsc::Sender<TaskEvent>,
    cancel: CancelToken,
) -> Result<(), TaskError> {
    let pipes = process::spawn_piped(&spec)?;
    send_or_cancelled(&ev_tx, &cancel, TaskEvent::Launched(spec.clone())).await;
    drain(spec, pipes, input, ev_tx, cancel).await
}

/// Push an event, giving up if the run is cancelled or the caller is gone.
///
/// Backpressure from a slow consumer suspends here; cancellation must still
/// be able to interrupt that wait.
async fn send_or_cancelled(ev_tx: &mpsc::Sender<TaskEvent>, cancel: &CancelToken, event: TaskEvent) {
    tokio::select! {
        () = cancel.cancelled() => {}
        _ = ev_tx.send(event) => {}
    }
}

/// The drain coordinator: three concurrent activities for the lifetime of
/// one child.
///
/// The stdin writer runs as its own task so write backpressure can never
/// stall the readers; the two readers are multiplexed here so stdout and
/// stderr drain concurrently even when the child floods both past the OS
/// pipe buffer. Completion requires end-of-stream on both readers AND the
/// child's exit status.
async fn drain(
    spec: TaskSpec,
    pipes: ChildPipes,
    input: InputSource,
    ev_tx: mpsc::Sender<TaskEvent>,
    cancel: CancelToken,
) -> Result<(), TaskError> {
    let ChildPipes {
        mut child,
        stdin,
        mut stdout,
        mut stderr,
    } = pipes;

    let writer = tokio::spawn(write_input(stdin, input));

    let mut out_buf = vec![0u8; CHUNK_SIZE];
    let mut err_buf = vec![0u8; CHUNK_SIZE];
    let mut out_open = true;
    let mut err_open = true;
    let mut stderr_agg: Vec<u8> = Vec::new();
    let mut io_failure: Option<io::Error> = None;

    while out_open || err_open {
        tokio::select! {
            () = cancel.cancelled() => {
                writer.abort();
                warn!(target: "taskpipe", "run cancelled, killing child");
                // start_kill fails if the child already exited; wait still
                // reaps it either way.
                let _ = child.start_kill();
                let status = child.wait().await.map_err(|source| TaskError::Io {
                    spec: spec.clone(),
                    source,
                })?;
                return classify(&spec, status, &stderr_agg, None);
            }

            read = stdout.read(&mut out_buf), if out_open => match read {
                Ok(0) => out_open = false,
                Ok(n) => {
                    send_or_cancelled(&ev_tx, &cancel, TaskEvent::Stdout(out_buf[..n].to_vec()))
                        .await;
                }
                Err(e) => {
                    warn!(target: "taskpipe", error = %e, "stdout read failed");
                    out_open = false;
                    io_failure.get_or_insert(e);
                }
            },

            read = stderr.read(&mut err_buf), if err_open => match read {
                Ok(0) => err_open = false,
                Ok(n) => {
                    stderr_agg.extend_from_slice(&err_buf[..n]);
                    send_or_cancelled(&ev_tx, &cancel, TaskEvent::Stderr(err_buf[..n].to_vec()))
                        .await;
                }
                Err(e) => {
                    warn!(target: "taskpipe", error = %e, "stderr read failed");
                    err_open = false;
                    io_failure.get_or_insert(e);
                }
            },
        }
    }

    // Both readers saw end-of-stream; only the child's exit gates completion
    // now. The writer must not: its producer may be suspended indefinitely
    // even though the child no longer reads stdin.
    let status = tokio::select! {
        () = cancel.cancelled() => {
            warn!(target: "taskpipe", "run cancelled, killing lingering child");
            let _ = child.start_kill();
            child.wait().await.map_err(|source| TaskError::Io {
                spec: spec.clone(),
                source,
            })?
        }
        status = child.wait() => status.map_err(|source| TaskError::Io {
            spec: spec.clone(),
            source,
        })?,
    };
    debug!(target: "taskpipe", %status, "child exited");

    // Collect the writer's verdict without waiting for it: a write failure
    // it already hit still counts, an abort mid-stream does not.
    writer.abort();
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(target: "taskpipe", error = %e, "stdin write failed");
            io_failure.get_or_insert(e);
        }
        Err(join_err) if join_err.is_panic() => {
            io_failure.get_or_insert_with(|| io::Error::other(join_err));
        }
        // Aborted: the child exited without consuming the rest of the input.
        Err(_) => {}
    }

    classify(&spec, status, &stderr_agg, io_failure)
}

/// Write every input chunk in order, then close the stdin pipe.
///
/// Dropping the `ChildStdin` on return (or on error) closes the write end,
/// so the child always observes end-of-input.
async fn write_input(mut stdin: ChildStdin, input: InputSource) -> Result<(), io::Error> {
    match input {
        InputSource::None => {}
        InputSource::Bytes(bytes) => stdin.write_all(&bytes).await?,
        InputSource::Stream(mut chunks) => {
            while let Some(chunk) = chunks.next().await {
                stdin.write_all(&chunk).await?;
            }
        }
    }
    stdin.shutdown().await
}

/// The result classifier: exit status + aggregated stderr → verdict.
///
/// The child's own verdict (non-zero exit, signal) takes precedence over a
/// recorded pipe failure; a pipe failure takes precedence over success.
fn classify(
    spec: &TaskSpec,
    status: ExitStatus,
    stderr_agg: &[u8],
    io_failure: Option<io::Error>,
) -> Result<(), TaskError> {
    match status.code() {
        Some(0) => match io_failure {
            Some(source) => Err(TaskError::Io {
                spec: spec.clone(),
                source,
            }),
            None => Ok(()),
        },
        Some(exit_code) => Err(TaskError::ExitFailed {
            spec: spec.clone(),
            exit_code,
            stderr: String::from_utf8_lossy(stderr_agg).into_owned(),
        }),
        None => {
            #[cfg(unix)]
            if let Some(signal) = std::os::unix::process::ExitStatusExt::signal(&status) {
                return Err(TaskError::SignalFailed {
                    spec: spec.clone(),
                    signal,
                });
            }
            Err(TaskError::ExitFailed {
                spec: spec.clone(),
                exit_code: -1,
                stderr: String::from_utf8_lossy(stderr_agg).into_owned(),
            })
        }
    }
}
