// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pipe plumbing: spawn one child with all three stdio streams piped.

use std::io;
use std::process::Stdio;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::error::TaskError;
use crate::spec::TaskSpec;

/// A freshly spawned child with exclusive ownership of each pipe end.
pub(crate) struct ChildPipes {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Spawn the child described by `spec` with stdin, stdout, and stderr piped.
///
/// A spawn refusal maps to [`TaskError::LaunchFailed`]; every failure after
/// a successful spawn is classified elsewhere. `kill_on_drop` backs the
/// cancellation guarantee: no exit path leaks a running child.
pub(crate) fn spawn_piped(spec: &TaskSpec) -> Result<ChildPipes, TaskError> {
    let mut cmd = Command::new(spec.executable());
    cmd.args(spec.arguments())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = spec.working_dir() {
        cmd.current_dir(dir);
    }

    // An environment override replaces the inherited environment wholesale.
    if let Some(env) = spec.env_override() {
        cmd.env_clear();
        cmd.envs(env);
    }

    let mut child = cmd.spawn().map_err(|source| TaskError::LaunchFailed {
        spec: spec.clone(),
        source,
    })?;

    debug!(
        target: "taskpipe",
        pid = child.id(),
        executable = %spec.executable().display(),
        "spawned child process"
    );

    let stdin = take_pipe(&mut child.stdin, spec, "stdin")?;
    let stdout = take_pipe(&mut child.stdout, spec, "stdout")?;
    let stderr = take_pipe(&mut child.stderr, spec, "stderr")?;

    Ok(ChildPipes {
        child,
        stdin,
        stdout,
        stderr,
    })
}

// All three streams were requested as piped, so absence is an OS-level
// wiring failure, not a spawn refusal.
fn take_pipe<T>(slot: &mut Option<T>, spec: &TaskSpec, name: &str) -> Result<T, TaskError> {
    slot.take().ok_or_else(|| TaskError::Io {
        spec: spec.clone(),
        source: io::Error::other(format!("child {name} pipe unavailable")),
    })
}
