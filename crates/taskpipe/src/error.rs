// SPDX-License-Identifier: MIT OR Apache-2.0
//! Classified failures of one task run.

use std::io;
use thiserror::Error;

use crate::spec::TaskSpec;

/// Why a task run failed.
///
/// Every variant carries the spec that was launched plus enough captured
/// context (exit code, signal, aggregated stderr, underlying I/O error) to
/// render a complete diagnostic without re-running the command.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The OS refused to create the process (bad path, permissions,
    /// resource exhaustion). No output events precede this.
    #[error("A shell task ({spec}) failed to launch:\n{source}")]
    LaunchFailed {
        /// The spec that failed to launch.
        spec: TaskSpec,
        /// The spawn error reported by the OS.
        #[source]
        source: io::Error,
    },

    /// The process ran and exited with a non-zero status.
    #[error("A shell task ({spec}) failed with exit code {exit_code}:\n{stderr}")]
    ExitFailed {
        /// The spec that was run.
        spec: TaskSpec,
        /// The child's exit code.
        exit_code: i32,
        /// Full stderr content at exit, decoded leniently as UTF-8.
        stderr: String,
    },

    /// The process was terminated by a signal rather than exiting.
    #[error("A shell task ({spec}) was terminated by signal {signal}")]
    SignalFailed {
        /// The spec that was run.
        spec: TaskSpec,
        /// The terminating signal number.
        signal: i32,
    },

    /// A pipe read or write failed independent of the child's own exit
    /// status (e.g. broken pipe while writing stdin).
    #[error("A shell task ({spec}) encountered an I/O error:\n{source}")]
    Io {
        /// The spec that was run.
        spec: TaskSpec,
        /// The failed pipe operation's error.
        #[source]
        source: io::Error,
    },
}

impl TaskError {
    /// The spec of the run that failed.
    pub fn spec(&self) -> &TaskSpec {
        match self {
            Self::LaunchFailed { spec, .. }
            | Self::ExitFailed { spec, .. }
            | Self::SignalFailed { spec, .. }
            | Self::Io { spec, .. } => spec,
        }
    }
}
