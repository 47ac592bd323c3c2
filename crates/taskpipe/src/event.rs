// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lifecycle events observed while a task runs.

use crate::spec::TaskSpec;

/// One observation in a task's lifecycle, in the order the engine saw it.
///
/// `Launched` is always the first event of a run. `Stdout` and `Stderr`
/// chunks interleave in real-time arrival order; order is guaranteed within
/// each stream but not between the two. Both streams are exhausted before
/// the run's outcome is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// The child process was created for this spec.
    Launched(TaskSpec),
    /// A chunk read from the child's standard output.
    Stdout(Vec<u8>),
    /// A chunk read from the child's standard error.
    Stderr(Vec<u8>),
}

impl TaskEvent {
    /// The chunk bytes if this is a `Stdout` event.
    pub fn stdout(&self) -> Option<&[u8]> {
        match self {
            Self::Stdout(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The chunk bytes if this is a `Stderr` event.
    pub fn stderr(&self) -> Option<&[u8]> {
        match self {
            Self::Stderr(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Whether this is the launch notification.
    pub fn is_launched(&self) -> bool {
        matches!(self, Self::Launched(_))
    }
}
