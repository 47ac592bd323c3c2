// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cooperative cancellation for task runs.

use std::sync::Arc;
use tokio::sync::watch;

/// Cooperative cancellation token for one task run.
///
/// Cloneable; cancelling any clone wakes every waiter. Cancellation is
/// one-way and idempotent.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Signal cancellation to all waiters.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until cancellation is signalled; returns immediately if it
    /// already was.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so wait_for cannot observe a closed
        // channel here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_waiters_on_any_clone() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        token.clone().cancel();
        handle.await.expect("waiter should finish");
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        token.cancelled().await;
    }
}
