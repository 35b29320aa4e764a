//! Cooperative cancellation for generation requests.
//!
//! A token is cloned into every component that awaits an external call.
//! Cancelling wakes all waiters, so in-flight calls raced against
//! [`CancellationToken::cancelled`] are dropped at their next poll.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{FactoryError, Result};

#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation has been requested
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives as long as any token clone, so this only errors
        // after every handle is gone, at which point nothing can cancel.
        let closed = receiver.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }

    /// Fail fast if cancellation was already requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(FactoryError::cancelled("cancellation requested"))
        } else {
            Ok(())
        }
    }

    /// Run `future` unless cancellation arrives first, in which case the
    /// future is dropped without being polled to completion.
    pub async fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(FactoryError::cancelled("cancellation requested")),
            result = future => result,
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
