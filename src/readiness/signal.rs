//! Explicit readiness signalling.

use std::sync::Arc;
use tokio::sync::watch;

/// One-way latch fired by the component that creates the awaited view.
///
/// Handing a `ReadySignal` to the view that renders the form lets the
/// machine wait on the render itself instead of polling for it.
#[derive(Clone, Debug)]
pub struct ReadySignal {
    state: Arc<watch::Sender<bool>>,
}

impl ReadySignal {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn notify(&self) {
        self.state.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.state.borrow()
    }

    /// Re-arm the latch, e.g. when the awaited view unmounts.
    pub fn reset(&self) {
        self.state.send_replace(false);
    }

    /// Resolve once [`notify`](Self::notify) has been called.
    pub async fn wait(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = receiver.wait_for(|ready| *ready).await;
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_notify() {
        let signal = ReadySignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::task::yield_now().await;
        assert!(!signal.is_ready());
        signal.notify();

        waiter.await.unwrap();
        assert!(signal.is_ready());
    }

    #[tokio::test]
    async fn already_fired_signal_resolves_immediately() {
        let signal = ReadySignal::new();
        signal.notify();
        signal.wait().await;

        signal.reset();
        assert!(!signal.is_ready());
    }
}
