//! Cooperative abort signals.
//!
//! An [`AbortController`] owns the right to fire; any number of
//! [`AbortSignal`] clones observe it. Firing is sticky and idempotent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct SignalState {
    aborted: AtomicBool,
    notify: Notify,
}

/// Read side of an abort controller.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    state: Arc<SignalState>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::Acquire)
    }

    /// Resolves once the owning controller fires. Returns immediately if it
    /// already has.
    pub async fn aborted(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Fire the signal. Returns `false` if it had already fired.
    pub fn abort(&self) -> bool {
        let state = &self.signal.state;
        let first = !state.aborted.swap(true, Ordering::AcqRel);
        if first {
            state.notify.notify_waiters();
        }
        first
    }

    pub fn is_aborted(&self) -> bool {
        self.signal.is_aborted()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn abort_is_sticky_and_idempotent() {
        let controller = AbortController::new();
        let signal = controller.signal();
        assert!(!signal.is_aborted());

        assert!(controller.abort());
        assert!(!controller.abort());
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn aborted_wakes_pending_waiter() {
        let controller = AbortController::new();
        let signal = controller.signal();

        let waiter = tokio::spawn(async move { signal.aborted().await });
        tokio::task::yield_now().await;
        controller.abort();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter task should not panic");
    }

    #[tokio::test]
    async fn aborted_returns_immediately_when_already_fired() {
        let controller = AbortController::new();
        controller.abort();
        tokio::time::timeout(Duration::from_millis(50), controller.signal().aborted())
            .await
            .expect("already-fired signal resolves without waiting");
    }
}
