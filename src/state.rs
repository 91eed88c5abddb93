//! Flags shared between the input listener thread and the publish loop
//!
//! Both flags are plain booleans with no invariant spanning the two, so
//! atomics are enough; nothing here takes a lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Publish-enabled and keep-running flags, cheap to clone
#[derive(Debug, Clone)]
pub struct SharedState {
    publishing: Arc<AtomicBool>,
    keep_running: Arc<AtomicBool>,
}

impl SharedState {
    /// Publishing enabled, listener running
    pub fn new() -> Self {
        Self {
            publishing: Arc::new(AtomicBool::new(true)),
            keep_running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_publishing(&self) -> bool {
        self.publishing.load(Ordering::SeqCst)
    }

    /// Set the publish flag, returning the previous value
    pub fn set_publishing(&self, enabled: bool) -> bool {
        self.publishing.swap(enabled, Ordering::SeqCst)
    }

    pub fn keep_running(&self) -> bool {
        self.keep_running.load(Ordering::SeqCst)
    }

    /// Latch keep-running to false. There is no way back.
    pub fn stop(&self) {
        self.keep_running.store(false, Ordering::SeqCst);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot shutdown request that any thread can raise
///
/// The `q` key, a termination signal, and end of input all funnel into the
/// same signal. Any number of clones may await it.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the request. Returns `true` only for the first caller.
    pub fn request(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::SeqCst);
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested
    pub async fn wait(&self) {
        loop {
            // Register before checking the flag so a request in between is not missed
            let mut notified = std::pin::pin!(self.notify.notified());
            notified.as_mut().enable();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_initial_state() {
        let state = SharedState::new();
        assert!(state.is_publishing());
        assert!(state.keep_running());
    }

    #[test]
    fn test_clones_share_flags() {
        let state = SharedState::new();
        let other = state.clone();

        assert!(other.set_publishing(false));
        assert!(!state.is_publishing());
        assert!(!state.set_publishing(true));
        assert!(other.is_publishing());
    }

    #[test]
    fn test_keep_running_latches() {
        let state = SharedState::new();
        state.stop();
        assert!(!state.keep_running());
        state.stop();
        assert!(!state.keep_running());
    }

    #[test]
    fn test_shutdown_requested_once() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_requested());
        assert!(signal.request());
        assert!(!signal.request());
        assert!(!signal.clone().request());
        assert!(signal.is_requested());
    }

    #[tokio::test]
    async fn test_wait_after_request_returns() {
        let signal = ShutdownSignal::new();
        signal.request();
        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_woken_from_other_thread() {
        let signal = ShutdownSignal::new();
        let remote = signal.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.request();
        });

        tokio::time::timeout(Duration::from_secs(2), signal.wait())
            .await
            .unwrap();
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_wait_wakes_every_waiter() {
        let signal = ShutdownSignal::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let s = signal.clone();
                tokio::spawn(async move { s.wait().await })
            })
            .collect();

        // Let every waiter park on the signal
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(signal.request());

        for waiter in waiters {
            tokio::time::timeout(Duration::from_millis(500), waiter)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_late_waiters_see_request() {
        let signal = ShutdownSignal::new();
        signal.request();
        for _ in 0..2 {
            tokio::time::timeout(Duration::from_millis(500), signal.clone().wait())
                .await
                .unwrap();
        }
    }
}
