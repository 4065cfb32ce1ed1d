//! Single-fire readiness gate.
//!
//! Fires at most once. Any number of tasks can wait on it; waiters arriving
//! after it fired return immediately.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub(crate) struct ReadyGate {
    fired: AtomicBool,
    notify: Notify,
}

impl ReadyGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Open the gate. Returns `true` only for the call that actually fired it.
    pub(crate) fn fire(&self) -> bool {
        let first = !self.fired.swap(true, Ordering::SeqCst);
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Wait until the gate has fired.
    pub(crate) async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking the flag so a concurrent
            // `fire()` cannot slip between the check and the await.
            notified.as_mut().enable();
            if self.is_fired() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn fire_only_succeeds_once() {
        let gate = ReadyGate::new();
        assert!(!gate.is_fired());
        assert!(gate.fire());
        assert!(!gate.fire());
        assert!(gate.is_fired());
    }

    #[tokio::test]
    async fn late_waiter_returns_immediately() {
        let gate = ReadyGate::new();
        gate.fire();
        tokio::time::timeout(Duration::from_millis(100), gate.wait())
            .await
            .expect("wait after fire should not block");
    }

    #[tokio::test]
    async fn many_waiters_are_released_by_one_fire() {
        let gate = Arc::new(ReadyGate::new());
        let mut waiters = Vec::new();
        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            waiters.push(tokio::spawn(async move { gate.wait().await }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.fire();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter should be released")
                .expect("waiter task should not panic");
        }
    }

    #[tokio::test]
    async fn waiter_blocks_until_fired() {
        let gate = ReadyGate::new();
        let result = tokio::time::timeout(Duration::from_millis(30), gate.wait()).await;
        assert!(result.is_err(), "wait should block while the gate is closed");
    }
}
