//! Delayed-acknowledgement timer.
//!
//! The receiver does not acknowledge every in-order segment on its own.
//! Instead each in-order arrival (re)arms a [`DelayedAck`]: after a fixed
//! delay the scheduled task sends one cumulative ACK, unless a later arrival
//! replaces it first.  Replacing aborts the previous task, so at most one
//! delayed ACK is ever pending.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A cancelable, re-armable one-shot task.
#[derive(Debug)]
pub struct DelayedAck {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl DelayedAck {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Cancel any pending task and schedule `task` to run after the delay.
    ///
    /// Must be called from within a tokio runtime.
    pub fn rearm<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    /// Abort the pending task, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// `true` while a scheduled task has not yet finished.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DelayedAck {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(count: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let count = Arc::clone(count);
        async move {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn fires_once_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DelayedAck::new(Duration::from_millis(20));
        timer.rearm(counting_task(&fired));
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());
    }

    #[tokio::test]
    async fn rearm_replaces_pending_task() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DelayedAck::new(Duration::from_millis(40));
        for _ in 0..5 {
            timer.rearm(counting_task(&fired));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_prevents_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DelayedAck::new(Duration::from_millis(20));
        timer.rearm(counting_task(&fired));
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
