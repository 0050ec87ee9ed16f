//! Scheduled-retry primitive for bounded polling.
//!
//! One construct replaces the ad hoc timer chains around the codebase:
//! run an operation every `interval` until it produces a value or the
//! attempt budget runs out, with a handle that can cancel the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

/// Fixed-interval, bounded-attempt schedule.
#[derive(Debug, Clone, Copy)]
pub struct RetrySchedule {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl RetrySchedule {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// Terminal state of a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The operation produced a value before the budget ran out.
    Completed(T),
    /// Every attempt ran and none produced a value. Not an error.
    Exhausted,
    /// The loop was cancelled from the handle.
    Cancelled,
}

/// Handle to a running polling loop.
pub struct PollHandle<T> {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
    join: JoinHandle<PollOutcome<T>>,
}

impl<T> PollHandle<T> {
    /// Request cancellation. Interrupts the sleep between attempts; an
    /// attempt already in flight runs to completion and is discarded.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Wait for the loop to reach a terminal state.
    pub async fn outcome(self) -> PollOutcome<T> {
        self.join.await.unwrap_or(PollOutcome::Cancelled)
    }
}

/// Spawn a polling loop: run `op` up to `max_attempts` times, sleeping
/// `interval` between attempts. `op` receives the 1-based attempt number
/// and ends the loop by returning `Some`.
pub fn spawn_poll<T, F, Fut>(schedule: RetrySchedule, mut op: F) -> PollHandle<T>
where
    T: Send + 'static,
    F: FnMut(u32) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Option<T>> + Send + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let notify = Arc::new(Notify::new());
    let flag = cancelled.clone();
    let wakeup = notify.clone();

    let join = tokio::spawn(async move {
        for attempt in 1..=schedule.max_attempts {
            if flag.load(Ordering::SeqCst) {
                return PollOutcome::Cancelled;
            }
            if let Some(value) = op(attempt).await {
                debug!(attempt, "poll completed");
                return PollOutcome::Completed(value);
            }
            if attempt < schedule.max_attempts {
                tokio::select! {
                    _ = tokio::time::sleep(schedule.interval) => {}
                    _ = wakeup.notified() => return PollOutcome::Cancelled,
                }
            }
        }
        if flag.load(Ordering::SeqCst) {
            PollOutcome::Cancelled
        } else {
            PollOutcome::Exhausted
        }
    });

    PollHandle {
        cancelled,
        notify,
        join,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn completes_when_op_yields() {
        let schedule = RetrySchedule::new(Duration::from_millis(1), 10);
        let handle = spawn_poll(schedule, |attempt| async move {
            if attempt == 3 {
                Some(attempt)
            } else {
                None
            }
        });
        assert_eq!(handle.outcome().await, PollOutcome::Completed(3));
    }

    #[tokio::test]
    async fn exhausts_after_exactly_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let schedule = RetrySchedule::new(Duration::from_millis(1), 5);
        let handle = spawn_poll(schedule, move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                None::<()>
            }
        });
        assert_eq!(handle.outcome().await, PollOutcome::Exhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn cancel_interrupts_the_sleep() {
        let schedule = RetrySchedule::new(Duration::from_secs(60), 100);
        let handle = spawn_poll(schedule, |_| async { None::<()> });
        // Give the first attempt a moment to run and enter the sleep.
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.outcome())
            .await
            .expect("cancel should resolve promptly");
        assert_eq!(outcome, PollOutcome::Cancelled);
    }

    #[tokio::test]
    async fn zero_attempt_schedule_exhausts_immediately() {
        let schedule = RetrySchedule::new(Duration::from_millis(1), 0);
        let handle = spawn_poll(schedule, |_| async { Some(()) });
        assert_eq!(handle.outcome().await, PollOutcome::Exhausted);
    }
}
