//! Cancelable gesture timers
//!
//! Every armed timer carries a generation. A fire is only honoured when
//! its token still matches the owner's armed token, so a fire that races
//! a cancel or a re-arm is discarded instead of acting late.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// What an armed timer bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPurpose {
    /// Hold-duration for the hold gesture
    Hold,
    /// Inter-tap window for the double-tap gesture
    DoubleTapWindow,
}

/// Identity of one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken {
    pub generation: u64,
    pub purpose: TimerPurpose,
}

/// Owned handle to an armed timer
#[derive(Debug)]
pub struct TimerHandle {
    token: TimerToken,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(token: TimerToken, abort: Option<AbortHandle>) -> Self {
        Self { token, abort }
    }

    pub fn token(&self) -> TimerToken {
        self.token
    }

    /// Cancelling a timer that already fired is a no-op
    pub fn cancel(self) {
        if let Some(abort) = self.abort {
            abort.abort();
        }
    }
}

/// Arms timers that report back with their token when they elapse
pub trait TimerScheduler: Send {
    fn schedule(&self, token: TimerToken, after: Duration) -> TimerHandle;
}

/// Scheduler backed by tokio tasks; fires are delivered on an mpsc channel
/// so they are processed on the same serialized context as key events
pub struct TokioTimerScheduler {
    fired_tx: mpsc::UnboundedSender<TimerToken>,
}

impl TokioTimerScheduler {
    pub fn new(fired_tx: mpsc::UnboundedSender<TimerToken>) -> Self {
        Self { fired_tx }
    }
}

impl TimerScheduler for TokioTimerScheduler {
    /// Must be called from within a tokio runtime
    fn schedule(&self, token: TimerToken, after: Duration) -> TimerHandle {
        let fired_tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = fired_tx.send(token);
        });
        TimerHandle::new(token, Some(task.abort_handle()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(generation: u64) -> TimerToken {
        TimerToken {
            generation,
            purpose: TimerPurpose::Hold,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = TokioTimerScheduler::new(tx);

        let _handle = scheduler.schedule(token(1), Duration::from_millis(1000));
        // let the timer task register its sleep
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(rx.recv().await, Some(token(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = TokioTimerScheduler::new(tx);

        let handle = scheduler.schedule(token(7), Duration::from_millis(500));
        handle.cancel();

        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cancel_without_task_is_noop() {
        TimerHandle::new(token(3), None).cancel();
    }
}
