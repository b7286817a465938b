//! Sleep-then-retry pacing.
//!
//! Every wait in the crate goes through [`Scheduler`], so the blocking
//! thread-sleep default can be swapped for a non-blocking waiter without
//! touching the polling state machines. Cancellation delivered mid-sleep
//! wakes the run immediately and surfaces as [`Error::Interrupted`].

use crate::Error;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Cooperative cancellation signal shared with a running trigger.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the run. Any thread sleeping on this token wakes up at once.
    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.inner.signal.notify_all();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn block_for(&self, duration: Duration) -> Result<(), Error> {
        let guard = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (cancelled, _timeout) = self
            .inner
            .signal
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        if *cancelled {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Trait implemented by anything that can pause a run between polls.
pub trait Scheduler: Send + Sync {
    /// Block for `duration`, or return [`Error::Interrupted`] if the token
    /// is (or becomes) cancelled first.
    fn wait(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Error>;
}

/// Default scheduler: parks the calling thread on the token's condvar.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn wait(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Error> {
        if cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }
        if duration.is_zero() {
            return Ok(());
        }
        cancel.block_for(duration)
    }
}

/// Scheduler, cancellation token and poll interval for one run, bundled so
/// the polling components share a single `pause` call.
#[derive(Clone)]
pub struct PollPacer {
    scheduler: Arc<dyn Scheduler>,
    cancel: CancelToken,
    interval: Duration,
}

impl PollPacer {
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>, cancel: CancelToken, interval: Duration) -> Self {
        Self {
            scheduler,
            cancel,
            interval,
        }
    }

    /// Sleep one poll interval.
    pub fn pause(&self) -> Result<(), Error> {
        self.scheduler.wait(self.interval, &self.cancel)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn zero_wait_returns_immediately() {
        let token = CancelToken::new();
        ThreadScheduler.wait(Duration::ZERO, &token).unwrap();
    }

    #[test]
    fn cancelled_token_interrupts_before_sleeping() {
        let token = CancelToken::new();
        token.cancel();
        let err = ThreadScheduler
            .wait(Duration::from_secs(60), &token)
            .unwrap_err();
        assert!(matches!(err, Error::Interrupted));
    }

    #[test]
    fn cancel_wakes_a_sleeping_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = thread::spawn(move || {
            ThreadScheduler.wait(Duration::from_secs(60), &waiter)
        });
        // Give the waiter a moment to park, then cancel.
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(Error::Interrupted)));
    }

    #[test]
    fn pacer_pauses_through_the_scheduler() {
        let pacer = PollPacer::new(
            Arc::new(ThreadScheduler),
            CancelToken::new(),
            Duration::from_millis(1),
        );
        pacer.pause().unwrap();
    }
}
