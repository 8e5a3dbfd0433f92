//! Cooperative cancellation for in-progress calls.

use std::sync::mpsc::{self, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// A cloneable flag shared between a caller and the calls it started.
///
/// Canceling wakes any call sleeping between retries or waiting on the
/// network, so it returns `Error::Canceled` right away.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    canceled: Mutex<bool>,
    wake: Condvar,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        *self.lock() = true;
        self.inner.wake.notify_all();
    }

    pub fn is_canceled(&self) -> bool {
        *self.lock()
    }

    /// Sleep for `duration` or until canceled. Returns `true` if canceled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut canceled = self.lock();
        while !*canceled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            canceled = match self.inner.wake.wait_timeout(canceled, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    /// Run `work` on a helper thread and wait for it or for cancellation.
    ///
    /// On cancel the helper is detached and its result dropped whenever it
    /// finishes.
    pub(crate) fn run<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let waker = Waker(self.clone());
        thread::Builder::new()
            .name("increase-request".into())
            .spawn(move || {
                // Locals drop in reverse, so `tx` is gone before the wake.
                let _waker = waker;
                let tx = tx;
                let _ = tx.send(work());
            })
            .map_err(|e| Error::Transport(format!("failed to start request thread: {e}")))?;

        let mut canceled = self.lock();
        loop {
            if *canceled {
                return Err(Error::Canceled);
            }
            match rx.try_recv() {
                Ok(result) => return result,
                Err(TryRecvError::Disconnected) => {
                    return Err(Error::Transport("request thread exited without a result".into()))
                }
                Err(TryRecvError::Empty) => {}
            }
            canceled = match self.inner.wake.wait(canceled) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        // A poisoned flag is still a valid bool.
        self.inner
            .canceled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Wakes the waiter in `run` once the helper is done, even if it panicked.
struct Waker(CancellationToken);

impl Drop for Waker {
    fn drop(&mut self) {
        // Holding the lock orders the send before the waiter's next check.
        let _guard = self.0.lock();
        self.0.inner.wake.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn sleep_runs_to_completion_when_not_canceled() {
        let token = CancellationToken::new();
        let started = Instant::now();
        assert!(!token.sleep(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn cancel_wakes_a_sleeper() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let started = Instant::now();
        assert!(token.sleep(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(token.is_canceled());
        handle.join().unwrap();
    }

    #[test]
    fn already_canceled_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.sleep(Duration::from_secs(30)));
    }

    #[test]
    fn run_returns_the_work_result() {
        let token = CancellationToken::new();
        let value = token.run(|| Ok(7)).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn cancel_abandons_running_work() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let canceler = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let started = Instant::now();
        let result = token.run(|| {
            thread::sleep(Duration::from_secs(30));
            Ok(())
        });
        assert!(matches!(result, Err(Error::Canceled)));
        assert!(started.elapsed() < Duration::from_secs(10));
        canceler.join().unwrap();
    }

    #[test]
    fn panicking_work_is_a_transport_error() {
        let token = CancellationToken::new();
        let result = token.run(|| -> Result<()> { panic!("boom") });
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
