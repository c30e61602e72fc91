//! Single-assignment completion slot.
//!
//! A [`Completion`] is written exactly once, usually from a dependency's
//! completion routine on some worker thread, and can be observed in two ways:
//!
//! - **wait**: block ([`Completion::wait_for`]) or await
//!   ([`Completion::wait_async`]) with a timeout, or poll with
//!   [`Completion::try_get`]
//! - **subscribe**: register a callback that fires once with the value
//!
//! Writes after the first are rejected, so a producer that reports late (after
//! a waiter already gave up) is absorbed without effect.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Wait timeout used by [`Completion::new`].
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of waiting on a [`Completion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitStatus<T> {
    /// The value was set before the timeout elapsed.
    Ready(T),
    /// The timeout elapsed first.
    Timeout,
}

impl<T> WaitStatus<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Convert into an `Option`, discarding the timeout marker.
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Timeout => None,
        }
    }
}

type Subscriber<T> = Box<dyn FnOnce(T) + Send + 'static>;

struct Slot<T> {
    value: Option<T>,
    subscribers: Vec<Subscriber<T>>,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
    notify: Notify,
}

/// Shared handle to a single-assignment result slot.
///
/// Cloning the handle shares the slot.
pub struct Completion<T> {
    shared: Arc<Shared<T>>,
    default_timeout: Duration,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            default_timeout: self.default_timeout,
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let complete = lock(&self.shared.slot).value.is_some();
        f.debug_struct("Completion")
            .field("complete", &complete)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl<T: Clone + Send + 'static> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Completion<T> {
    /// Create an empty slot waiting up to [`DEFAULT_WAIT_TIMEOUT`] in [`wait`](Self::wait).
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_WAIT_TIMEOUT)
    }

    /// Create an empty slot with a custom default wait timeout.
    pub fn with_timeout(default_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    value: None,
                    subscribers: Vec::new(),
                }),
                ready: Condvar::new(),
                notify: Notify::new(),
            }),
            default_timeout,
        }
    }

    /// Create a slot that already holds `value`.
    pub fn completed(value: T) -> Self {
        let completion = Self::new();
        completion.complete(value);
        completion
    }

    /// Timeout used by [`wait`](Self::wait).
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Set the value.
    ///
    /// Returns `false` and drops `value` if the slot was already set.
    /// Subscribers run on the calling thread after the slot is released.
    pub fn complete(&self, value: T) -> bool {
        let subscribers = {
            let mut slot = lock(&self.shared.slot);
            if slot.value.is_some() {
                return false;
            }
            slot.value = Some(value.clone());
            std::mem::take(&mut slot.subscribers)
        };

        self.shared.ready.notify_all();
        self.shared.notify.notify_waiters();

        for subscriber in subscribers {
            subscriber(value.clone());
        }
        true
    }

    /// Whether the value has been set.
    pub fn is_complete(&self) -> bool {
        lock(&self.shared.slot).value.is_some()
    }

    /// Non-blocking read of the value.
    pub fn try_get(&self) -> Option<T> {
        lock(&self.shared.slot).value.clone()
    }

    /// Block the current thread until the value is set or the default timeout elapses.
    pub fn wait(&self) -> WaitStatus<T> {
        self.wait_for(self.default_timeout)
    }

    /// Block the current thread until the value is set or `timeout` elapses.
    ///
    /// Do not call from inside an async task whose producer needs the same
    /// runtime thread; use [`wait_async`](Self::wait_async) there.
    pub fn wait_for(&self, timeout: Duration) -> WaitStatus<T> {
        let slot = lock(&self.shared.slot);
        let (slot, _) = self
            .shared
            .ready
            .wait_timeout_while(slot, timeout, |slot| slot.value.is_none())
            .unwrap_or_else(PoisonError::into_inner);

        match &slot.value {
            Some(value) => WaitStatus::Ready(value.clone()),
            None => WaitStatus::Timeout,
        }
    }

    /// Wait without blocking the runtime until the value is set or `timeout` elapses.
    ///
    /// Timeouts too large to form a deadline wait indefinitely.
    pub async fn wait_async(&self, timeout: Duration) -> WaitStatus<T> {
        let ready = async {
            loop {
                let notified = self.shared.notify.notified();
                tokio::pin!(notified);
                // Register before checking so a concurrent `complete` cannot slip between.
                notified.as_mut().enable();

                if let Some(value) = self.try_get() {
                    return value;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(timeout, ready).await {
            Ok(value) => WaitStatus::Ready(value),
            Err(_) => match self.try_get() {
                Some(value) => WaitStatus::Ready(value),
                None => WaitStatus::Timeout,
            },
        }
    }

    /// Register `callback` to run once with the value.
    ///
    /// If the value is already set the callback runs immediately on the
    /// calling thread; otherwise it runs on whichever thread completes the slot.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        let value = {
            let mut slot = lock(&self.shared.slot);
            match &slot.value {
                Some(value) => value.clone(),
                None => {
                    slot.subscribers.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(value);
    }
}

// The slot is never held across user code, so a poisoned lock still guards
// consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_complete_is_single_assignment() {
        let completion = Completion::new();
        assert!(!completion.is_complete());
        assert!(completion.try_get().is_none());

        assert!(completion.complete(1));
        assert!(!completion.complete(2));

        assert!(completion.is_complete());
        assert_eq!(completion.try_get(), Some(1));
    }

    #[test]
    fn test_wait_for_times_out() {
        let completion: Completion<u32> = Completion::new();
        let status = completion.wait_for(Duration::from_millis(20));
        assert!(status.is_timeout());
        assert_eq!(status.ready(), None);
    }

    #[test]
    fn test_wait_sees_value_from_other_thread() {
        let completion = Completion::with_timeout(Duration::from_secs(5));
        let producer = completion.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.complete("done".to_string())
        });

        assert_eq!(completion.wait(), WaitStatus::Ready("done".to_string()));
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_late_completion_after_timeout_is_absorbed() {
        let completion = Completion::new();
        assert!(completion.wait_for(Duration::from_millis(5)).is_timeout());

        assert!(completion.complete(7));
        assert!(!completion.complete(8));
        assert_eq!(completion.wait_for(Duration::ZERO), WaitStatus::Ready(7));
    }

    #[test]
    fn test_subscribers_fire_exactly_once() {
        let completion = Completion::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let fired = Arc::clone(&fired);
            completion.subscribe(move |value: u32| {
                assert_eq!(value, 42);
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        completion.complete(42);
        completion.complete(43);
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_subscribe_after_completion_runs_immediately() {
        let completion = Completion::completed("ready");
        let seen = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&seen);
        completion.subscribe(move |value| {
            *sink.lock().unwrap() = Some(value);
        });

        assert_eq!(*seen.lock().unwrap(), Some("ready"));
    }

    #[tokio::test]
    async fn test_wait_async_ready() {
        let completion = Completion::new();
        let producer = completion.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.complete(5u8);
        });

        let status = completion.wait_async(Duration::from_secs(5)).await;
        assert_eq!(status, WaitStatus::Ready(5));
    }

    #[tokio::test]
    async fn test_wait_async_timeout() {
        let completion: Completion<u8> = Completion::new();
        let status = completion.wait_async(Duration::from_millis(20)).await;
        assert!(status.is_timeout());
    }

    #[tokio::test]
    async fn test_wait_async_unbounded_timeout() {
        let done = Completion::completed(1u8);
        assert_eq!(done.wait_async(Duration::MAX).await, WaitStatus::Ready(1));

        let completion = Completion::new();
        let producer = completion.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.complete(2u8);
        });
        assert_eq!(completion.wait_async(Duration::MAX).await, WaitStatus::Ready(2));
    }

    #[test]
    fn test_wait_for_unbounded_timeout_on_completed_slot() {
        let done = Completion::completed("ready");
        assert_eq!(done.wait_for(Duration::MAX), WaitStatus::Ready("ready"));
    }

    #[test]
    fn test_debug_reports_state() {
        let completion = Completion::with_timeout(Duration::from_secs(1));
        assert!(format!("{:?}", completion).contains("complete: false"));
        completion.complete(());
        assert!(format!("{:?}", completion).contains("complete: true"));
    }
}
