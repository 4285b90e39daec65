//! Blocking bridge over callback-style asynchronous operations.
//!
//! A [`SyncBridge`] hands a one-shot [`Completion`] to the operation being
//! triggered and parks the calling thread on a condition variable until the
//! completion has stored its outcome.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::trace;

use crate::error::BoxError;

/// Callback invoked exactly once with the outcome of an asynchronous
/// operation. May run on the calling thread or on any other thread.
pub type Completion<T> = Box<dyn FnOnce(Result<T, BoxError>) + Send + 'static>;

struct Slot<T> {
    outcome: Option<Result<T, BoxError>>,
    completed: bool,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    done: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        // The slot only holds plain data, so a panic elsewhere cannot leave
        // it half-written.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store(&self, outcome: Result<T, BoxError>) {
        let mut slot = self.lock();
        slot.outcome = Some(outcome);
        slot.completed = true;
        self.done.notify_one();
    }
}

/// Write side of the bridge, owned by the completion callback.
///
/// Dropping it without a result (the callback was discarded, or the task
/// holding it was cancelled) still wakes the waiter with an error.
struct Notifier<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Notifier<T> {
    fn complete(mut self, outcome: Result<T, BoxError>) {
        if let Some(shared) = self.shared.take() {
            shared.store(outcome);
        }
    }
}

impl<T> Drop for Notifier<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            trace!("completion dropped before it was invoked");
            shared.store(Err("completion dropped without a result".into()));
        }
    }
}

/// Single-use barrier turning one asynchronous operation into a blocking call.
pub struct SyncBridge<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> SyncBridge<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    outcome: None,
                    completed: false,
                }),
                done: Condvar::new(),
            }),
        }
    }

    /// Runs `trigger` with a completion callback and blocks until the callback
    /// fires.
    ///
    /// If `trigger` itself fails, no wait happens and that error is returned.
    /// If the callback is dropped without being called, the wait ends with an
    /// error. The bridge is consumed either way.
    pub fn wait<F>(self, trigger: F) -> Result<T, BoxError>
    where
        F: FnOnce(Completion<T>) -> Result<(), BoxError>,
    {
        let notifier = Notifier {
            shared: Some(Arc::clone(&self.shared)),
        };
        let completion: Completion<T> = Box::new(move |outcome| notifier.complete(outcome));

        trigger(completion)?;

        let mut slot = self
            .shared
            .done
            .wait_while(self.shared.lock(), |slot| !slot.completed)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        trace!("async operation completed");

        slot.outcome
            .take()
            .unwrap_or_else(|| Err("completion signalled without an outcome".into()))
    }
}

impl<T: Send + 'static> Default for SyncBridge<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience wrapper: `SyncBridge::new().wait(trigger)`.
pub fn block_on_completion<T, F>(trigger: F) -> Result<T, BoxError>
where
    T: Send + 'static,
    F: FnOnce(Completion<T>) -> Result<(), BoxError>,
{
    SyncBridge::new().wait(trigger)
}
