//! A value that resolves exactly once and can be awaited by any number of
//! consumers, before or after resolution.
//!
//! Mirrors the resolvable `asyncio.Future` the original supervisor used for
//! `started`/`terminated`/`stopped` (see `create_future_for_signal` and
//! `ProcessPool.start_sync` in the reference implementation): many tasks can
//! await the same event, and a late subscriber still sees the resolved value.
//! Built on `tokio::sync::watch` rather than a polled `Mutex<Option<T>>`
//! so waiters are woken instead of spinning.

use tokio::sync::watch;

/// The resolving half of a one-shot multi-consumer event. Cloneable so the
/// task that will eventually resolve it (e.g. a child's exit watcher) can
/// own a copy independent of the `ProcessUnit` that created it.
pub struct Once<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T> Clone for Once<T> {
    fn clone(&self) -> Self {
        Once { tx: self.tx.clone() }
    }
}

/// The awaiting half.
#[derive(Clone)]
pub struct OnceWaiter<T> {
    rx: watch::Receiver<Option<T>>,
}

/// Create a fresh, unresolved `Once`/`OnceWaiter` pair.
pub fn once<T: Clone>() -> (Once<T>, OnceWaiter<T>) {
    let (tx, rx) = watch::channel(None);
    (Once { tx }, OnceWaiter { rx })
}

impl<T: Clone + PartialEq> Once<T> {
    /// Resolve the event. A second call is a no-op: the first value wins.
    pub fn resolve(&self, value: T) {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                false
            } else {
                *slot = Some(value);
                true
            }
        });
    }

    /// Whether the event has already resolved.
    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn waiter(&self) -> OnceWaiter<T> {
        OnceWaiter {
            rx: self.tx.subscribe(),
        }
    }
}

impl<T: Clone> OnceWaiter<T> {
    /// Await resolution, returning the value. Returns immediately if already
    /// resolved.
    pub async fn wait(&mut self) -> T {
        loop {
            if let Some(v) = self.rx.borrow().clone() {
                return v;
            }
            if self.rx.changed().await.is_err() {
                // Sender dropped without resolving — this is a bug in the
                // owning state machine, not a condition callers should see.
                panic!("Once dropped without resolving");
            }
        }
    }

    /// Non-blocking peek at the current value.
    pub fn peek(&self) -> Option<T> {
        self.rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_once_and_wakes_existing_waiters() {
        let (once_tx, mut waiter) = once::<i32>();
        let mut waiter2 = waiter.clone();

        let h = tokio::spawn(async move { waiter.wait().await });

        once_tx.resolve(42);
        once_tx.resolve(7); // ignored, first value wins

        assert_eq!(h.await.unwrap(), 42);
        assert_eq!(waiter2.wait().await, 42);
    }

    #[tokio::test]
    async fn late_waiter_sees_resolved_value() {
        let (once_tx, waiter) = once::<&'static str>();
        once_tx.resolve("done");
        let mut late = waiter;
        assert_eq!(late.wait().await, "done");
    }

    #[tokio::test]
    async fn is_resolved_reflects_state() {
        let (once_tx, _waiter) = once::<i32>();
        assert!(!once_tx.is_resolved());
        once_tx.resolve(1);
        assert!(once_tx.is_resolved());
    }
}
