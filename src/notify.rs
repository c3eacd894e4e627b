//! Same-thread change dispatch shared by stores and aggregators.
//!
//! Deltas are appended to a FIFO queue and drained by whichever call to
//! [`ChangeNotifier::publish`] arrives first. A listener that publishes while
//! a delivery is in progress only enqueues; its delta is delivered after the
//! current one has reached every listener, so deliveries never interleave.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Token returned by `subscribe_to_changes`, used to unsubscribe.
pub type SubscriptionId = u64;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct ChangeNotifier<T> {
    listeners: Mutex<Vec<(SubscriptionId, Listener<T>)>>,
    pending: Mutex<VecDeque<T>>,
    dispatching: AtomicBool,
    next_id: AtomicU64,
}

impl<T> Default for ChangeNotifier<T> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            dispatching: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T> ChangeNotifier<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners_guard().push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` when the subscription was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners_guard();
        let before = listeners.len();
        listeners.retain(|(candidate, _)| *candidate != id);
        listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners_guard().len()
    }

    /// Queues a delta and, unless a delivery is already running, drains the queue.
    pub fn publish(&self, change: T) {
        self.pending_guard().push_back(change);
        loop {
            if self.dispatching.swap(true, Ordering::AcqRel) {
                return;
            }
            let reset = DispatchReset(&self.dispatching);
            while let Some(change) = self.next_pending() {
                let listeners: Vec<Listener<T>> = self
                    .listeners_guard()
                    .iter()
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect();
                for listener in listeners {
                    listener(&change);
                }
            }
            drop(reset);
            if self.pending_guard().is_empty() {
                return;
            }
        }
    }

    fn next_pending(&self) -> Option<T> {
        self.pending_guard().pop_front()
    }

    fn listeners_guard(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener<T>)>> {
        self.listeners.lock().expect("listener registry poisoned")
    }

    fn pending_guard(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.pending.lock().expect("pending change queue poisoned")
    }
}

struct DispatchReset<'a>(&'a AtomicBool);

impl Drop for DispatchReset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
