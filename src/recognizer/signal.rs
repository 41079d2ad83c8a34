//! Observable value scoped to one recognizer source.
//!
//! Subscribers get the current value on subscribe and every later
//! transition, in order. Callbacks run under the signal's lock, so they
//! must not call back into the same signal.

use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: T,
    next_id: u64,
    observers: Vec<(SubscriptionId, Observer<T>)>,
}

pub struct StateSignal<T> {
    inner: Mutex<Inner<T>>,
}

impl<T: Clone + Send> StateSignal<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Inner {
                value,
                next_id: 0,
                observers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // Observers only post to channels; a poisoned lock still holds a valid value
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    pub fn set(&self, value: T) {
        let mut inner = self.lock();
        inner.value = value;
        for (_, observer) in &inner.observers {
            observer(&inner.value);
        }
    }

    pub fn subscribe(&self, observer: Observer<T>) -> SubscriptionId {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        observer(&inner.value);
        inner.observers.push((id, observer));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.observers.len();
        inner.observers.retain(|(sub, _)| *sub != id);
        inner.observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().observers.len()
    }
}
