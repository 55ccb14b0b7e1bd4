use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use uuid::Uuid;

/// Identifies one listener registration on one handle.
///
/// Registrations, not callbacks, are the unit of identity: subscribing the
/// same closure twice yields two ids, each removable on its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
struct Entry {
    id: ListenerId,
    /// Cleared by unsubscribe; checked immediately before each invocation.
    active: Arc<AtomicBool>,
    callback: Callback,
}

/// Copy-on-write listener set.
///
/// Subscribe and unsubscribe build a fresh vector, so a broadcast iterates
/// the snapshot current at its start and removal mid-broadcast never mutates
/// a collection being iterated. Each registration also carries a tombstone
/// flag, cleared by unsubscribe before it returns, so a broadcast already in
/// flight on another thread cannot reach a listener once its unsubscribe has
/// returned.
#[derive(Default)]
pub(crate) struct Listeners {
    entries: RwLock<Arc<Vec<Entry>>>,
}

impl Listeners {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(&self, callback: Callback) -> ListenerId {
        let id = ListenerId::new();
        let mut entries = self.entries.write().unwrap();
        let mut next = Vec::with_capacity(entries.len() + 1);
        next.extend(entries.iter().cloned());
        next.push(Entry {
            id,
            active: Arc::new(AtomicBool::new(true)),
            callback,
        });
        *entries = Arc::new(next);
        id
    }

    pub(crate) fn unsubscribe(&self, id: ListenerId) {
        let mut entries = self.entries.write().unwrap();
        for entry in entries.iter() {
            if entry.id == id {
                entry.active.store(false, Ordering::SeqCst);
            }
        }
        let next: Vec<_> = entries
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect();
        *entries = Arc::new(next);
    }

    /// Calls every currently registered listener, synchronously, with no
    /// arguments and in no guaranteed order.
    pub(crate) fn emit(&self) {
        let snapshot = self.entries.read().unwrap().clone();
        for entry in snapshot.iter() {
            if entry.active.load(Ordering::SeqCst) {
                (entry.callback)();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}

/// The result of [`Store::subscribe`](crate::Store::subscribe).
///
/// Call [`unsubscribe`](Subscription::unsubscribe) to remove the listener.
/// Dropping the subscription without unsubscribing leaves the listener
/// registered for the handle's lifetime.
#[must_use = "dropping a Subscription does not unsubscribe the listener"]
pub struct Subscription {
    id: ListenerId,
    listeners: Weak<Listeners>,
}

impl Subscription {
    pub(crate) fn new(id: ListenerId, listeners: Weak<Listeners>) -> Self {
        Self { id, listeners }
    }

    /// Removes this registration. After this returns, no broadcast reaches
    /// the listener, including a broadcast already in flight.
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
