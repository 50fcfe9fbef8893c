use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tracing::debug;

use crate::api::{Builder, ManageResource, ReleaseMode};
use crate::dispatch::Dispatcher;
use crate::lock::RwLock;

/// The guts of a `Pool`.
#[allow(missing_debug_implementations)]
pub(crate) struct SharedPool<M>
where
    M: ManageResource,
{
    pub(crate) statics: Builder<M>,
    pub(crate) manager: M,
    /// Capacity gate: one permit per slot, consumed on checkout and restored
    /// on release. Never closed.
    pub(crate) gate: Semaphore,
    /// Turn lock serializing acquisitions (read turns) against barriers
    /// (write turns). Held only for the duration of the acquire algorithm,
    /// never while a resource is checked out.
    pub(crate) turn: tokio::sync::RwLock<()>,
    pub(crate) registry: RwLock<Registry<M::Resource>>,
    /// Number of resources currently checked out; barriers wait for zero.
    pub(crate) in_flight: watch::Sender<u32>,
    pub(crate) dispatcher: Dispatcher<M>,
}

impl<M> SharedPool<M>
where
    M: ManageResource,
{
    pub(crate) fn new(statics: Builder<M>, manager: M) -> Self {
        let gate = Semaphore::new(statics.max_size as usize);
        let (in_flight, _) = watch::channel(0);
        let dispatcher =
            Dispatcher::spawn(statics.thread_name.as_deref().unwrap_or("corral-dispatch"));
        Self {
            statics,
            manager,
            gate,
            turn: tokio::sync::RwLock::new(()),
            registry: RwLock::new(Registry::default()),
            in_flight,
            dispatcher,
        }
    }

    /// Returns a checked-out resource to the pool.
    ///
    /// The registry update depends on `mode` and on whether the entry still
    /// exists (it may have been swept by `remove_all`), but the capacity slot
    /// is restored unconditionally, exactly once.
    pub(crate) fn put_back(&self, id: u64, mode: ReleaseMode) {
        let removed = {
            let mut registry = self.registry.write();
            match mode {
                ReleaseMode::Reuse => {
                    registry.reuse(id);
                    None
                }
                ReleaseMode::Discard => registry.discard(id),
            }
        };
        if removed.is_some() {
            debug!(id, "discarded pooled resource");
        }
        self.restore_slot();
        // `removed` drops here, so a resource destructor never runs inside
        // the registry lock.
    }

    /// Undoes one checkout's worth of reservations: decrements the in-flight
    /// count and returns a gate permit.
    pub(crate) fn restore_slot(&self) {
        self.in_flight.send_modify(|outstanding| {
            debug_assert!(*outstanding > 0, "release without a matching acquire");
            *outstanding = outstanding.saturating_sub(1);
        });
        self.gate.add_permits(1);
    }
}

/// Registered resources in construction order, plus the construction count.
///
/// Entries are addressed by their construction sequence number, which stands
/// in for reference identity: release must find the exact item that was
/// checked out, not an equal-looking one.
pub(crate) struct Registry<R> {
    items: Vec<Entry<R>>,
    created: u64,
}

pub(crate) struct Entry<R> {
    id: u64,
    resource: Arc<R>,
    available: bool,
}

impl<R> Default for Registry<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            created: 0,
        }
    }
}

impl<R> Registry<R> {
    /// Marks the first available entry as checked out and returns it.
    pub(crate) fn checkout(&mut self) -> Option<(u64, Arc<R>)> {
        let entry = self.items.iter_mut().find(|entry| entry.available)?;
        entry.available = false;
        Some((entry.id, Arc::clone(&entry.resource)))
    }

    /// Claims the next construction sequence number. The count only grows;
    /// a failed construction does not give its number back.
    pub(crate) fn next_sequence(&mut self) -> u64 {
        self.created += 1;
        self.created
    }

    /// Registers a freshly built resource as checked out.
    pub(crate) fn insert(&mut self, id: u64, resource: Arc<R>) {
        self.items.push(Entry {
            id,
            resource,
            available: false,
        });
    }

    /// Marks the entry with the given id available again. No-op if the entry
    /// is gone: a release after `remove_all` must not resurrect it.
    pub(crate) fn reuse(&mut self, id: u64) -> bool {
        match self.items.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.available = true;
                true
            }
            None => false,
        }
    }

    /// Removes the entry with the given id, handing it back so the caller
    /// can drop it outside the lock. No-op if the entry is gone.
    pub(crate) fn discard(&mut self, id: u64) -> Option<Entry<R>> {
        let index = self.items.iter().position(|entry| entry.id == id)?;
        Some(self.items.remove(index))
    }

    /// Empties the registry, handing the entries back for out-of-lock drop.
    pub(crate) fn clear(&mut self) -> Vec<Entry<R>> {
        std::mem::take(&mut self.items)
    }

    pub(crate) fn resources(&self) -> impl Iterator<Item = &R> {
        self.items.iter().map(|entry| &*entry.resource)
    }

    pub(crate) fn state(&self, in_use: u32) -> State {
        State {
            resources: self.items.len() as u32,
            idle: self.items.iter().filter(|entry| entry.available).count() as u32,
            in_use,
            created: self.created,
        }
    }
}

/// Information about the state of a `Pool`.
#[derive(Debug)]
#[non_exhaustive]
pub struct State {
    /// The number of resources currently registered, available or not.
    pub resources: u32,
    /// The number of registered resources available for checkout.
    pub idle: u32,
    /// The number of checkouts in flight. This counts callers between
    /// acquire and release, so it includes one mid-construction caller per
    /// resource being built.
    pub in_use: u32,
    /// Total constructions attempted over the pool's lifetime. Monotone;
    /// discards and factory failures do not decrease it.
    pub created: u64,
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use std::sync::Arc;

    fn seeded(n: u64) -> Registry<u64> {
        let mut registry = Registry::default();
        for _ in 0..n {
            let id = registry.next_sequence();
            registry.insert(id, Arc::new(id * 10));
            registry.reuse(id);
        }
        registry
    }

    #[test]
    fn checkout_prefers_first_available_in_order() {
        let mut registry = seeded(3);
        let (id, resource) = registry.checkout().unwrap();
        assert_eq!(id, 1);
        assert_eq!(*resource, 10);

        // 1 is now checked out, so the scan lands on 2.
        let (id, _) = registry.checkout().unwrap();
        assert_eq!(id, 2);

        registry.reuse(1);
        let (id, _) = registry.checkout().unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn checkout_exhausts_to_none() {
        let mut registry = seeded(2);
        assert!(registry.checkout().is_some());
        assert!(registry.checkout().is_some());
        assert!(registry.checkout().is_none());
    }

    #[test]
    fn discard_is_by_identity_not_value() {
        let mut registry = Registry::default();
        // Two entries wrapping equal-looking resources.
        let a = registry.next_sequence();
        registry.insert(a, Arc::new(7u64));
        let b = registry.next_sequence();
        registry.insert(b, Arc::new(7u64));

        let removed = registry.discard(a).unwrap();
        assert_eq!(removed.id, a);
        assert_eq!(registry.state(0).resources, 1);
        // The remaining entry is the one checked out as `b`.
        registry.reuse(b);
        let (id, _) = registry.checkout().unwrap();
        assert_eq!(id, b);
    }

    #[test]
    fn reuse_after_clear_does_not_resurrect() {
        let mut registry = seeded(2);
        let (id, _) = registry.checkout().unwrap();
        let drained = registry.clear();
        assert_eq!(drained.len(), 2);

        assert!(!registry.reuse(id));
        assert!(registry.discard(id).is_none());
        assert_eq!(registry.state(0).resources, 0);
    }

    #[test]
    fn sequence_survives_discard_and_clear() {
        let mut registry = seeded(2);
        registry.discard(1);
        registry.clear();
        assert_eq!(registry.next_sequence(), 3);
        assert_eq!(registry.state(0).created, 3);
    }
}
