use std::fmt;
use std::mem;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::api::{Builder, ManageResource, PooledResource};
use crate::dispatch::Job;
use crate::internals::{SharedPool, State};

pub(crate) struct PoolInner<M>
where
    M: ManageResource,
{
    inner: Arc<SharedPool<M>>,
}

impl<M> Clone for PoolInner<M>
where
    M: ManageResource,
{
    fn clone(&self) -> Self {
        PoolInner {
            inner: self.inner.clone(),
        }
    }
}

impl<M> fmt::Debug for PoolInner<M>
where
    M: ManageResource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("max_size: {}", self.inner.statics.max_size))
    }
}

impl<M> PoolInner<M>
where
    M: ManageResource,
{
    pub(crate) fn new(builder: Builder<M>, manager: M) -> Self {
        PoolInner {
            inner: Arc::new(SharedPool::new(builder, manager)),
        }
    }

    /// The one acquire algorithm behind all three front-ends.
    ///
    /// Order is fixed: turn read-lock, capacity gate, in-flight count,
    /// registry lock. The permit and count taken here are owed back on every
    /// failure path (factory error or cancellation mid-construction), which
    /// is what the [`Reservation`] guard enforces.
    pub(crate) async fn get(&self) -> Result<PooledResource<M>, M::Error> {
        let shared = &self.inner;
        let _turn = shared.turn.read().await;

        let permit = shared
            .gate
            .acquire()
            .await
            .expect("capacity gate is never closed");
        permit.forget();
        shared.in_flight.send_modify(|outstanding| *outstanding += 1);
        let reservation = Reservation { shared };

        if let Some((id, resource)) = shared.registry.write().checkout() {
            trace!(id, "reusing pooled resource");
            reservation.commit();
            return Ok(PooledResource::new(Arc::downgrade(shared), id, resource));
        }

        let sequence = shared.registry.write().next_sequence();
        match shared.manager.create(sequence).await {
            Ok(resource) => {
                let resource = Arc::new(resource);
                shared
                    .registry
                    .write()
                    .insert(sequence, Arc::clone(&resource));
                debug!(sequence, "built new pooled resource");
                reservation.commit();
                Ok(PooledResource::new(
                    Arc::downgrade(shared),
                    sequence,
                    resource,
                ))
            }
            Err(err) => {
                debug!(sequence, "resource construction failed");
                drop(reservation);
                Err(err)
            }
        }
    }

    pub(crate) fn get_callback(
        &self,
        deliver: Box<dyn FnOnce(Result<PooledResource<M>, M::Error>) + Send>,
    ) {
        self.inner.dispatcher.enqueue(Job::Acquire {
            pool: self.clone(),
            deliver,
        });
    }

    /// Waits for the pool to go fully idle, then runs `work` exclusively.
    ///
    /// The write turn keeps any acquisition from completing from the moment
    /// this barrier is next in line until `work` returns; the in-flight
    /// watch supplies the "no resource checked out" condition.
    pub(crate) async fn barrier<F, T>(&self, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _turn = self.inner.turn.write().await;
        let mut drained = self.inner.in_flight.subscribe();
        let _ = drained
            .wait_for(|outstanding| *outstanding == 0)
            .await
            .expect("in-flight watch lives as long as the pool");
        debug!("pool idle, running barrier work");
        work()
    }

    pub(crate) fn barrier_detached(&self, work: Box<dyn FnOnce() + Send>) {
        self.inner.dispatcher.enqueue(Job::Barrier {
            pool: self.clone(),
            work,
        });
    }

    pub(crate) fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&M::Resource),
    {
        let registry = self.inner.registry.read();
        for resource in registry.resources() {
            visitor(resource);
        }
    }

    pub(crate) fn remove_all(&self) {
        let drained = self.inner.registry.write().clear();
        debug!(removed = drained.len(), "cleared pool registry");
        // Checked-out resources among `drained` stay alive through their
        // guards; the rest drop here, outside the registry lock.
    }

    pub(crate) async fn dedicated(&self) -> Result<M::Resource, M::Error> {
        let sequence = self.inner.registry.write().next_sequence();
        self.inner.manager.create(sequence).await
    }

    pub(crate) fn state(&self) -> State {
        let in_use = *self.inner.in_flight.borrow();
        self.inner.registry.read().state(in_use)
    }
}

/// Holds the gate permit and in-flight increment taken for one checkout
/// attempt. Dropped on any failure path, it unwinds both; committed, it
/// transfers them to the guard being handed out.
struct Reservation<'a, M>
where
    M: ManageResource,
{
    shared: &'a Arc<SharedPool<M>>,
}

impl<M> Reservation<'_, M>
where
    M: ManageResource,
{
    fn commit(self) {
        mem::forget(self);
    }
}

impl<M> Drop for Reservation<'_, M>
where
    M: ManageResource,
{
    fn drop(&mut self) {
        self.shared.restore_slot();
    }
}
