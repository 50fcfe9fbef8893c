use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::inner::PoolInner;
use crate::internals::SharedPool;
pub use crate::internals::State;

/// A generic bounded resource pool.
///
/// Cloning a `Pool` is cheap; all clones share the same capacity ceiling and
/// registry.
pub struct Pool<M>
where
    M: ManageResource,
{
    pub(crate) inner: PoolInner<M>,
}

impl<M> Clone for Pool<M>
where
    M: ManageResource,
{
    fn clone(&self) -> Self {
        Pool {
            inner: self.inner.clone(),
        }
    }
}

impl<M> fmt::Debug for Pool<M>
where
    M: ManageResource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("Pool({:?})", self.inner))
    }
}

impl<M: ManageResource> Pool<M> {
    /// Returns a `Builder` instance to configure a new pool.
    pub fn builder() -> Builder<M> {
        Builder::new()
    }

    /// Returns information about the current state of the pool.
    pub fn state(&self) -> State {
        self.inner.state()
    }

    /// Retrieves a resource from the pool, suspending the calling task while
    /// the pool is at capacity.
    ///
    /// The first available resource is reused before a new one is built; a
    /// new resource is built only when every registered one is checked out.
    /// Errors from the factory propagate to the caller and leave the pool's
    /// capacity accounting untouched.
    pub async fn get(&self) -> Result<PooledResource<M>, M::Error> {
        self.inner.get().await
    }

    /// Retrieves a resource from the pool, blocking the calling thread while
    /// the pool is at capacity.
    ///
    /// This drives the same algorithm as [`get`](Pool::get) on the calling
    /// thread. It must not be called from asynchronous contexts: doing so
    /// parks an executor worker for the duration of the wait.
    pub fn get_blocking(&self) -> Result<PooledResource<M>, M::Error> {
        futures_executor::block_on(self.inner.get())
    }

    /// Retrieves a resource from the pool and delivers it to `deliver`,
    /// which is invoked exactly once with the outcome.
    ///
    /// Requests are serialized through the pool's dispatch thread: at most
    /// one of them blocks on the capacity gate at a time and the rest queue
    /// behind it, so issuing many callback acquisitions never ties up more
    /// than one thread.
    pub fn get_callback<F>(&self, deliver: F)
    where
        F: FnOnce(Result<PooledResource<M>, M::Error>) + Send + 'static,
    {
        self.inner.get_callback(Box::new(deliver));
    }

    /// Acquires a resource, passes it to `work`, and returns `work`'s output.
    ///
    /// The resource is released back to the pool for reuse when `work`'s
    /// future completes, whether it returns normally, is cancelled, or
    /// unwinds. `work` may call [`PooledResource::discard`] on the guard to
    /// release with discard instead.
    pub async fn run<F, Fut, T>(&self, work: F) -> Result<T, M::Error>
    where
        F: FnOnce(PooledResource<M>) -> Fut,
        Fut: Future<Output = T>,
    {
        let resource = self.inner.get().await?;
        Ok(work(resource).await)
    }

    /// Blocking equivalent of [`run`](Pool::run).
    ///
    /// Release on every exit path, including unwinding out of `work`. Must
    /// not be called from asynchronous contexts.
    pub fn run_blocking<F, T>(&self, work: F) -> Result<T, M::Error>
    where
        F: FnOnce(&M::Resource) -> T,
    {
        let resource = futures_executor::block_on(self.inner.get())?;
        Ok(work(&resource))
    }

    /// Waits until no resource is checked out, then runs `work` exclusively
    /// and returns its output.
    ///
    /// While the barrier holds its turn, from the moment it is next in line
    /// until `work` returns, no acquisition can complete. Resources already
    /// checked out are unaffected; the barrier simply waits for them to be
    /// released first. A caller that itself holds a checked-out resource
    /// will therefore deadlock here.
    pub async fn barrier<F, T>(&self, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.inner.barrier(work).await
    }

    /// Blocking equivalent of [`barrier`](Pool::barrier). Must not be called
    /// from asynchronous contexts.
    pub fn barrier_blocking<F, T>(&self, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        futures_executor::block_on(self.inner.barrier(work))
    }

    /// Queues `work` to run as a barrier on the pool's dispatch thread and
    /// returns immediately.
    ///
    /// The work observes the same guarantees as [`barrier`](Pool::barrier):
    /// it runs once the pool is fully idle, excluding acquisitions while it
    /// runs. Useful for background maintenance.
    pub fn barrier_detached<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.barrier_detached(Box::new(work));
    }

    /// Visits every resource currently registered in the pool, available or
    /// checked out.
    ///
    /// Traversals may run concurrently with each other and with checkouts,
    /// but never with structural changes to the registry.
    pub fn for_each<F>(&self, visitor: F)
    where
        F: FnMut(&M::Resource),
    {
        self.inner.for_each(visitor);
    }

    /// Drops every resource from the registry immediately.
    ///
    /// Resources currently checked out are not recalled: they stay alive
    /// until their guards release them, at which point the release restores
    /// capacity without re-inserting the resource.
    pub fn remove_all(&self) {
        self.inner.remove_all();
    }

    /// Builds a new resource that will not be managed by the pool.
    ///
    /// The resource consumes a construction sequence number like any other,
    /// but no capacity slot: the caller owns it outright. Useful for
    /// long-lived handles that must never be repurposed by the pool.
    pub async fn dedicated(&self) -> Result<M::Resource, M::Error> {
        self.inner.dedicated().await
    }
}

/// A builder for a resource pool.
#[derive(Debug)]
pub struct Builder<M: ManageResource> {
    /// The maximum number of resources allowed.
    pub(crate) max_size: u32,
    /// Name given to the pool's dispatch thread.
    pub(crate) thread_name: Option<String>,
    _p: PhantomData<M>,
}

impl<M: ManageResource> Default for Builder<M> {
    fn default() -> Self {
        Builder {
            max_size: 10,
            thread_name: None,
            _p: PhantomData,
        }
    }
}

impl<M: ManageResource> Builder<M> {
    /// Constructs a new `Builder`.
    ///
    /// Parameters are initialized with their default values.
    pub fn new() -> Builder<M> {
        Default::default()
    }

    /// Sets the maximum number of resources managed by the pool.
    ///
    /// Defaults to 10.
    pub fn max_size(mut self, max_size: u32) -> Builder<M> {
        assert!(max_size > 0, "max_size must be greater than zero!");
        self.max_size = max_size;
        self
    }

    /// Sets the name of the pool's dispatch thread, the execution context
    /// behind [`Pool::get_callback`] and [`Pool::barrier_detached`].
    ///
    /// This is a scheduling/debugging hint only; it has no effect on pool
    /// behavior. Defaults to `corral-dispatch`.
    pub fn thread_name(mut self, name: impl Into<String>) -> Builder<M> {
        self.thread_name = Some(name.into());
        self
    }

    /// Consumes the builder, returning a new `Pool`.
    ///
    /// No resources are built up front; construction happens lazily as
    /// acquisitions demand it.
    pub fn build(self, manager: M) -> Pool<M> {
        Pool {
            inner: PoolInner::new(self, manager),
        }
    }
}

/// A trait which provides resource construction for a pool.
#[async_trait]
pub trait ManageResource: Sized + Send + Sync + 'static {
    /// The resource type this manager builds.
    type Resource: Send + Sync + 'static;
    /// The error type returned when construction fails.
    type Error: fmt::Debug + Send + 'static;

    /// Attempts to build a new resource.
    ///
    /// `sequence` is the construction order number, starting at 1 for the
    /// first resource the pool builds. A number is never reused, even after
    /// the resource it named is discarded.
    async fn create(&self, sequence: u64) -> Result<Self::Resource, Self::Error>;
}

/// What to do with a resource when it is released back to the pool.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReleaseMode {
    /// Mark the resource available again for the next acquisition.
    Reuse,
    /// Remove the resource from the pool permanently, freeing its capacity
    /// slot for a fresh construction.
    Discard,
}

/// A smart pointer wrapping a checked-out resource.
///
/// Dropping the guard releases the resource back to the pool with
/// [`ReleaseMode::Reuse`]; use [`PooledResource::release`] or
/// [`PooledResource::discard`] for the explicit paths. Ownership makes the
/// release exactly-once: there is no way to release the same checkout twice.
#[must_use]
pub struct PooledResource<M>
where
    M: ManageResource,
{
    pool: Weak<SharedPool<M>>,
    resource: Option<Arc<M::Resource>>,
    id: u64,
}

impl<M> PooledResource<M>
where
    M: ManageResource,
{
    pub(crate) fn new(pool: Weak<SharedPool<M>>, id: u64, resource: Arc<M::Resource>) -> Self {
        Self {
            pool,
            resource: Some(resource),
            id,
        }
    }

    /// Releases the resource back to the pool with the given mode.
    ///
    /// This is an associated function rather than a method so it cannot
    /// shadow anything on the resource type itself.
    pub fn release(mut this: Self, mode: ReleaseMode) {
        if this.resource.take().is_some() {
            if let Some(pool) = this.pool.upgrade() {
                pool.put_back(this.id, mode);
            }
        }
    }

    /// Releases the resource with [`ReleaseMode::Discard`], removing it from
    /// the pool permanently.
    pub fn discard(this: Self) {
        Self::release(this, ReleaseMode::Discard);
    }
}

impl<M> Deref for PooledResource<M>
where
    M: ManageResource,
{
    type Target = M::Resource;

    fn deref(&self) -> &M::Resource {
        self.resource.as_ref().unwrap()
    }
}

impl<M> fmt::Debug for PooledResource<M>
where
    M: ManageResource,
    M::Resource: fmt::Debug,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.resource.as_ref().unwrap(), fmt)
    }
}

impl<M> Drop for PooledResource<M>
where
    M: ManageResource,
{
    fn drop(&mut self) {
        if self.resource.take().is_some() {
            if let Some(pool) = self.pool.upgrade() {
                pool.put_back(self.id, ReleaseMode::Reuse);
            }
        }
    }
}
