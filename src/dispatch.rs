use std::thread;

use tokio::sync::mpsc;
use tracing::trace;

use crate::api::{ManageResource, PooledResource};
use crate::inner::PoolInner;

/// Work items consumed by the dispatch thread.
pub(crate) enum Job<M>
where
    M: ManageResource,
{
    /// Acquire a resource and hand the outcome to the continuation.
    Acquire {
        pool: PoolInner<M>,
        deliver: Box<dyn FnOnce(Result<PooledResource<M>, M::Error>) + Send>,
    },
    /// Run barrier work once the pool is fully idle.
    Barrier {
        pool: PoolInner<M>,
        work: Box<dyn FnOnce() + Send>,
    },
}

impl<M> Job<M>
where
    M: ManageResource,
{
    fn run(self) {
        match self {
            Job::Acquire { pool, deliver } => deliver(futures_executor::block_on(pool.get())),
            Job::Barrier { pool, work } => futures_executor::block_on(pool.barrier(work)),
        }
    }
}

/// Handle to the pool's dedicated dispatch thread.
///
/// The thread serializes callback acquisitions and detached barriers: at
/// most one job blocks on the capacity gate at a time, the rest queue behind
/// it. Jobs own the pool state they touch, so work already enqueued still
/// completes after the last external pool handle drops; the thread exits
/// once the queue drains and closes.
pub(crate) struct Dispatcher<M>
where
    M: ManageResource,
{
    jobs: mpsc::UnboundedSender<Job<M>>,
}

impl<M> Dispatcher<M>
where
    M: ManageResource,
{
    pub(crate) fn spawn(name: &str) -> Self {
        let (jobs, mut queue) = mpsc::unbounded_channel::<Job<M>>();
        thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                while let Some(job) = queue.blocking_recv() {
                    job.run();
                }
                trace!("pool dispatch thread exiting");
            })
            .expect("failed to spawn pool dispatch thread");
        Self { jobs }
    }

    pub(crate) fn enqueue(&self, job: Job<M>) {
        // Send fails only if the dispatch thread died unwinding out of a
        // panicking job; there is no one left to deliver to then.
        let _ = self.jobs.send(job);
    }
}
