//! The job scheduler.
//!
//! Work is scheduled as jobs onto a shared worker pool. Each job may name
//! dependency handles; the job starts only after every dependency has
//! completed. Handles form a DAG: completion order is defined along a
//! dependency chain and undefined across independent chains, so two jobs
//! that overlap in write access without an edge between them are a caller
//! error.
//!
//! Scheduling is non-blocking. [`JobScheduler::wait`] blocks the calling
//! thread until a handle completes and is meant for designated
//! synchronization points such as a barrier update; calling it from inside
//! a job is rejected as a potential deadlock. Jobs are never cancelled;
//! once dispatched they run to completion.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rayon::prelude::*;
use tracing::trace;

use crate::entity::Entity;
use crate::error::SchedulerError;
use crate::storage::chunk::Chunk;

type Work = Box<dyn FnOnce() + Send>;

struct Edges {
    completed: bool,
    dependents: Vec<Arc<JobNode>>,
}

struct JobNode {
    work: Mutex<Option<Work>>,
    /// Unfinished dependencies, plus one guard count held during scheduling.
    pending: AtomicUsize,
    panicked: AtomicBool,
    edges: Mutex<Edges>,
    done: Mutex<bool>,
    cond: Condvar,
}

impl JobNode {
    fn new(work: Work, dependencies: usize) -> Arc<Self> {
        Arc::new(JobNode {
            work: Mutex::new(Some(work)),
            pending: AtomicUsize::new(dependencies + 1),
            panicked: AtomicBool::new(false),
            edges: Mutex::new(Edges {
                completed: false,
                dependents: Vec::new(),
            }),
            done: Mutex::new(false),
            cond: Condvar::new(),
        })
    }
}

/// A dependency token for a scheduled unit of work.
///
/// Handles are cheap to clone; all clones refer to the same job.
#[derive(Clone)]
pub struct JobHandle {
    node: Arc<JobNode>,
}

impl JobHandle {
    /// Returns `true` if the job has finished running.
    pub fn is_complete(&self) -> bool {
        *self.node.done.lock()
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// Schedules jobs onto a worker thread pool, honouring dependency edges
/// between them.
pub struct JobScheduler {
    pool: Arc<rayon::ThreadPool>,
}

impl JobScheduler {
    /// Constructs a scheduler with one worker per available core.
    pub fn new() -> Result<Self, SchedulerError> {
        Self::build(rayon::ThreadPoolBuilder::new())
    }

    /// Constructs a scheduler with a fixed number of workers.
    pub fn with_threads(threads: usize) -> Result<Self, SchedulerError> {
        Self::build(rayon::ThreadPoolBuilder::new().num_threads(threads))
    }

    fn build(builder: rayon::ThreadPoolBuilder) -> Result<Self, SchedulerError> {
        let pool = builder.build()?;
        Ok(JobScheduler {
            pool: Arc::new(pool),
        })
    }

    /// Schedules `work` to run once every handle in `dependencies` has
    /// completed. Returns without blocking; the work runs on a worker
    /// thread chosen by the pool.
    pub fn schedule<F>(&self, work: F, dependencies: &[JobHandle]) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let node = JobNode::new(Box::new(work), dependencies.len());

        let mut already_complete = 0;
        for dependency in dependencies {
            let mut edges = dependency.node.edges.lock();
            if edges.completed {
                already_complete += 1;
            } else {
                edges.dependents.push(node.clone());
            }
        }

        trace!(
            dependencies = dependencies.len(),
            satisfied = already_complete,
            "scheduled job"
        );

        // Drop the guard count along with any dependencies that had already
        // completed. If that leaves nothing pending, the job is ready now.
        if node
            .pending
            .fetch_sub(already_complete + 1, Ordering::AcqRel)
            == already_complete + 1
        {
            dispatch(self.pool.clone(), node.clone());
        }

        JobHandle { node }
    }

    /// Blocks the calling thread until the job behind `handle` completes.
    ///
    /// Fails with [`SchedulerError::WaitInsideJob`] when called from a
    /// worker thread, and with [`SchedulerError::JobPanicked`] if the job
    /// panicked while running.
    pub fn wait(&self, handle: &JobHandle) -> Result<(), SchedulerError> {
        if self.pool.current_thread_index().is_some() {
            return Err(SchedulerError::WaitInsideJob);
        }

        let mut done = handle.node.done.lock();
        while !*done {
            handle.node.cond.wait(&mut done);
        }
        drop(done);

        if handle.node.panicked.load(Ordering::Acquire) {
            return Err(SchedulerError::JobPanicked);
        }
        Ok(())
    }

    /// Schedules a chunk-visitor job over a query snapshot: `visit` is
    /// invoked once per chunk, in parallel across chunks, with the chunk's
    /// position in the snapshot as a stable lane index for command
    /// recording.
    pub fn for_each_chunk<F>(
        &self,
        chunks: Vec<Arc<Chunk>>,
        dependencies: &[JobHandle],
        visit: F,
    ) -> JobHandle
    where
        F: Fn(usize, &Chunk) + Send + Sync + 'static,
    {
        self.schedule(
            move || {
                chunks
                    .par_iter()
                    .enumerate()
                    .for_each(|(lane, chunk)| visit(lane, chunk));
            },
            dependencies,
        )
    }

    /// Schedules a per-entity transform job over a query snapshot:
    /// `transform` is invoked once per entity with its lane index, id,
    /// chunk and slot. Entities within one chunk are visited in slot order;
    /// chunks are visited in parallel.
    pub fn for_each_entity<F>(
        &self,
        chunks: Vec<Arc<Chunk>>,
        dependencies: &[JobHandle],
        transform: F,
    ) -> JobHandle
    where
        F: Fn(usize, Entity, &Chunk, usize) + Send + Sync + 'static,
    {
        self.for_each_chunk(chunks, dependencies, move |lane, chunk| {
            let entities = chunk.entities();
            for (slot, entity) in entities.iter().enumerate() {
                transform(lane, *entity, chunk, slot);
            }
        })
    }
}

/// Hands a ready job to the pool. On completion the job wakes its waiters
/// and dispatches any dependents whose last dependency this was.
fn dispatch(pool: Arc<rayon::ThreadPool>, node: Arc<JobNode>) {
    let spawn_pool = pool.clone();
    spawn_pool.spawn(move || {
        let work = node.work.lock().take();
        if let Some(work) = work {
            // The closure and everything it captured are dropped before the
            // job is marked complete, so resources such as command buffer
            // handles are released by the time a barrier waits on this job.
            if catch_unwind(AssertUnwindSafe(work)).is_err() {
                node.panicked.store(true, Ordering::Release);
            }
        }

        let dependents = {
            let mut edges = node.edges.lock();
            edges.completed = true;
            std::mem::take(&mut edges.dependents)
        };

        *node.done.lock() = true;
        node.cond.notify_all();

        for dependent in dependents {
            if dependent.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                dispatch(pool.clone(), dependent);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn scheduler() -> JobScheduler {
        JobScheduler::with_threads(2).unwrap()
    }

    #[test]
    fn jobs_run_to_completion() {
        let scheduler = scheduler();
        let counter = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                scheduler.schedule(
                    move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    },
                    &[],
                )
            })
            .collect();

        for handle in &handles {
            scheduler.wait(handle).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn dependencies_order_execution() {
        let scheduler = scheduler();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let log = log.clone();
            scheduler.schedule(
                move || {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    log.lock().push(1);
                },
                &[],
            )
        };
        let second = {
            let log = log.clone();
            scheduler.schedule(
                move || {
                    log.lock().push(2);
                },
                &[first.clone()],
            )
        };
        let third = {
            let log = log.clone();
            scheduler.schedule(
                move || {
                    log.lock().push(3);
                },
                &[second.clone()],
            )
        };

        scheduler.wait(&third).unwrap();
        assert_eq!(*log.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn dependency_on_completed_job() {
        let scheduler = scheduler();
        let first = scheduler.schedule(|| {}, &[]);
        scheduler.wait(&first).unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let second = scheduler.schedule(
            move || {
                flag.store(true, Ordering::SeqCst);
            },
            &[first],
        );

        scheduler.wait(&second).unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn waiting_inside_a_job_is_rejected() {
        let scheduler = Arc::new(scheduler());
        let inner = scheduler.schedule(|| {}, &[]);

        let observed = Arc::new(Mutex::new(None));
        let result = observed.clone();
        let sched = scheduler.clone();
        let outer = scheduler.schedule(
            move || {
                *result.lock() = Some(matches!(
                    sched.wait(&inner),
                    Err(SchedulerError::WaitInsideJob)
                ));
            },
            &[],
        );

        scheduler.wait(&outer).unwrap();
        assert_eq!(*observed.lock(), Some(true));
    }

    #[test]
    fn panicking_job_is_reported() {
        let scheduler = scheduler();
        let handle = scheduler.schedule(
            || {
                panic!("job failure");
            },
            &[],
        );

        assert!(matches!(
            scheduler.wait(&handle),
            Err(SchedulerError::JobPanicked)
        ));
    }
}
