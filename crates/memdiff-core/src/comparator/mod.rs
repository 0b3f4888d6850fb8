//! # Comparator
//!
//! A shared work queue drained by a fixed pool of worker threads.
//!
//! The caller seeds the queue with [`enqueue_diff`](Scheduler::enqueue_diff)
//! or [`enqueue_rev`](Scheduler::enqueue_rev), then calls
//! [`run`](Comparator::run) or [`revmap`](Comparator::revmap). Workers pop
//! tasks in batches and hand them to the type model, which schedules the
//! sub-objects it finds back onto the same queue.
//!
//! ## Locking
//!
//! State is split across three independent guards:
//!
//! - the seen sets (`(type, address)` pairs for diffs, bare addresses for
//!   reverse mapping);
//! - the task queue;
//! - the fault counter (an atomic).
//!
//! An enqueue takes the seen lock and then the queue lock, so the dedup
//! check and the append are one atomic step. Fetching takes only the queue
//! lock.
//!
//! ## Termination
//!
//! Fetching never blocks: a worker that finds the queue empty exits, and
//! the pool is never refilled. A worker can therefore leave while another
//! worker is still about to enqueue work. That work is not lost, since the
//! enqueuing worker drains it itself once its current batch is done, but
//! the run may finish with fewer workers busy than were started. There is
//! no coordinated shutdown and no timeout.
//!
//! ## Faults
//!
//! A task that hits a [`MemoryFault`](crate::error::MemoryFault) is counted
//! and dropped; the worker carries on. Any other error ends that worker and
//! the unexecuted rest of its batch. The remaining workers keep draining,
//! and the run still produces its report, with each stopped worker listed
//! as a [`WorkerFailure`].

pub mod config;
pub mod report;
pub mod task;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, error, info, info_span, trace, warn};

pub use config::{ComparatorConfig, DEFAULT_BATCH_SIZE};
pub use report::{DiffReport, RevmapEntry, RevmapReport, WorkerFailure};
pub use task::Task;

use crate::error::{MemdiffError, MemdiffResult};
use crate::model::{Model, Scheduler, TypeId};
use crate::types::{Address, SymPath};

#[derive(Debug, Default)]
struct SeenSets
{
    by_type: HashMap<TypeId, HashSet<Address>>,
    rev: HashSet<Address>,
}

impl SeenSets
{
    fn compared(&self) -> usize
    {
        self.by_type.values().map(HashSet::len).sum()
    }
}

/// Work queue, dedup state and results of one comparison
#[derive(Debug)]
pub struct Comparator
{
    model: Arc<Model>,
    config: ComparatorConfig,
    seen: Mutex<SeenSets>,
    queue: Mutex<VecDeque<Task>>,
    faults: AtomicUsize,
    processed: AtomicUsize,
    differing: boxcar::Vec<SymPath>,
    entries: boxcar::Vec<RevmapEntry>,
}

impl Comparator
{
    pub fn new(model: Arc<Model>, config: ComparatorConfig) -> Self
    {
        Self {
            model,
            config,
            seen: Mutex::new(SeenSets::default()),
            queue: Mutex::new(VecDeque::new()),
            faults: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
            differing: boxcar::Vec::new(),
            entries: boxcar::Vec::new(),
        }
    }

    pub fn model(&self) -> &Model
    {
        &self.model
    }

    pub fn config(&self) -> &ComparatorConfig
    {
        &self.config
    }

    /// Tasks currently waiting in the queue
    pub fn pending(&self) -> usize
    {
        self.queue().len()
    }

    /// Faults counted so far
    pub fn faults(&self) -> usize
    {
        self.faults.load(Ordering::Relaxed)
    }

    /// Take up to `count` tasks from the front of the queue
    ///
    /// Never waits: an empty result means the queue was empty at the time
    /// of the call, not that no more work will arrive.
    pub fn fetch_tasks(&self, count: usize) -> Vec<Task>
    {
        let mut queue = self.queue();
        let take = count.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Drain the queue with `workers` threads and report the comparison
    ///
    /// A worker count of 0 runs a single worker. Workers that stop on a
    /// non-fault error are listed in the report instead of failing the run.
    ///
    /// ## Errors
    ///
    /// Returns `Io` only if not a single worker thread could be spawned.
    pub fn run(&self, workers: usize) -> MemdiffResult<DiffReport>
    {
        let span = info_span!("compare", workers);
        let _enter = span.enter();
        info!(pending = self.pending(), "starting comparison");

        let worker_failures = self.drain(workers)?;

        let report = DiffReport {
            compared: self.seen().compared(),
            processed: self.processed.load(Ordering::Relaxed),
            faults: self.faults(),
            differing: self.differing.iter().map(|(_, path)| path.clone()).collect(),
            worker_failures,
        };
        info!(
            compared = report.compared,
            faults = report.faults,
            differing = report.differing.len(),
            "comparison finished ({:.2}% faults)",
            report.fault_rate()
        );
        if !report.is_complete() {
            warn!(failed = report.worker_failures.len(), "comparison finished with stopped workers");
        }
        Ok(report)
    }

    /// [`run`](Self::run) with the configured worker count
    ///
    /// ## Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn run_configured(&self) -> MemdiffResult<DiffReport>
    {
        self.run(self.config.workers)
    }

    /// Drain the queue with `workers` threads and return the reverse map
    ///
    /// A worker count of 0 runs a single worker. Workers that stop on a
    /// non-fault error are listed in the report instead of failing the run.
    ///
    /// ## Errors
    ///
    /// Returns `Io` only if not a single worker thread could be spawned.
    pub fn revmap(&self, workers: usize) -> MemdiffResult<RevmapReport>
    {
        let span = info_span!("revmap", workers);
        let _enter = span.enter();
        info!(pending = self.pending(), "starting reverse mapping");

        let worker_failures = self.drain(workers)?;

        let report = RevmapReport {
            entries: self.entries.iter().map(|(_, entry)| *entry).collect(),
            faults: self.faults(),
            worker_failures,
        };
        info!(entries = report.entries.len(), faults = report.faults, "reverse mapping finished");
        if !report.is_complete() {
            warn!(failed = report.worker_failures.len(), "reverse mapping finished with stopped workers");
        }
        Ok(report)
    }

    /// [`revmap`](Self::revmap) with the configured worker count
    ///
    /// ## Errors
    ///
    /// Same as [`revmap`](Self::revmap).
    pub fn revmap_configured(&self) -> MemdiffResult<RevmapReport>
    {
        self.revmap(self.config.workers)
    }

    fn drain(&self, workers: usize) -> MemdiffResult<Vec<WorkerFailure>>
    {
        if workers == 0 {
            warn!("no workers requested, running with one");
        }
        let workers = workers.max(1);
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for index in 0..workers {
                let spawned = thread::Builder::new()
                    .name(format!("memdiff-worker-{index}"))
                    .spawn_scoped(scope, move || self.work(index));
                match spawned {
                    Ok(handle) => handles.push((index, handle)),
                    Err(err) if handles.is_empty() => return Err(MemdiffError::from(err)),
                    Err(err) => {
                        warn!(worker = index, error = %err, running = handles.len(), "could not spawn worker");
                        break;
                    }
                }
            }

            let mut failures = Vec::new();
            for (index, handle) in handles {
                let failure = match handle.join() {
                    Ok(Ok(())) => continue,
                    Ok(Err(failure)) => failure,
                    Err(_) => WorkerFailure {
                        worker: index,
                        error: Arc::new(MemdiffError::WorkerFailed(format!("worker {index} panicked"))),
                        abandoned: 0,
                    },
                };
                error!(
                    worker = index,
                    error = %failure.error,
                    abandoned = failure.abandoned,
                    "worker terminated abnormally"
                );
                failures.push(failure);
            }
            Ok(failures)
        })
    }

    fn work(&self, worker: usize) -> Result<(), WorkerFailure>
    {
        let span = info_span!("worker", worker);
        let _enter = span.enter();

        let mut executed = 0usize;
        let mut tasks = self.fetch_tasks(self.config.batch_size);
        while !tasks.is_empty() {
            let batch = tasks.len();
            for (position, task) in tasks.into_iter().enumerate() {
                executed += 1;
                self.processed.fetch_add(1, Ordering::Relaxed);
                match self.execute(&task) {
                    Ok(()) => {}
                    Err(err) if err.is_fault() => {
                        self.faults.fetch_add(1, Ordering::Relaxed);
                        debug!(path = %task.path(), ty = %task.ty(), address = %task.address(), error = %err, "task faulted");
                    }
                    Err(err) => {
                        debug!(path = %task.path(), ty = %task.ty(), error = %err, "task failed");
                        return Err(WorkerFailure {
                            worker,
                            error: Arc::new(err),
                            abandoned: batch - position - 1,
                        });
                    }
                }
            }
            tasks = self.fetch_tasks(self.config.batch_size);
        }
        debug!(executed, "queue empty, worker exiting");
        Ok(())
    }

    fn execute(&self, task: &Task) -> MemdiffResult<()>
    {
        match task {
            Task::Diff {
                path,
                ty,
                address0,
                address1,
            } => {
                if !self.model.memcmp(*ty, *address0, *address1, self, path)? {
                    debug!(%path, %address0, %address1, "differing");
                    self.differing.push(path.clone());
                }
                Ok(())
            }
            Task::Rev { path, ty, address } => self.model.revmap(*ty, *address, self, path),
        }
    }

    fn too_deep(&self, path: &SymPath) -> bool
    {
        let too_deep = self.config.max_path_depth.is_some_and(|max| path.depth() > max);
        if too_deep {
            trace!(%path, "path depth limit reached, dropping task");
        }
        too_deep
    }

    fn seen(&self) -> MutexGuard<'_, SeenSets>
    {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Task>>
    {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for Comparator
{
    fn enqueue_diff(&self, path: SymPath, ty: TypeId, address0: Address, address1: Address) -> bool
    {
        if self.too_deep(&path) {
            return false;
        }
        let mut seen = self.seen();
        if !seen.by_type.entry(ty).or_default().insert(address0) {
            trace!(%path, %ty, %address0, "already seen");
            return false;
        }
        self.queue().push_back(Task::Diff {
            path,
            ty,
            address0,
            address1,
        });
        true
    }

    fn enqueue_rev(&self, path: SymPath, ty: TypeId, address: Address, size: u64) -> bool
    {
        if self.too_deep(&path) {
            return false;
        }
        let mut seen = self.seen();
        if !seen.rev.insert(address) {
            trace!(%path, %address, "already mapped");
            return false;
        }
        self.entries.push(RevmapEntry { address, size, ty });
        self.queue().push_back(Task::Rev { path, ty, address });
        true
    }

    fn record_rev(&self, path: SymPath, ty: TypeId, address: Address, size: u64) -> bool
    {
        let mut seen = self.seen();
        if !seen.rev.insert(address) {
            trace!(%path, %address, "already mapped");
            return false;
        }
        self.entries.push(RevmapEntry { address, size, ty });
        true
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::memory::{SnapshotImage, SnapshotPair};
    use crate::model::{Encoding, TypeRegistry};

    fn comparator(config: ComparatorConfig) -> (Comparator, TypeId)
    {
        let registry = Arc::new(TypeRegistry::new());
        let long = registry.register_basic("long", 8, Encoding::Signed).unwrap();
        let memory = SnapshotPair::new(SnapshotImage::new(), SnapshotImage::new());
        let model = Arc::new(Model::new(registry, Arc::new(memory)));
        (Comparator::new(model, config), long)
    }

    #[test]
    fn test_enqueue_diff_dedups_per_type()
    {
        let (comparator, long) = comparator(ComparatorConfig::default());
        let root = SymPath::root("x");
        assert!(comparator.enqueue_diff(root.clone(), long, Address::new(0x10), Address::new(0x20)));
        assert!(!comparator.enqueue_diff(root.member("again"), long, Address::new(0x10), Address::new(0x30)));
        assert!(comparator.enqueue_diff(root, long, Address::new(0x18), Address::new(0x20)));
        assert_eq!(comparator.pending(), 2);
    }

    #[test]
    fn test_fetch_tasks_takes_from_front()
    {
        let (comparator, long) = comparator(ComparatorConfig::default());
        for index in 0..5u64 {
            comparator.enqueue_diff(SymPath::root("x").index(index), long, Address::new(index * 8), Address::NULL);
        }
        let batch = comparator.fetch_tasks(3);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].address(), Address::new(0));
        assert_eq!(comparator.pending(), 2);
        assert_eq!(comparator.fetch_tasks(10).len(), 2);
        assert!(comparator.fetch_tasks(10).is_empty());
    }

    #[test]
    fn test_path_depth_limit()
    {
        let (comparator, long) = comparator(ComparatorConfig::new().max_path_depth(1));
        let shallow = SymPath::root("x").member("a");
        let deep = shallow.member("b");
        assert!(comparator.enqueue_diff(shallow, long, Address::new(0x10), Address::new(0x10)));
        assert!(!comparator.enqueue_diff(deep, long, Address::new(0x20), Address::new(0x20)));
        assert_eq!(comparator.pending(), 1);
    }

    #[test]
    fn test_rev_dedup_is_global()
    {
        let (comparator, long) = comparator(ComparatorConfig::default());
        let address = Address::new(0x40);
        assert!(comparator.enqueue_rev(SymPath::root("a"), long, address, 8));
        assert!(!comparator.record_rev(SymPath::root("b"), long, address, 8));
        assert!(!comparator.enqueue_rev(SymPath::root("c"), long, address, 8));
        assert_eq!(comparator.entries.count(), 1);
        assert_eq!(comparator.pending(), 1);
    }

    #[test]
    fn test_empty_run()
    {
        let (comparator, _) = comparator(ComparatorConfig::default());
        let report = comparator.run(4).unwrap();
        assert_eq!(report, DiffReport::default());
    }

    #[test]
    fn test_zero_workers_still_drain()
    {
        let (comparator, long) = comparator(ComparatorConfig::default());
        // below the default user space limit, so the read faults
        comparator.enqueue_diff(SymPath::root("x"), long, Address::new(0x10), Address::new(0x10));
        let report = comparator.run(0).unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.faults, 1);
        assert_eq!(comparator.pending(), 0);
    }

    #[test]
    fn test_configured_worker_count()
    {
        let (comparator, long) = comparator(ComparatorConfig::new().workers(3));
        for index in 0..10u64 {
            comparator.enqueue_rev(SymPath::root("x").index(index), long, Address::new(0x100 + index * 8), 8);
        }
        let report = comparator.revmap_configured().unwrap();
        assert_eq!(report.entries.len(), 10);
        assert!(report.is_complete());
        assert_eq!(comparator.pending(), 0);
    }
}
