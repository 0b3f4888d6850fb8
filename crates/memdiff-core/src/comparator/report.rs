//! Results of a comparator run.

use std::fmt;
use std::sync::Arc;

use crate::error::MemdiffError;
use crate::model::TypeId;
use crate::types::{Address, SymPath};

/// One reverse-map range: `address..address + size` holds a `ty`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevmapEntry
{
    pub address: Address,
    pub size: u64,
    pub ty: TypeId,
}

impl RevmapEntry
{
    /// Whether `address` falls inside the range
    pub fn contains(&self, address: Address) -> bool
    {
        address
            .offset_from(self.address)
            .is_some_and(|offset| offset < self.size)
    }
}

impl fmt::Display for RevmapEntry
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} +{:#x} {}", self.address, self.size, self.ty)
    }
}

/// A worker that stopped on an error other than a memory fault
///
/// The rest of the pool keeps draining the queue, so the run still produces
/// a report; the failure is attached to it.
#[derive(Debug, Clone)]
pub struct WorkerFailure
{
    /// Index of the worker, as in its thread name
    pub worker: usize,
    pub error: Arc<MemdiffError>,
    /// Tasks of the worker's current batch that were never executed
    pub abandoned: usize,
}

impl PartialEq for WorkerFailure
{
    fn eq(&self, other: &Self) -> bool
    {
        self.worker == other.worker
            && self.abandoned == other.abandoned
            && self.error.to_string() == other.error.to_string()
    }
}

impl Eq for WorkerFailure {}

impl fmt::Display for WorkerFailure
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(
            f,
            "worker {}: {} ({} tasks abandoned)",
            self.worker, self.error, self.abandoned
        )
    }
}

/// Outcome of [`Comparator::run`](super::Comparator::run)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport
{
    /// Distinct `(type, address)` pairs ever accepted for comparison
    pub compared: usize,
    /// Tasks actually executed by workers
    pub processed: usize,
    /// Tasks abandoned because of a memory fault
    pub faults: usize,
    /// Paths whose comparison reported a difference, in completion order
    pub differing: Vec<SymPath>,
    /// Workers that stopped early
    pub worker_failures: Vec<WorkerFailure>,
}

impl DiffReport
{
    /// Share of executed tasks that faulted, in percent
    pub fn fault_rate(&self) -> f64
    {
        if self.processed == 0 {
            return 0.0;
        }
        self.faults as f64 * 100.0 / self.processed as f64
    }

    /// Whether every worker ran until the queue was empty
    pub fn is_complete(&self) -> bool
    {
        self.worker_failures.is_empty()
    }
}

/// Outcome of [`Comparator::revmap`](super::Comparator::revmap)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevmapReport
{
    /// Recorded ranges in no particular order
    pub entries: Vec<RevmapEntry>,
    pub faults: usize,
    /// Workers that stopped early
    pub worker_failures: Vec<WorkerFailure>,
}

impl RevmapReport
{
    /// The first entry whose range covers `address`
    pub fn lookup(&self, address: Address) -> Option<&RevmapEntry>
    {
        self.entries.iter().find(|entry| entry.contains(address))
    }

    /// Whether every worker ran until the queue was empty
    pub fn is_complete(&self) -> bool
    {
        self.worker_failures.is_empty()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::model::TypeRegistry;
    use crate::model::Encoding;

    #[test]
    fn test_entry_contains()
    {
        let registry = TypeRegistry::new();
        let ty = registry.register_basic("long", 8, Encoding::Signed).unwrap();
        let entry = RevmapEntry {
            address: Address::new(0x1000),
            size: 0x10,
            ty,
        };
        assert!(entry.contains(Address::new(0x1000)));
        assert!(entry.contains(Address::new(0x100f)));
        assert!(!entry.contains(Address::new(0x1010)));
        assert!(!entry.contains(Address::new(0xfff)));
    }

    #[test]
    fn test_fault_rate()
    {
        let report = DiffReport {
            processed: 8,
            faults: 2,
            ..DiffReport::default()
        };
        assert!((report.fault_rate() - 25.0).abs() < f64::EPSILON);
        assert!(DiffReport::default().fault_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_worker_failure_display()
    {
        let failure = WorkerFailure {
            worker: 2,
            error: Arc::new(MemdiffError::Incomplete("opaque".to_string())),
            abandoned: 5,
        };
        assert_eq!(
            failure.to_string(),
            "worker 2: type opaque is declared but not defined (5 tasks abandoned)"
        );

        let report = DiffReport {
            worker_failures: vec![failure.clone()],
            ..DiffReport::default()
        };
        assert!(!report.is_complete());
        assert_eq!(report.worker_failures[0], failure);
        assert!(RevmapReport::default().is_complete());
    }
}
