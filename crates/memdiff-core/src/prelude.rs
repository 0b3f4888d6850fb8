//! Common module for library exports

pub use crate::comparator::{
    Comparator, ComparatorConfig, DiffReport, RevmapEntry, RevmapReport, Task, WorkerFailure,
};
pub use crate::error::{MemdiffError, MemdiffResult, MemoryFault};
pub use crate::memory::{MemoryReader, SnapshotImage, SnapshotPair};
pub use crate::model::{
    Encoding, IntrusiveListField, Link, ListPolicy, ListStep, Model, ModelOptions, Owner, Place, Scheduler,
    SentinelArray, StringType, TypeId, TypeRegistry, TypedObject,
};
pub use crate::types::{Address, Image, SymPath, Value};
