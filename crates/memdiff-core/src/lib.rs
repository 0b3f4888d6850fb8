//! # memdiff-core
//!
//! Typed views over raw memory snapshots, and a concurrent engine that
//! compares or reverse-maps them.
//!
//! This crate provides:
//! - A type registry of descriptors (scalars, pointers, arrays, structs)
//!   that may refer to each other cyclically
//! - Specialised descriptors for kernel idioms: null-terminated strings,
//!   sentinel-terminated arrays and intrusive doubly-linked lists
//! - A memory access layer with an in-memory snapshot backend
//! - The [`Comparator`], which walks typed objects in two images with a pool
//!   of worker threads, counting memory faults instead of failing on them
//!
//! ## Workflow
//!
//! 1. Populate a [`TypeRegistry`](model::TypeRegistry) with generic types.
//! 2. Splice specialised descriptors over them with `takeover`.
//! 3. Build a [`Model`](model::Model) over a [`MemoryReader`](memory::MemoryReader).
//! 4. Seed a [`Comparator`] and call `run` or `revmap`.

pub mod comparator;
pub mod error;
pub mod memory;
pub mod model;
pub mod prelude;
pub mod types;

pub use comparator::{Comparator, ComparatorConfig, DiffReport, RevmapReport};
// Re-export commonly used types
pub use error::{MemdiffError, MemdiffResult, MemoryFault};
pub use model::{Model, Scheduler, TypeId, TypeRegistry};
pub use types::{Address, Image, SymPath, Value};
