//! # Error Types
//!
//! General error handling for the type model and the comparator.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Errors fall into two classes with very different handling:
//!
//! 1. **Memory faults** ([`MemoryFault`]): a read hit an excluded, null or
//!    unmapped address. These are recoverable per task: the comparator counts
//!    them and moves on.
//! 2. **Everything else**: construction errors (unknown member, takeover
//!    offset mismatch), shape errors and configuration errors. These are
//!    reported to the caller and, inside a worker, terminate that worker.
//!
//! Reaching the end of an intrusive list is not an error at all; see
//! [`ListStep`](crate::model::ListStep).

use thiserror::Error;

use crate::model::TypeId;
use crate::types::{Address, Image};

/// Memory access fault raised by a [`MemoryReader`](crate::memory::MemoryReader)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFault
{
    /// The address is valid but lies in a region excluded from traversal
    /// (user space, when comparing kernel images)
    #[error("user space address {address} in image {image}")]
    UserspaceAddress
    {
        address: Address,
        image: Image,
    },

    /// Address 0 was dereferenced as data
    #[error("null pointer dereference in image {image}")]
    NullPointer
    {
        image: Image,
    },

    /// The requested range is not (fully) backed by the image
    #[error("cannot read {len} bytes at {address} in image {image}")]
    Unmapped
    {
        address: Address,
        image: Image,
        len: usize,
    },
}

/// Main error type for model and comparator operations
#[derive(Error, Debug)]
pub enum MemdiffError
{
    /// The type id does not name a registry entry
    #[error("unknown type id {0}")]
    UnknownType(TypeId),

    /// Member lookup by name failed
    #[error("type {ty} has no member named {member:?}")]
    UnknownMember
    {
        /// Name of the struct that was searched
        ty: String,
        /// The requested member name
        member: String,
    },

    /// A specialised descriptor tried to take over an entry at a different offset
    #[error("cannot take over a foreign type: expected offset {expected}, found {found}")]
    OffsetMismatch
    {
        /// Offset the specialised descriptor was built for
        expected: u64,
        /// Offset of the entry it tried to replace
        found: u64,
    },

    /// The source descriptor cannot be specialised this way
    ///
    /// Examples:
    /// - A string over an array of `int`
    /// - A sentinel-terminated array of structs
    /// - An intrusive list field over a non-member entry
    #[error("invalid specialisation: {0}")]
    InvalidSpecialization(String),

    /// A forward-declared type was used before it was defined
    #[error("type {0} is declared but not defined")]
    Incomplete(String),

    /// The size of the type depends on memory contents, not on the type
    #[error("type {0} has no static size")]
    DynamicSize(String),

    /// The array has no static bound
    #[error("array {0} has no static bound")]
    Unbounded(String),

    /// The type has no elements to iterate over
    #[error("type {0} is not iterable")]
    NotIterable(String),

    /// A memory read faulted
    #[error("memory fault: {0}")]
    Fault(#[from] MemoryFault),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A worker thread ended abnormally
    #[error("worker failed: {0}")]
    WorkerFailed(String),

    /// I/O error (loading raw images, spawning workers)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemdiffError
{
    /// Whether this error is a memory fault, i.e. recoverable at task granularity
    pub fn is_fault(&self) -> bool
    {
        matches!(self, MemdiffError::Fault(_))
    }
}

impl From<memdiff_utils::EnvError> for MemdiffError
{
    fn from(err: memdiff_utils::EnvError) -> Self
    {
        MemdiffError::Config(err.to_string())
    }
}

/// Convenience type alias for `Result<T, MemdiffError>`
///
/// ```rust
/// use memdiff_core::error::MemdiffResult;
/// fn foo() -> MemdiffResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type MemdiffResult<T> = std::result::Result<T, MemdiffError>;
