//! # Memory Access
//!
//! The byte-level layer every typed read goes through.
//!
//! The type model never touches bytes directly: it asks a [`MemoryReader`]
//! for `len` bytes at an address in one of the two images, and the reader
//! either fills the buffer or raises one of the three [`MemoryFault`]s. The
//! crate ships [`SnapshotPair`], a reader over two in-memory snapshots; other
//! backends (live kernels, hypervisor introspection) implement the trait.

pub mod snapshot;

pub use snapshot::{ImageRegion, SnapshotImage, SnapshotPair, DEFAULT_USERSPACE_LIMIT};

use crate::error::MemoryFault;
use crate::types::{Address, Image};

/// Width of a target pointer in bytes
pub const POINTER_SIZE: u64 = 8;

/// Raw reads from a pair of memory images
///
/// Implementations must be shareable across the comparator's worker threads.
/// All multi-byte values are little-endian.
pub trait MemoryReader: Send + Sync
{
    /// Fill `buf` with the bytes at `address` in `image`
    ///
    /// ## Errors
    ///
    /// - `NullPointer`: `address` is 0
    /// - `UserspaceAddress`: `address` lies in the excluded user space range
    /// - `Unmapped`: any part of the range is not readable
    fn read(&self, address: Address, image: Image, buf: &mut [u8]) -> Result<(), MemoryFault>;

    /// Read a pointer-width value at `address` in `image`
    ///
    /// A stored value of zero is returned as `Address::NULL`; deciding whether
    /// that is a fault or an end-of-list marker is up to the caller.
    fn resolve_pointer(&self, address: Address, image: Image) -> Result<Address, MemoryFault>
    {
        let mut raw = [0u8; POINTER_SIZE as usize];
        self.read(address, image, &mut raw)?;
        Ok(Address::new(u64::from_le_bytes(raw)))
    }

    /// Read `len` bytes into a fresh buffer
    fn read_bytes(&self, address: Address, image: Image, len: usize) -> Result<Vec<u8>, MemoryFault>
    {
        let mut buf = vec![0u8; len];
        self.read(address, image, &mut buf)?;
        Ok(buf)
    }
}
