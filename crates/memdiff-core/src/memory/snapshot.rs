//! In-memory snapshot backend.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::MemoryReader;
use crate::error::{MemdiffError, MemdiffResult, MemoryFault};
use crate::types::{Address, Image};

/// Start of the x86-64 kernel half; everything below is user space.
pub const DEFAULT_USERSPACE_LIMIT: Address = Address::new(0xffff_8000_0000_0000);

/// A contiguous, readable range of one image
///
/// `start` is inclusive and `end()` exclusive, so the region covers
/// `start..start + data.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRegion
{
    /// First address covered by the region
    pub start: Address,
    /// Region contents
    pub data: Arc<[u8]>,
    /// Optional label, e.g. the dump file it was loaded from
    pub name: Option<String>,
}

impl ImageRegion
{
    /// Create a region starting at `start`
    pub fn new(start: Address, data: impl Into<Arc<[u8]>>, name: Option<String>) -> Self
    {
        Self {
            start,
            data: data.into(),
            name,
        }
    }

    /// Exclusive end address
    pub fn end(&self) -> Address
    {
        self.start + self.size()
    }

    /// Size in bytes
    pub fn size(&self) -> u64
    {
        self.data.len() as u64
    }

    /// Whether `address` falls inside the region
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.start && address < self.end()
    }
}

/// One memory image made of non-overlapping regions
#[derive(Debug, Clone, Default)]
pub struct SnapshotImage
{
    regions: Vec<ImageRegion>,
}

impl SnapshotImage
{
    /// Create an empty image
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Add a region of bytes starting at `start`
    ///
    /// ## Errors
    ///
    /// Returns `Config` if the region is empty, wraps around the address
    /// space or overlaps an existing region.
    pub fn add_region(&mut self, start: Address, data: impl Into<Arc<[u8]>>, name: Option<String>) -> MemdiffResult<()>
    {
        let region = ImageRegion::new(start, data, name);
        if region.data.is_empty() {
            return Err(MemdiffError::Config(format!("empty region at {start}")));
        }
        if start.checked_add(region.size()).is_none() {
            return Err(MemdiffError::Config(format!("region at {start} wraps the address space")));
        }

        let index = self.regions.partition_point(|existing| existing.start < start);
        let overlaps_prev = index > 0 && self.regions[index - 1].end() > start;
        let overlaps_next = self.regions.get(index).is_some_and(|next| next.start < region.end());
        if overlaps_prev || overlaps_next {
            return Err(MemdiffError::Config(format!(
                "region {start}..{} overlaps an existing region",
                region.end()
            )));
        }

        self.regions.insert(index, region);
        Ok(())
    }

    /// Builder-style [`add_region`](Self::add_region)
    ///
    /// ## Errors
    ///
    /// Same as [`add_region`](Self::add_region).
    pub fn with_region(mut self, start: Address, data: impl Into<Arc<[u8]>>) -> MemdiffResult<Self>
    {
        self.add_region(start, data, None)?;
        Ok(self)
    }

    /// Load a raw dump file as a single region mapped at `base`
    ///
    /// ## Errors
    ///
    /// Returns `Io` if the file cannot be read, and `Config` if it is empty
    /// or overlaps an existing region.
    pub fn load_raw(&mut self, path: &Path, base: Address) -> MemdiffResult<()>
    {
        let data = fs::read(path)?;
        debug!(path = %path.display(), %base, size = data.len(), "loaded raw image");
        self.add_region(base, data, Some(path.display().to_string()))
    }

    /// All regions, sorted by start address
    pub fn regions(&self) -> &[ImageRegion]
    {
        &self.regions
    }

    fn region_for(&self, address: Address) -> Option<&ImageRegion>
    {
        let index = self.regions.partition_point(|region| region.start <= address);
        index.checked_sub(1).map(|i| &self.regions[i]).filter(|region| region.contains(address))
    }

    /// Copy `buf.len()` bytes starting at `address`, crossing adjacent regions
    fn copy_into(&self, address: Address, buf: &mut [u8]) -> bool
    {
        let mut filled = 0usize;
        while filled < buf.len() {
            let cursor = address + filled as u64;
            let Some(region) = self.region_for(cursor) else {
                return false;
            };
            let Some(start) = cursor.offset_from(region.start) else {
                return false;
            };
            let start = start as usize;
            let count = (region.data.len() - start).min(buf.len() - filled);
            buf[filled..filled + count].copy_from_slice(&region.data[start..start + count]);
            filled += count;
        }
        true
    }
}

/// A [`MemoryReader`] over two snapshots
///
/// ## Example
///
/// ```rust
/// use memdiff_core::memory::{MemoryReader, SnapshotImage, SnapshotPair};
/// use memdiff_core::types::{Address, Image};
///
/// let base = Address::new(0xffff_8880_0000_0000);
/// let primary = SnapshotImage::new().with_region(base, vec![1u8, 2, 3, 4])?;
/// let secondary = SnapshotImage::new().with_region(base, vec![1u8, 2, 3, 5])?;
/// let pair = SnapshotPair::new(primary, secondary);
///
/// assert_eq!(pair.read_bytes(base, Image::Secondary, 4)?, vec![1, 2, 3, 5]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotPair
{
    images: [SnapshotImage; 2],
    userspace_limit: Address,
}

impl SnapshotPair
{
    /// Pair two images using the default user space limit
    pub fn new(primary: SnapshotImage, secondary: SnapshotImage) -> Self
    {
        Self {
            images: [primary, secondary],
            userspace_limit: DEFAULT_USERSPACE_LIMIT,
        }
    }

    /// Change the user space limit; `Address::NULL` disables the check
    #[must_use]
    pub fn with_userspace_limit(mut self, limit: Address) -> Self
    {
        self.userspace_limit = limit;
        self
    }

    /// Current user space limit
    pub fn userspace_limit(&self) -> Address
    {
        self.userspace_limit
    }

    /// The snapshot backing `image`
    pub fn image(&self, image: Image) -> &SnapshotImage
    {
        &self.images[image.index()]
    }
}

impl MemoryReader for SnapshotPair
{
    fn read(&self, address: Address, image: Image, buf: &mut [u8]) -> Result<(), MemoryFault>
    {
        if buf.is_empty() {
            return Ok(());
        }
        if address.is_null() {
            return Err(MemoryFault::NullPointer { image });
        }
        if address < self.userspace_limit {
            return Err(MemoryFault::UserspaceAddress { address, image });
        }
        let in_range = address.checked_add(buf.len() as u64 - 1).is_some();
        if !in_range || !self.images[image.index()].copy_into(address, buf) {
            return Err(MemoryFault::Unmapped {
                address,
                image,
                len: buf.len(),
            });
        }
        Ok(())
    }
}
