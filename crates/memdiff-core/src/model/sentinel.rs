//! Sentinel-terminated arrays.
//!
//! The logical length of these arrays is only known at runtime: elements are
//! read at increasing offsets until a terminator shows up. A size query on
//! the type alone is therefore meaningless and fails with `DynamicSize`.

use super::descriptor::Descriptor;
use super::{Model, Place, Scheduler, TypeId, TypeRegistry};
use crate::error::{MemdiffError, MemdiffResult};
use crate::types::{Address, Image, SymPath, Value};

/// What ends the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator
{
    /// A null pointer element (pointer arrays)
    NullPointer,
    /// A zero element (scalar arrays)
    Zero,
}

/// An array whose end is marked by a null pointer or a zero scalar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelArray
{
    name: String,
    source: TypeId,
    base: TypeId,
    terminator: Terminator,
}

impl SentinelArray
{
    /// Build over the array entry `source`
    ///
    /// ## Errors
    ///
    /// Returns `InvalidSpecialization` unless `source` is an array whose
    /// elements are pointers or scalars.
    pub fn over(registry: &TypeRegistry, source: TypeId) -> MemdiffResult<Self>
    {
        let descriptor = registry.get(source)?;
        let Descriptor::Array(array) = &*descriptor else {
            return Err(MemdiffError::InvalidSpecialization(format!(
                "sentinel array over {}: not an array",
                descriptor.name()
            )));
        };
        let terminator = match &*registry.get(array.base())? {
            Descriptor::Pointer(_) => Terminator::NullPointer,
            Descriptor::Basic(_) => Terminator::Zero,
            other => {
                return Err(MemdiffError::InvalidSpecialization(format!(
                    "sentinel array over {}: {} elements have no terminator",
                    descriptor.name(),
                    other.name()
                )));
            }
        };
        Ok(Self {
            name: descriptor.name().to_string(),
            source,
            base: array.base(),
            terminator,
        })
    }

    /// Replace the source array entry with this descriptor
    ///
    /// ## Errors
    ///
    /// Returns `InvalidSpecialization` if the source entry is no longer an array.
    pub fn takeover(self, registry: &TypeRegistry) -> MemdiffResult<TypeId>
    {
        let source = self.source;
        registry.replace_checked(
            source,
            |existing| match existing {
                Descriptor::Array(_) => Ok(()),
                other => Err(MemdiffError::InvalidSpecialization(format!(
                    "{source} is now {}, cannot take it over as a sentinel array",
                    other.name()
                ))),
            },
            Descriptor::SentinelArray(self),
        )?;
        Ok(source)
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    pub fn base(&self) -> TypeId
    {
        self.base
    }

    pub fn terminator(&self) -> Terminator
    {
        self.terminator
    }

    /// Lazily yield the elements at `address` in `image`
    ///
    /// Every call starts over from index 0. The terminating element itself is
    /// not yielded. A fault while checking an element is yielded once as an
    /// error, after which the iterator is exhausted.
    ///
    /// ## Errors
    ///
    /// Fails up front if the element type has no static size.
    pub fn iter<'m>(&'m self, model: &'m Model, address: Address, image: Image) -> MemdiffResult<SentinelElements<'m>>
    {
        let stride = model.registry().size_of(self.base)?;
        Ok(SentinelElements {
            array: self,
            model,
            address,
            image,
            stride,
            index: 0,
            done: false,
        })
    }

    /// Number of elements before the terminator
    ///
    /// ## Errors
    ///
    /// Propagates faults hit while scanning.
    pub fn runtime_len(&self, model: &Model, address: Address, image: Image) -> MemdiffResult<u64>
    {
        let mut count = 0;
        for element in self.iter(model, address, image)? {
            element?;
            count += 1;
        }
        Ok(count)
    }

    /// Bytes covered at `address` in image 0, terminator included
    pub(crate) fn extent(&self, model: &Model, address: Address) -> MemdiffResult<u64>
    {
        let stride = model.registry().size_of(self.base)?;
        Ok((self.runtime_len(model, address, Image::Primary)? + 1) * stride)
    }

    pub(crate) fn element(&self, registry: &TypeRegistry, index: u64, address: Address) -> MemdiffResult<Place>
    {
        Ok(Place::new(self.base, address + index * registry.size_of(self.base)?))
    }

    pub(crate) fn elements(&self, model: &Model, address: Address, image: Image) -> MemdiffResult<Vec<Place>>
    {
        self.iter(model, address, image)?.collect()
    }

    pub(crate) fn decode(&self, model: &Model, address: Address, image: Image, depth: usize) -> MemdiffResult<Value>
    {
        if depth == 0 {
            return Ok(Value::Truncated);
        }
        let mut values = Vec::new();
        for place in self.iter(model, address, image)? {
            let place = place?;
            values.push(model.decode_at(place.ty, place.address, image, depth - 1)?);
        }
        Ok(Value::Array(values))
    }

    /// Pairs elements by index; differing runtime lengths are a difference
    pub(crate) fn memcmp(
        &self,
        model: &Model,
        address0: Address,
        address1: Address,
        scheduler: &dyn Scheduler,
        path: &SymPath,
    ) -> MemdiffResult<bool>
    {
        let left = self.elements(model, address0, Image::Primary)?;
        let right = self.elements(model, address1, Image::Secondary)?;
        for (index, (place0, place1)) in left.iter().zip(&right).enumerate() {
            scheduler.enqueue_diff(path.index(index as u64), self.base, place0.address, place1.address);
        }
        Ok(left.len() == right.len())
    }

    pub(crate) fn revmap(&self, model: &Model, address: Address, scheduler: &dyn Scheduler, path: &SymPath) -> MemdiffResult<()>
    {
        for (index, place) in self.elements(model, address, Image::Primary)?.into_iter().enumerate() {
            model.revmap_embedded(place.ty, place.address, scheduler, &path.index(index as u64))?;
        }
        Ok(())
    }

    fn is_terminator(&self, model: &Model, address: Address, image: Image) -> MemdiffResult<bool>
    {
        match self.terminator {
            Terminator::NullPointer => Ok(model.memory().resolve_pointer(address, image)?.is_null()),
            Terminator::Zero => match &*model.registry().get(self.base)? {
                Descriptor::Basic(basic) => basic.is_zero_at(model, address, image),
                other => Err(MemdiffError::InvalidSpecialization(format!(
                    "sentinel element {} is not a scalar",
                    other.name()
                ))),
            },
        }
    }
}

/// Iterator returned by [`SentinelArray::iter`]
pub struct SentinelElements<'m>
{
    array: &'m SentinelArray,
    model: &'m Model,
    address: Address,
    image: Image,
    stride: u64,
    index: u64,
    done: bool,
}

impl Iterator for SentinelElements<'_>
{
    type Item = MemdiffResult<Place>;

    fn next(&mut self) -> Option<Self::Item>
    {
        if self.done {
            return None;
        }
        let address = self.address + self.index * self.stride;
        match self.array.is_terminator(self.model, address, self.image) {
            Ok(false) => {
                self.index += 1;
                Some(Ok(Place::new(self.array.base, address)))
            }
            Ok(true) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
