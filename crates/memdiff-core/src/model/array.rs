//! Fixed-layout arrays.

use super::{Model, Place, Scheduler, TypeId, TypeRegistry};
use crate::error::{MemdiffError, MemdiffResult};
use crate::types::{Address, Image, SymPath, Value};

/// An array of `base` with an optional static bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType
{
    name: String,
    base: TypeId,
    bound: Option<u64>,
}

impl ArrayType
{
    pub fn new(name: impl Into<String>, base: TypeId, bound: Option<u64>) -> Self
    {
        Self {
            name: name.into(),
            base,
            bound,
        }
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    pub fn base(&self) -> TypeId
    {
        self.base
    }

    pub fn bound(&self) -> Option<u64>
    {
        self.bound
    }

    /// `(base, address + index * size(base))`; the bound is not checked
    ///
    /// ## Errors
    ///
    /// Fails if the element type has no static size.
    pub fn element(&self, registry: &TypeRegistry, index: u64, address: Address) -> MemdiffResult<Place>
    {
        let stride = registry.size_of(self.base)?;
        Ok(Place::new(self.base, address + index * stride))
    }

    pub(crate) fn size(&self, registry: &TypeRegistry) -> MemdiffResult<u64>
    {
        let bound = self.bound.ok_or_else(|| MemdiffError::Unbounded(self.name.clone()))?;
        Ok(bound * registry.size_of(self.base)?)
    }

    pub(crate) fn elements(&self, registry: &TypeRegistry, address: Address) -> MemdiffResult<Vec<Place>>
    {
        let bound = self.bound.ok_or_else(|| MemdiffError::Unbounded(self.name.clone()))?;
        (0..bound).map(|index| self.element(registry, index, address)).collect()
    }

    pub(crate) fn decode(&self, model: &Model, address: Address, image: Image, depth: usize) -> MemdiffResult<Value>
    {
        if depth == 0 || self.bound.is_none() {
            return Ok(Value::Truncated);
        }
        let mut values = Vec::new();
        for place in self.elements(model.registry(), address)? {
            values.push(model.decode_at(place.ty, place.address, image, depth - 1)?);
        }
        Ok(Value::Array(values))
    }

    /// Schedules every element; arrays without a bound compare nothing
    pub(crate) fn memcmp(
        &self,
        model: &Model,
        address0: Address,
        address1: Address,
        scheduler: &dyn Scheduler,
        path: &SymPath,
    ) -> MemdiffResult<bool>
    {
        let Some(bound) = self.bound else {
            return Ok(true);
        };
        let stride = model.registry().size_of(self.base)?;
        for index in 0..bound {
            let offset = index * stride;
            scheduler.enqueue_diff(path.index(index), self.base, address0 + offset, address1 + offset);
        }
        Ok(true)
    }

    pub(crate) fn revmap(&self, model: &Model, address: Address, scheduler: &dyn Scheduler, path: &SymPath) -> MemdiffResult<()>
    {
        let Some(bound) = self.bound else {
            return Ok(());
        };
        let stride = model.registry().size_of(self.base)?;
        for index in 0..bound {
            model.revmap_embedded(self.base, address + index * stride, scheduler, &path.index(index))?;
        }
        Ok(())
    }
}
