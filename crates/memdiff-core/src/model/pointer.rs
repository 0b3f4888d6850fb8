//! Pointer types.

use super::{Model, Scheduler, TypeId};
use crate::error::{MemdiffError, MemdiffResult, MemoryFault};
use crate::memory::POINTER_SIZE;
use crate::types::{Address, Image, SymPath, Value};

/// A pointer to `pointee`, or to nothing (`void *`) when `pointee` is `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerType
{
    name: String,
    pointee: Option<TypeId>,
}

impl PointerType
{
    pub fn new(name: impl Into<String>, pointee: Option<TypeId>) -> Self
    {
        Self {
            name: name.into(),
            pointee,
        }
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    pub fn pointee(&self) -> Option<TypeId>
    {
        self.pointee
    }

    pub fn size(&self) -> u64
    {
        POINTER_SIZE
    }

    /// Read the stored pointer, null included
    ///
    /// ## Errors
    ///
    /// Propagates memory faults from reading the pointer itself.
    pub fn target(&self, model: &Model, address: Address, image: Image) -> MemdiffResult<Address>
    {
        Ok(model.memory().resolve_pointer(address, image)?)
    }

    /// Read the stored pointer, treating null as a fault
    ///
    /// ## Errors
    ///
    /// Returns a `NullPointer` fault when the stored value is zero.
    pub fn dereference(&self, model: &Model, address: Address, image: Image) -> MemdiffResult<Address>
    {
        let target = self.target(model, address, image)?;
        if target.is_null() {
            return Err(MemoryFault::NullPointer { image }.into());
        }
        Ok(target)
    }

    /// The pointee type, or an error for `void *`
    pub(crate) fn require_pointee(&self) -> MemdiffResult<TypeId>
    {
        self.pointee
            .ok_or_else(|| MemdiffError::Incomplete(format!("{} has no pointee type", self.name)))
    }

    pub(crate) fn decode(&self, model: &Model, address: Address, image: Image) -> MemdiffResult<Value>
    {
        let target = self.target(model, address, image)?;
        Ok(if target.is_null() { Value::Null } else { Value::Pointer(target) })
    }

    /// Both null is equal, one null differs; otherwise the pointees are
    /// scheduled for comparison and the raw values decide the result.
    pub(crate) fn memcmp(
        &self,
        model: &Model,
        address0: Address,
        address1: Address,
        scheduler: &dyn Scheduler,
        path: &SymPath,
    ) -> MemdiffResult<bool>
    {
        let target0 = self.target(model, address0, Image::Primary)?;
        let target1 = self.target(model, address1, Image::Secondary)?;
        match (target0.is_null(), target1.is_null()) {
            (true, true) => Ok(true),
            (true, false) | (false, true) => Ok(false),
            (false, false) => {
                if let Some(pointee) = self.pointee {
                    scheduler.enqueue_diff(path.deref(), pointee, target0, target1);
                }
                Ok(target0 == target1)
            }
        }
    }

    /// Schedule the pointee for reverse mapping
    ///
    /// `skip_null` distinguishes embedded pointers, where null is routine,
    /// from pointer tasks, where it is a fault.
    pub(crate) fn revmap(
        &self,
        model: &Model,
        address: Address,
        scheduler: &dyn Scheduler,
        path: &SymPath,
        skip_null: bool,
    ) -> MemdiffResult<()>
    {
        let Some(pointee) = self.pointee else {
            return Ok(());
        };
        let target = self.target(model, address, Image::Primary)?;
        if target.is_null() {
            if skip_null {
                return Ok(());
            }
            return Err(MemoryFault::NullPointer { image: Image::Primary }.into());
        }
        let extent = model.extent(pointee, target)?;
        scheduler.enqueue_rev(path.deref(), pointee, target, extent);
        Ok(())
    }
}
