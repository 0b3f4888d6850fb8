//! Structs and their members.

use super::{Model, Place, Scheduler, TypeId, TypeRegistry};
use crate::error::{MemdiffError, MemdiffResult};
use crate::types::{Address, Image, SymPath, Value};

/// A named field of a struct
///
/// Members are registry entries of their own so that a specialised
/// descriptor (an intrusive list field) can take over one particular field
/// without touching the field's type, which other structs share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member
{
    name: String,
    offset: u64,
    ty: TypeId,
}

impl Member
{
    pub fn new(name: &str, offset: u64, ty: TypeId) -> Self
    {
        Self {
            name: name.to_string(),
            offset,
            ty,
        }
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Byte offset inside the owning struct
    pub fn offset(&self) -> u64
    {
        self.offset
    }

    /// Type of the field
    pub fn ty(&self) -> TypeId
    {
        self.ty
    }
}

/// A struct with an ordered list of member entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType
{
    name: String,
    size: u64,
    members: Vec<TypeId>,
}

impl StructType
{
    pub fn new(name: &str, size: u64, members: Vec<TypeId>) -> Self
    {
        Self {
            name: name.to_string(),
            size,
            members,
        }
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    pub fn size(&self) -> u64
    {
        self.size
    }

    /// Member entry ids in declaration order
    pub fn members(&self) -> &[TypeId]
    {
        &self.members
    }

    /// Id of the member entry called `name`
    ///
    /// ## Errors
    ///
    /// Returns `UnknownMember` if there is no such member.
    pub fn member_id(&self, registry: &TypeRegistry, name: &str) -> MemdiffResult<TypeId>
    {
        for id in &self.members {
            if registry.get(*id)?.member_slot().is_some_and(|(member, _)| member == name) {
                return Ok(*id);
            }
        }
        Err(MemdiffError::UnknownMember {
            ty: self.name.clone(),
            member: name.to_string(),
        })
    }

    /// `(member, address + member.offset)`
    ///
    /// ## Errors
    ///
    /// Returns `UnknownMember` if there is no such member.
    pub fn member(&self, registry: &TypeRegistry, name: &str, address: Address) -> MemdiffResult<Place>
    {
        let id = self.member_id(registry, name)?;
        let offset = registry.get(id)?.member_slot().map_or(0, |(_, offset)| offset);
        Ok(Place::new(id, address + offset))
    }

    /// Every member as `(name, place)`, in declaration order
    pub(crate) fn slots(&self, registry: &TypeRegistry, address: Address) -> MemdiffResult<Vec<(String, Place)>>
    {
        let mut slots = Vec::with_capacity(self.members.len());
        for id in &self.members {
            let descriptor = registry.get(*id)?;
            if let Some((name, offset)) = descriptor.member_slot() {
                slots.push((name.to_string(), Place::new(*id, address + offset)));
            }
        }
        Ok(slots)
    }

    pub(crate) fn decode(&self, model: &Model, address: Address, image: Image, depth: usize) -> MemdiffResult<Value>
    {
        if depth == 0 {
            return Ok(Value::Truncated);
        }
        let mut fields = Vec::with_capacity(self.members.len());
        for (name, place) in self.slots(model.registry(), address)? {
            fields.push((name, model.decode_at(place.ty, place.address, image, depth - 1)?));
        }
        Ok(Value::Struct(fields))
    }

    /// Schedules one diff task per member under `<path>.<member>`
    pub(crate) fn memcmp(
        &self,
        model: &Model,
        address0: Address,
        address1: Address,
        scheduler: &dyn Scheduler,
        path: &SymPath,
    ) -> MemdiffResult<bool>
    {
        for id in &self.members {
            let descriptor = model.registry().get(*id)?;
            if let Some((name, offset)) = descriptor.member_slot() {
                scheduler.enqueue_diff(path.member(name), *id, address0 + offset, address1 + offset);
            }
        }
        Ok(true)
    }

    /// Walks members inline: pointers are followed, aggregates descended
    pub(crate) fn revmap(&self, model: &Model, address: Address, scheduler: &dyn Scheduler, path: &SymPath) -> MemdiffResult<()>
    {
        for (name, place) in self.slots(model.registry(), address)? {
            model.revmap_embedded(place.ty, place.address, scheduler, &path.member(&name))?;
        }
        Ok(())
    }
}
