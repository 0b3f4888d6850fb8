//! Closed set of descriptor variants and their dispatch.
//!
//! Every capability a registry entry offers (size, navigation, decoding,
//! comparison, reverse mapping) is a `match` over [`Descriptor`]; adding a
//! variant is a compile error everywhere it needs handling.

use super::array::ArrayType;
use super::basic::{BasicType, Interpretation};
use super::list::{IntrusiveListField, LIST_HEAD_SIZE};
use super::pointer::PointerType;
use super::sentinel::SentinelArray;
use super::string::StringType;
use super::structure::{Member, StructType};
use super::{Model, Place, Scheduler, TypeId, TypeRegistry};
use crate::error::{MemdiffError, MemdiffResult};
use crate::types::{Address, Image, SymPath, Value};

/// A registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor
{
    /// Declared struct whose layout is not known yet
    Forward(String),
    Basic(BasicType),
    Pointer(PointerType),
    Array(ArrayType),
    Struct(StructType),
    Member(Member),
    String(StringType),
    SentinelArray(SentinelArray),
    ListField(IntrusiveListField),
}

impl Descriptor
{
    /// Display name
    pub fn name(&self) -> &str
    {
        match self {
            Descriptor::Forward(name) => name,
            Descriptor::Basic(basic) => basic.name(),
            Descriptor::Pointer(pointer) => pointer.name(),
            Descriptor::Array(array) => array.name(),
            Descriptor::Struct(structure) => structure.name(),
            Descriptor::Member(member) => member.name(),
            Descriptor::String(string) => string.name(),
            Descriptor::SentinelArray(array) => array.name(),
            Descriptor::ListField(field) => field.name(),
        }
    }

    /// `(member name, offset)` for entries that occupy a struct slot
    pub fn member_slot(&self) -> Option<(&str, u64)>
    {
        match self {
            Descriptor::Member(member) => Some((member.name(), member.offset())),
            Descriptor::ListField(field) => Some((field.member(), field.offset())),
            _ => None,
        }
    }

    /// Static size in bytes
    ///
    /// ## Errors
    ///
    /// - `Incomplete` for forward declarations
    /// - `DynamicSize` for sentinel-terminated arrays
    /// - `Unbounded` for arrays without a bound
    pub fn size(&self, registry: &TypeRegistry) -> MemdiffResult<u64>
    {
        match self {
            Descriptor::Forward(name) => Err(MemdiffError::Incomplete(name.clone())),
            Descriptor::Basic(basic) => Ok(basic.size()),
            Descriptor::Pointer(pointer) => Ok(pointer.size()),
            Descriptor::Array(array) => array.size(registry),
            Descriptor::Struct(structure) => Ok(structure.size()),
            Descriptor::Member(member) => registry.size_of(member.ty()),
            Descriptor::String(string) => string.size(registry),
            Descriptor::SentinelArray(array) => Err(MemdiffError::DynamicSize(array.name().to_string())),
            Descriptor::ListField(_) => Ok(LIST_HEAD_SIZE),
        }
    }

    /// Member `name` of the struct at `address`
    pub(crate) fn member(&self, registry: &TypeRegistry, name: &str, address: Address) -> MemdiffResult<Place>
    {
        match self {
            Descriptor::Struct(structure) => structure.member(registry, name, address),
            Descriptor::Member(member) => registry.get(member.ty())?.member(registry, name, address),
            Descriptor::Forward(ty) => Err(MemdiffError::Incomplete(ty.clone())),
            other => Err(MemdiffError::UnknownMember {
                ty: other.name().to_string(),
                member: name.to_string(),
            }),
        }
    }

    /// Element `index` of the array at `address`
    pub(crate) fn element(&self, registry: &TypeRegistry, index: u64, address: Address) -> MemdiffResult<Place>
    {
        match self {
            Descriptor::Array(array) => array.element(registry, index, address),
            Descriptor::String(string) => string.element(registry, index, address),
            Descriptor::SentinelArray(array) => array.element(registry, index, address),
            Descriptor::Member(member) => registry.get(member.ty())?.element(registry, index, address),
            other => Err(MemdiffError::NotIterable(other.name().to_string())),
        }
    }

    /// Pointee of the pointer at `address`
    pub(crate) fn dereference(&self, model: &Model, address: Address, image: Image) -> MemdiffResult<Place>
    {
        match self {
            Descriptor::Pointer(pointer) => {
                let pointee = pointer.require_pointee()?;
                Ok(Place::new(pointee, pointer.dereference(model, address, image)?))
            }
            Descriptor::Member(member) => model.descriptor(member.ty())?.dereference(model, address, image),
            other => Err(MemdiffError::InvalidSpecialization(format!(
                "{} is not a pointer",
                other.name()
            ))),
        }
    }

    /// Sub-objects in order: array elements or struct members
    pub(crate) fn elements(&self, model: &Model, address: Address, image: Image) -> MemdiffResult<Vec<Place>>
    {
        match self {
            Descriptor::Array(array) => array.elements(model.registry(), address),
            Descriptor::SentinelArray(array) => array.elements(model, address, image),
            Descriptor::Struct(structure) => Ok(structure
                .slots(model.registry(), address)?
                .into_iter()
                .map(|(_, place)| place)
                .collect()),
            Descriptor::Member(member) => model.descriptor(member.ty())?.elements(model, address, image),
            other => Err(MemdiffError::NotIterable(other.name().to_string())),
        }
    }

    /// Decoded value, `depth` levels deep
    pub(crate) fn decode(&self, model: &Model, address: Address, image: Image, depth: usize) -> MemdiffResult<Value>
    {
        match self {
            Descriptor::Forward(name) => Err(MemdiffError::Incomplete(name.clone())),
            Descriptor::Basic(basic) => basic.decode(model, address, image, Interpretation::Numeric),
            Descriptor::Pointer(pointer) => pointer.decode(model, address, image),
            Descriptor::Array(array) => array.decode(model, address, image, depth),
            Descriptor::Struct(structure) => structure.decode(model, address, image, depth),
            Descriptor::Member(member) => model.decode_at(member.ty(), address, image, depth),
            Descriptor::String(string) => Ok(Value::Text(string.decode(model, address, image)?)),
            Descriptor::SentinelArray(array) => array.decode(model, address, image, depth),
            Descriptor::ListField(field) => field.decode(model, address, image, depth),
        }
    }

    /// Compare `address0` in image 0 against `address1` in image 1
    ///
    /// Returns `false` when a difference is found at this level. Sub-objects
    /// are not compared here; they are scheduled on `scheduler`.
    pub(crate) fn memcmp(
        &self,
        model: &Model,
        address0: Address,
        address1: Address,
        scheduler: &dyn Scheduler,
        path: &SymPath,
    ) -> MemdiffResult<bool>
    {
        match self {
            Descriptor::Forward(name) => Err(MemdiffError::Incomplete(name.clone())),
            Descriptor::Basic(basic) => basic.memcmp(model, address0, address1),
            Descriptor::Pointer(pointer) => pointer.memcmp(model, address0, address1, scheduler, path),
            Descriptor::Array(array) => array.memcmp(model, address0, address1, scheduler, path),
            Descriptor::Struct(structure) => structure.memcmp(model, address0, address1, scheduler, path),
            Descriptor::Member(member) => model.memcmp(member.ty(), address0, address1, scheduler, path),
            Descriptor::String(string) => string.memcmp(model, address0, address1),
            Descriptor::SentinelArray(array) => array.memcmp(model, address0, address1, scheduler, path),
            Descriptor::ListField(field) => field.memcmp(model, address0, address1, scheduler, path),
        }
    }

    /// Index the object at `address` (image 0)
    ///
    /// The object itself was recorded when its task was enqueued; this
    /// records or schedules what it refers to.
    pub(crate) fn revmap(
        &self,
        id: TypeId,
        model: &Model,
        address: Address,
        scheduler: &dyn Scheduler,
        path: &SymPath,
    ) -> MemdiffResult<()>
    {
        match self {
            Descriptor::Forward(name) => Err(MemdiffError::Incomplete(name.clone())),
            Descriptor::Basic(_) => Ok(()),
            Descriptor::Pointer(pointer) => pointer.revmap(model, address, scheduler, path, false),
            Descriptor::Array(array) => array.revmap(model, address, scheduler, path),
            Descriptor::Struct(structure) => structure.revmap(model, address, scheduler, path),
            Descriptor::Member(member) => model.revmap(member.ty(), address, scheduler, path),
            Descriptor::String(string) => string.revmap(id, model, address, scheduler, path),
            Descriptor::SentinelArray(array) => array.revmap(model, address, scheduler, path),
            Descriptor::ListField(field) => {
                field.revmap(id, address, scheduler, path);
                Ok(())
            }
        }
    }

    /// Bytes the object at `address` covers in image 0
    ///
    /// Static size where there is one; sentinel arrays are measured, and an
    /// array without a bound covers a single element.
    pub(crate) fn extent(&self, model: &Model, address: Address) -> MemdiffResult<u64>
    {
        match self {
            Descriptor::SentinelArray(array) => array.extent(model, address),
            Descriptor::Array(array) if array.bound().is_none() => model.registry().size_of(array.base()),
            Descriptor::Member(member) => model.extent(member.ty(), address),
            other => other.size(model.registry()),
        }
    }
}
