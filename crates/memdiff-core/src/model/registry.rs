//! # Type Registry
//!
//! Arena of type descriptors addressed by [`TypeId`].
//!
//! Descriptors refer to each other only by id, so self-referential graphs
//! (a struct holding a pointer to its own type) need no special ownership
//! handling. The registry is shared by every worker thread; lookups clone an
//! `Arc` and release the lock immediately, so descriptor methods can recurse
//! back into the registry freely.
//!
//! Loading is two-phase: generic descriptors (basic types, pointers, arrays,
//! structs and their members) are registered first, then specialised
//! descriptors are spliced over existing entries with `takeover`, after
//! which every holder of the old id observes the specialised behaviour.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use super::array::ArrayType;
use super::basic::{BasicType, Encoding};
use super::descriptor::Descriptor;
use super::pointer::PointerType;
use super::structure::{Member, StructType};
use crate::error::{MemdiffError, MemdiffResult};

/// Handle of a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(u32);

impl TypeId
{
    /// Position of the entry in the registry
    pub const fn index(self) -> usize
    {
        self.0 as usize
    }
}

impl fmt::Display for TypeId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "#{}", self.0)
    }
}

/// Shared, mutable mapping from [`TypeId`] to descriptor
#[derive(Debug, Default)]
pub struct TypeRegistry
{
    entries: RwLock<Vec<Arc<Descriptor>>>,
}

impl TypeRegistry
{
    /// Create an empty registry
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Add a descriptor and return its id
    pub fn register(&self, descriptor: Descriptor) -> TypeId
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let id = TypeId(u32::try_from(entries.len()).unwrap_or(u32::MAX));
        trace!(%id, name = descriptor.name(), "registered type");
        entries.push(Arc::new(descriptor));
        id
    }

    /// Look up a descriptor
    ///
    /// ## Errors
    ///
    /// Returns `UnknownType` if `id` was not issued by this registry.
    pub fn get(&self, id: TypeId) -> MemdiffResult<Arc<Descriptor>>
    {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id.index())
            .cloned()
            .ok_or(MemdiffError::UnknownType(id))
    }

    /// Number of entries
    pub fn len(&self) -> usize
    {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }

    /// Display name of an entry
    ///
    /// ## Errors
    ///
    /// Returns `UnknownType` for ids not issued by this registry.
    pub fn name_of(&self, id: TypeId) -> MemdiffResult<String>
    {
        Ok(self.get(id)?.name().to_string())
    }

    /// Static size of an entry in bytes
    ///
    /// ## Errors
    ///
    /// - `DynamicSize` for sentinel-terminated arrays
    /// - `Unbounded` for arrays without a static bound
    /// - `Incomplete` for forward declarations that were never defined
    pub fn size_of(&self, id: TypeId) -> MemdiffResult<u64>
    {
        self.get(id)?.size(self)
    }

    /// First non-member entry with the given name
    pub fn find(&self, name: &str) -> Option<TypeId>
    {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .position(|entry| entry.name() == name && entry.member_slot().is_none())
            .map(|index| TypeId(index as u32))
    }

    /// Register a scalar type
    ///
    /// ## Errors
    ///
    /// Returns `InvalidSpecialization` for widths other than 1, 2, 4 or 8
    /// bytes, or floats that are not 4 or 8 bytes wide.
    pub fn register_basic(&self, name: &str, size: u64, encoding: Encoding) -> MemdiffResult<TypeId>
    {
        Ok(self.register(Descriptor::Basic(BasicType::new(name, size, encoding)?)))
    }

    /// Register a pointer; `None` registers `void *`
    ///
    /// ## Errors
    ///
    /// Returns `UnknownType` if `pointee` is not registered.
    pub fn register_pointer(&self, pointee: Option<TypeId>) -> MemdiffResult<TypeId>
    {
        let name = match pointee {
            Some(id) => format!("{} *", self.name_of(id)?),
            None => "void *".to_string(),
        };
        Ok(self.register(Descriptor::Pointer(PointerType::new(name, pointee))))
    }

    /// Register an array of `base`; `None` means no static bound
    ///
    /// ## Errors
    ///
    /// Returns `UnknownType` if `base` is not registered.
    pub fn register_array(&self, base: TypeId, bound: Option<u64>) -> MemdiffResult<TypeId>
    {
        let base_name = self.name_of(base)?;
        let name = match bound {
            Some(bound) => format!("{base_name}[{bound}]"),
            None => format!("{base_name}[]"),
        };
        Ok(self.register(Descriptor::Array(ArrayType::new(name, base, bound))))
    }

    /// Register a struct together with one `Member` entry per field
    ///
    /// Fields are `(name, offset, type)`.
    ///
    /// ## Errors
    ///
    /// Returns `UnknownType` if a field type is not registered.
    pub fn register_struct(&self, name: &str, size: u64, fields: &[(&str, u64, TypeId)]) -> MemdiffResult<TypeId>
    {
        let members = self.register_members(fields)?;
        Ok(self.register(Descriptor::Struct(StructType::new(name, size, members))))
    }

    /// Reserve an id for a struct that will be defined later
    ///
    /// This is how cyclic graphs are built: declare the struct, register
    /// pointers to it, then [`define_struct`](Self::define_struct).
    pub fn declare(&self, name: &str) -> TypeId
    {
        self.register(Descriptor::Forward(name.to_string()))
    }

    /// Fill in a declared struct
    ///
    /// ## Errors
    ///
    /// Returns `InvalidSpecialization` if `id` is not a pending declaration,
    /// and `UnknownType` if a field type is not registered.
    pub fn define_struct(&self, id: TypeId, size: u64, fields: &[(&str, u64, TypeId)]) -> MemdiffResult<()>
    {
        let name = match &*self.get(id)? {
            Descriptor::Forward(name) => name.clone(),
            other => {
                return Err(MemdiffError::InvalidSpecialization(format!(
                    "{id} ({}) is already defined",
                    other.name()
                )));
            }
        };
        let members = self.register_members(fields)?;
        self.replace_checked(
            id,
            |existing| match existing {
                Descriptor::Forward(_) => Ok(()),
                other => Err(MemdiffError::InvalidSpecialization(format!(
                    "{id} ({}) is already defined",
                    other.name()
                ))),
            },
            Descriptor::Struct(StructType::new(&name, size, members)),
        )
    }

    /// Id of the member entry `name` of struct `id`
    ///
    /// ## Errors
    ///
    /// Returns `UnknownMember` if the struct has no such member, and
    /// `InvalidSpecialization` if `id` is not a struct.
    pub fn member_of(&self, id: TypeId, name: &str) -> MemdiffResult<TypeId>
    {
        match &*self.get(id)? {
            Descriptor::Struct(structure) => structure.member_id(self, name),
            Descriptor::Forward(name) => Err(MemdiffError::Incomplete(name.clone())),
            other => Err(MemdiffError::InvalidSpecialization(format!("{} is not a struct", other.name()))),
        }
    }

    /// Replace entry `id` if `check` accepts the current descriptor
    ///
    /// The check and the swap happen under one write lock, so a rejected
    /// replacement leaves the registry untouched.
    pub(crate) fn replace_checked<F>(&self, id: TypeId, check: F, replacement: Descriptor) -> MemdiffResult<()>
    where
        F: FnOnce(&Descriptor) -> MemdiffResult<()>,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let slot = entries.get_mut(id.index()).ok_or(MemdiffError::UnknownType(id))?;
        check(slot)?;
        trace!(%id, from = slot.name(), to = replacement.name(), "replaced type");
        *slot = Arc::new(replacement);
        Ok(())
    }

    fn register_members(&self, fields: &[(&str, u64, TypeId)]) -> MemdiffResult<Vec<TypeId>>
    {
        for (_, _, ty) in fields {
            self.get(*ty)?;
        }
        Ok(fields
            .iter()
            .map(|(name, offset, ty)| self.register(Descriptor::Member(Member::new(name, *offset, *ty))))
            .collect())
    }
}
