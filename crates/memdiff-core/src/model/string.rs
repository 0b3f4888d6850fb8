//! Null-terminated strings.
//!
//! A [`StringType`] is built over an existing `char[N]` or `char *` entry and
//! keeps its layout, but decodes to text instead of a sequence of numbers.
//! Until [`StringType::takeover`] is called it is a free-standing value that
//! no registry entry refers to.

use super::basic::BasicType;
use super::descriptor::Descriptor;
use super::{Model, Place, Scheduler, TypeId, TypeRegistry};
use crate::error::{MemdiffError, MemdiffResult, MemoryFault};
use crate::memory::POINTER_SIZE;
use crate::types::{Address, Image, SymPath};

/// Text stored inline (`char[N]`) or behind a pointer (`char *`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringType
{
    name: String,
    source: TypeId,
    base: TypeId,
    bound: Option<u64>,
    indirect: bool,
}

impl StringType
{
    /// Build a string over the array or pointer entry `source`
    ///
    /// ## Example
    ///
    /// ```rust
    /// use memdiff_core::model::{Encoding, StringType, TypeRegistry};
    ///
    /// let registry = TypeRegistry::new();
    /// let chr = registry.register_basic("char", 1, Encoding::Signed)?;
    /// let comm = registry.register_array(chr, Some(16))?;
    ///
    /// let string = StringType::over(&registry, comm)?;
    /// assert_eq!(string.bound(), Some(16));
    /// string.takeover(&registry)?;
    /// # Ok::<(), memdiff_core::error::MemdiffError>(())
    /// ```
    ///
    /// ## Errors
    ///
    /// Returns `InvalidSpecialization` unless `source` is an array of, or a
    /// pointer to, a character-sized integer.
    pub fn over(registry: &TypeRegistry, source: TypeId) -> MemdiffResult<Self>
    {
        let descriptor = registry.get(source)?;
        let (base, bound, indirect) = match &*descriptor {
            Descriptor::Array(array) => (array.base(), array.bound(), false),
            Descriptor::Pointer(pointer) => (pointer.require_pointee()?, None, true),
            other => {
                return Err(MemdiffError::InvalidSpecialization(format!(
                    "string over {}: expected a char array or char pointer",
                    other.name()
                )));
            }
        };
        if !matches!(&*registry.get(base)?, Descriptor::Basic(basic) if basic.is_char()) {
            return Err(MemdiffError::InvalidSpecialization(format!(
                "string over {}: element type is not a character",
                descriptor.name()
            )));
        }
        Ok(Self {
            name: descriptor.name().to_string(),
            source,
            base,
            bound,
            indirect,
        })
    }

    /// Replace the source entry with this string
    ///
    /// ## Errors
    ///
    /// Returns `InvalidSpecialization` if the source entry was replaced since
    /// this string was built.
    pub fn takeover(self, registry: &TypeRegistry) -> MemdiffResult<TypeId>
    {
        let source = self.source;
        let indirect = self.indirect;
        registry.replace_checked(
            source,
            |existing| match (existing, indirect) {
                (Descriptor::Array(_), false) | (Descriptor::Pointer(_), true) => Ok(()),
                (other, _) => Err(MemdiffError::InvalidSpecialization(format!(
                    "{source} is now {}, cannot take it over as a string",
                    other.name()
                ))),
            },
            Descriptor::String(self),
        )?;
        Ok(source)
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Character type
    pub fn base(&self) -> TypeId
    {
        self.base
    }

    /// Static bound inherited from the array, `None` for pointers
    pub fn bound(&self) -> Option<u64>
    {
        self.bound
    }

    /// Whether the text lives behind a pointer
    pub fn is_indirect(&self) -> bool
    {
        self.indirect
    }

    pub(crate) fn size(&self, registry: &TypeRegistry) -> MemdiffResult<u64>
    {
        if self.indirect {
            return Ok(POINTER_SIZE);
        }
        let bound = self.bound.ok_or_else(|| MemdiffError::Unbounded(self.name.clone()))?;
        Ok(bound * registry.size_of(self.base)?)
    }

    /// Character place `index` of an inline string
    pub(crate) fn element(&self, registry: &TypeRegistry, index: u64, address: Address) -> MemdiffResult<Place>
    {
        if self.indirect {
            return Err(MemdiffError::NotIterable(self.name.clone()));
        }
        Ok(Place::new(self.base, address + index * registry.size_of(self.base)?))
    }

    /// Decode the text at `address`
    ///
    /// ## Errors
    ///
    /// Fails with a memory fault if the pointer is null or any character
    /// cannot be read; a partial string is never returned.
    pub fn decode(&self, model: &Model, address: Address, image: Image) -> MemdiffResult<String>
    {
        let buffer = self.buffer(model, address, image)?;
        let limit = self.limit(model);
        self.character(model)?.decode_cstring(model, buffer, image, limit)
    }

    pub(crate) fn memcmp(&self, model: &Model, address0: Address, address1: Address) -> MemdiffResult<bool>
    {
        Ok(self.decode(model, address0, Image::Primary)? == self.decode(model, address1, Image::Secondary)?)
    }

    /// Records the text buffer of a pointer-backed string
    pub(crate) fn revmap(
        &self,
        id: TypeId,
        model: &Model,
        address: Address,
        scheduler: &dyn Scheduler,
        path: &SymPath,
    ) -> MemdiffResult<()>
    {
        if !self.indirect {
            return Ok(());
        }
        let buffer = model.memory().resolve_pointer(address, Image::Primary)?;
        if buffer.is_null() {
            return Ok(());
        }
        let text = self.decode(model, address, Image::Primary)?;
        let stride = model.registry().size_of(self.base)?;
        scheduler.record_rev(path.deref(), id, buffer, (text.chars().count() as u64 + 1) * stride);
        Ok(())
    }

    fn buffer(&self, model: &Model, address: Address, image: Image) -> MemdiffResult<Address>
    {
        if !self.indirect {
            return Ok(address);
        }
        let buffer = model.memory().resolve_pointer(address, image)?;
        if buffer.is_null() {
            return Err(MemoryFault::NullPointer { image }.into());
        }
        Ok(buffer)
    }

    fn limit(&self, model: &Model) -> u64
    {
        let max = model.options().max_string_len;
        self.bound.map_or(max, |bound| bound.min(max))
    }

    fn character(&self, model: &Model) -> MemdiffResult<BasicType>
    {
        match &*model.registry().get(self.base)? {
            Descriptor::Basic(basic) => Ok(basic.clone()),
            other => Err(MemdiffError::InvalidSpecialization(format!(
                "string element {} is not a scalar",
                other.name()
            ))),
        }
    }
}
