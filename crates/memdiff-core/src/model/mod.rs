//! # Typed Memory Object Model
//!
//! An address plus a [`TypeId`] is a typed object. The [`Model`] bundles the
//! type registry, the memory reader and the decoding options, and is the
//! single entry point through which objects are decoded, navigated,
//! compared and reverse-mapped.
//!
//! ## Navigation
//!
//! Callers never inspect descriptor variants; they navigate:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use memdiff_core::memory::{SnapshotImage, SnapshotPair};
//! use memdiff_core::model::{Encoding, Model, TypeRegistry};
//! use memdiff_core::types::{Address, Image, Value};
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let int = registry.register_basic("int", 4, Encoding::Signed)?;
//! let pair = registry.register_struct("pair", 8, &[("a", 0, int), ("b", 4, int)])?;
//!
//! let base = Address::new(0x1000);
//! let mut bytes = vec![0u8; 8];
//! bytes[4..8].copy_from_slice(&7i32.to_le_bytes());
//! let image = SnapshotImage::new().with_region(base, bytes)?;
//! let memory = SnapshotPair::new(image.clone(), image).with_userspace_limit(Address::new(0x100));
//!
//! let model = Model::new(registry, Arc::new(memory));
//! let b = model.object(pair, base).member("b")?;
//! assert_eq!(b.decode(Image::Primary)?, Value::Int(7));
//! # Ok::<(), memdiff_core::error::MemdiffError>(())
//! ```
//!
//! ## Comparison and reverse mapping
//!
//! `memcmp` and `revmap` never recurse into sub-objects themselves: they
//! hand sub-objects to a [`Scheduler`], which in practice is the
//! [`Comparator`](crate::comparator::Comparator) work queue.

pub mod array;
pub mod basic;
pub mod descriptor;
pub mod list;
pub mod pointer;
pub mod registry;
pub mod sentinel;
pub mod string;
pub mod structure;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use memdiff_utils::env_var;

pub use array::ArrayType;
pub use basic::{BasicType, Encoding, Interpretation};
pub use descriptor::Descriptor;
pub use list::{IntrusiveListField, Link, ListStep, Owner, LIST_HEAD_SIZE};
pub use pointer::PointerType;
pub use registry::{TypeId, TypeRegistry};
pub use sentinel::{SentinelArray, SentinelElements, Terminator};
pub use string::StringType;
pub use structure::{Member, StructType};

use crate::error::{MemdiffError, MemdiffResult};
use crate::memory::MemoryReader;
use crate::types::{Address, Image, SymPath, Value};

/// A type at an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Place
{
    pub ty: TypeId,
    pub address: Address,
}

impl Place
{
    pub const fn new(ty: TypeId, address: Address) -> Self
    {
        Self { ty, address }
    }
}

/// Sink for work discovered while comparing or reverse-mapping
///
/// All three methods deduplicate and return `true` only if the work was
/// accepted.
pub trait Scheduler
{
    /// Schedule a comparison of `ty` at `address0` (image 0) and `address1` (image 1)
    fn enqueue_diff(&self, path: SymPath, ty: TypeId, address0: Address, address1: Address) -> bool;

    /// Record `address..address+size` as `ty` and schedule its reverse mapping
    fn enqueue_rev(&self, path: SymPath, ty: TypeId, address: Address, size: u64) -> bool;

    /// Record `address..address+size` as `ty` without scheduling anything
    fn record_rev(&self, path: SymPath, ty: TypeId, address: Address, size: u64) -> bool;
}

/// How intrusive list fields are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListPolicy
{
    /// Report no difference and schedule nothing
    ///
    /// Nothing is read either, so an unreadable list header is not counted
    /// as a fault. Use [`Peek`](ListPolicy::Peek) to have it counted.
    #[default]
    Skip,
    /// Read the `next` link in both images, then behave like `Skip`
    Peek,
    /// Compare raw header addresses and schedule the `next` owners
    Follow,
}

impl FromStr for ListPolicy
{
    type Err = MemdiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "skip" => Ok(ListPolicy::Skip),
            "peek" => Ok(ListPolicy::Peek),
            "follow" => Ok(ListPolicy::Follow),
            other => Err(MemdiffError::Config(format!(
                "invalid list policy {other:?}, expected \"skip\", \"peek\" or \"follow\""
            ))),
        }
    }
}

impl fmt::Display for ListPolicy
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            ListPolicy::Skip => write!(f, "skip"),
            ListPolicy::Peek => write!(f, "peek"),
            ListPolicy::Follow => write!(f, "follow"),
        }
    }
}

/// Decoding and comparison knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOptions
{
    /// Nesting depth for [`Model::decode`]
    pub max_depth: usize,
    /// Maximum characters read from a null-terminated string
    pub max_string_len: u64,
    pub list_policy: ListPolicy,
}

impl Default for ModelOptions
{
    fn default() -> Self
    {
        Self {
            max_depth: 8,
            max_string_len: 4096,
            list_policy: ListPolicy::Skip,
        }
    }
}

impl ModelOptions
{
    /// Defaults overridden by `MEMDIFF_MAX_DEPTH`, `MEMDIFF_MAX_STRING_LEN`
    /// and `MEMDIFF_LIST_POLICY` (`skip`, `peek` or `follow`)
    ///
    /// ## Errors
    ///
    /// Returns `Config` if a variable is set to an unparsable value.
    pub fn from_env() -> MemdiffResult<Self>
    {
        let defaults = Self::default();
        Ok(Self {
            max_depth: env_var("MEMDIFF_MAX_DEPTH")?.unwrap_or(defaults.max_depth),
            max_string_len: env_var("MEMDIFF_MAX_STRING_LEN")?.unwrap_or(defaults.max_string_len),
            list_policy: env_var("MEMDIFF_LIST_POLICY")?.unwrap_or(defaults.list_policy),
        })
    }
}

/// Registry, memory and options shared by every typed object
pub struct Model
{
    registry: Arc<TypeRegistry>,
    memory: Arc<dyn MemoryReader>,
    options: ModelOptions,
}

impl fmt::Debug for Model
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Model")
            .field("types", &self.registry.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Model
{
    pub fn new(registry: Arc<TypeRegistry>, memory: Arc<dyn MemoryReader>) -> Self
    {
        Self::with_options(registry, memory, ModelOptions::default())
    }

    pub fn with_options(registry: Arc<TypeRegistry>, memory: Arc<dyn MemoryReader>, options: ModelOptions) -> Self
    {
        Self {
            registry,
            memory,
            options,
        }
    }

    pub fn registry(&self) -> &TypeRegistry
    {
        &self.registry
    }

    pub fn memory(&self) -> &dyn MemoryReader
    {
        self.memory.as_ref()
    }

    pub fn options(&self) -> &ModelOptions
    {
        &self.options
    }

    /// Look up a descriptor
    ///
    /// ## Errors
    ///
    /// Returns `UnknownType` for ids not issued by the registry.
    pub fn descriptor(&self, ty: TypeId) -> MemdiffResult<Arc<Descriptor>>
    {
        self.registry.get(ty)
    }

    /// The object of type `ty` at `address`
    pub fn object(&self, ty: TypeId, address: Address) -> TypedObject<'_>
    {
        TypedObject {
            model: self,
            place: Place::new(ty, address),
        }
    }

    /// Static size of `ty`
    ///
    /// ## Errors
    ///
    /// See [`TypeRegistry::size_of`].
    pub fn size_of(&self, ty: TypeId) -> MemdiffResult<u64>
    {
        self.registry.size_of(ty)
    }

    /// Decode `ty` at `address` up to the configured depth
    ///
    /// ## Errors
    ///
    /// Propagates memory faults and shape errors.
    pub fn decode(&self, ty: TypeId, address: Address, image: Image) -> MemdiffResult<Value>
    {
        self.decode_at(ty, address, image, self.options.max_depth)
    }

    /// Decode `ty` at `address` with `depth` levels of nesting left
    ///
    /// ## Errors
    ///
    /// Propagates memory faults and shape errors.
    pub fn decode_at(&self, ty: TypeId, address: Address, image: Image, depth: usize) -> MemdiffResult<Value>
    {
        self.descriptor(ty)?.decode(self, address, image, depth)
    }

    /// Compare `ty` at `address0` (image 0) and `address1` (image 1)
    ///
    /// Sub-objects are scheduled on `scheduler` under `path`; the result only
    /// covers this level.
    ///
    /// ## Errors
    ///
    /// Propagates memory faults and shape errors.
    pub fn memcmp(
        &self,
        ty: TypeId,
        address0: Address,
        address1: Address,
        scheduler: &dyn Scheduler,
        path: &SymPath,
    ) -> MemdiffResult<bool>
    {
        self.descriptor(ty)?.memcmp(self, address0, address1, scheduler, path)
    }

    /// Reverse-map the object `ty` at `address` (image 0)
    ///
    /// ## Errors
    ///
    /// Propagates memory faults; a null pointer task is a fault.
    pub fn revmap(&self, ty: TypeId, address: Address, scheduler: &dyn Scheduler, path: &SymPath) -> MemdiffResult<()>
    {
        self.descriptor(ty)?.revmap(ty, self, address, scheduler, path)
    }

    /// Reverse-map an object embedded in an aggregate being walked inline
    ///
    /// Unlike [`revmap`](Self::revmap) a null pointer is skipped.
    pub(crate) fn revmap_embedded(
        &self,
        ty: TypeId,
        address: Address,
        scheduler: &dyn Scheduler,
        path: &SymPath,
    ) -> MemdiffResult<()>
    {
        let descriptor = self.descriptor(ty)?;
        match &*descriptor {
            Descriptor::Pointer(pointer) => pointer.revmap(self, address, scheduler, path, true),
            Descriptor::Member(member) => self.revmap_embedded(member.ty(), address, scheduler, path),
            other => other.revmap(ty, self, address, scheduler, path),
        }
    }

    /// Bytes `ty` covers at `address` in image 0
    ///
    /// ## Errors
    ///
    /// Fails for types whose extent cannot be determined, or on faults while
    /// measuring a sentinel-terminated array.
    pub fn extent(&self, ty: TypeId, address: Address) -> MemdiffResult<u64>
    {
        self.descriptor(ty)?.extent(self, address)
    }
}

/// Navigable view of a [`Place`]
#[derive(Debug, Clone, Copy)]
pub struct TypedObject<'m>
{
    model: &'m Model,
    place: Place,
}

impl<'m> TypedObject<'m>
{
    pub fn ty(&self) -> TypeId
    {
        self.place.ty
    }

    pub fn address(&self) -> Address
    {
        self.place.address
    }

    pub fn place(&self) -> Place
    {
        self.place
    }

    /// Type name
    ///
    /// ## Errors
    ///
    /// Returns `UnknownType` for dangling ids.
    pub fn type_name(&self) -> MemdiffResult<String>
    {
        self.model.registry().name_of(self.place.ty)
    }

    /// Static size of the object's type
    ///
    /// ## Errors
    ///
    /// See [`TypeRegistry::size_of`].
    pub fn size(&self) -> MemdiffResult<u64>
    {
        self.model.size_of(self.place.ty)
    }

    /// Struct member `name`
    ///
    /// ## Errors
    ///
    /// Returns `UnknownMember` if the object has no such member.
    pub fn member(&self, name: &str) -> MemdiffResult<TypedObject<'m>>
    {
        let place = self.model.descriptor(self.place.ty)?.member(self.model.registry(), name, self.place.address)?;
        Ok(self.at(place))
    }

    /// Array element `index`; static bounds are not checked
    ///
    /// ## Errors
    ///
    /// Returns `NotIterable` for non-array objects.
    pub fn element(&self, index: u64) -> MemdiffResult<TypedObject<'m>>
    {
        let place = self.model.descriptor(self.place.ty)?.element(self.model.registry(), index, self.place.address)?;
        Ok(self.at(place))
    }

    /// The pointee, read in `image`
    ///
    /// ## Errors
    ///
    /// Returns a `NullPointer` fault for a null pointer.
    pub fn dereference(&self, image: Image) -> MemdiffResult<TypedObject<'m>>
    {
        let place = self.model.descriptor(self.place.ty)?.dereference(self.model, self.place.address, image)?;
        Ok(self.at(place))
    }

    /// Decoded value in `image`
    ///
    /// ## Errors
    ///
    /// Propagates memory faults and shape errors.
    pub fn decode(&self, image: Image) -> MemdiffResult<Value>
    {
        self.model.decode(self.place.ty, self.place.address, image)
    }

    /// Sub-objects in order: elements of arrays, members of structs
    ///
    /// ## Errors
    ///
    /// Returns `NotIterable` for scalars and pointers.
    pub fn elements(&self, image: Image) -> MemdiffResult<Vec<TypedObject<'m>>>
    {
        let places = self.model.descriptor(self.place.ty)?.elements(self.model, self.place.address, image)?;
        Ok(places.into_iter().map(|place| self.at(place)).collect())
    }

    /// Follow `link` of an intrusive list field
    ///
    /// ## Errors
    ///
    /// Returns `NotIterable` if the object is not a list field.
    pub fn step(&self, link: Link, image: Image) -> MemdiffResult<ListStep>
    {
        let descriptor = self.model.descriptor(self.place.ty)?;
        match &*descriptor {
            Descriptor::ListField(field) => field.step(self.model, link, self.place.address, image),
            other => Err(MemdiffError::NotIterable(other.name().to_string())),
        }
    }

    /// Owners reachable over both links of an intrusive list field
    ///
    /// ## Errors
    ///
    /// Returns `NotIterable` if the object is not a list field.
    pub fn owners(&self, image: Image) -> MemdiffResult<Vec<Owner>>
    {
        let descriptor = self.model.descriptor(self.place.ty)?;
        match &*descriptor {
            Descriptor::ListField(field) => field.iter(self.model, Some(self.place.address), image),
            other => Err(MemdiffError::NotIterable(other.name().to_string())),
        }
    }

    fn at(&self, place: Place) -> TypedObject<'m>
    {
        TypedObject {
            model: self.model,
            place,
        }
    }
}
