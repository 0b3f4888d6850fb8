//! # Intrusive Lists
//!
//! Kernel-style circular doubly-linked lists, where a two-pointer header
//! (`next` at offset 0, `prev` at offset 8) is embedded in the payload struct
//! and points at the headers embedded in its siblings. Stepping a link yields
//! the sibling's header address; subtracting the header's offset inside the
//! owning struct recovers the sibling itself.
//!
//! A zero link is an ordinary end-of-list marker here ([`ListStep::End`]),
//! not a null-pointer fault.

use std::fmt;
use std::str::FromStr;

use tracing::trace;

use super::descriptor::Descriptor;
use super::{ListPolicy, Model, Place, Scheduler, TypeId, TypeRegistry};
use crate::error::{MemdiffError, MemdiffResult, MemoryFault};
use crate::memory::POINTER_SIZE;
use crate::types::{Address, Image, SymPath, Value};

/// Size of the embedded header: two pointers
pub const LIST_HEAD_SIZE: u64 = 2 * POINTER_SIZE;

/// One of the two links of a list header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link
{
    /// Forward link, offset 0
    Next,
    /// Backward link, offset 8
    Prev,
}

impl Link
{
    /// Both links, in layout order
    pub const ALL: [Link; 2] = [Link::Next, Link::Prev];

    /// Byte offset of the link inside the header
    pub const fn offset(self) -> u64
    {
        match self {
            Link::Next => 0,
            Link::Prev => POINTER_SIZE,
        }
    }

    pub const fn name(self) -> &'static str
    {
        match self {
            Link::Next => "next",
            Link::Prev => "prev",
        }
    }
}

impl FromStr for Link
{
    type Err = MemdiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s {
            "next" => Ok(Link::Next),
            "prev" => Ok(Link::Prev),
            other => Err(MemdiffError::UnknownMember {
                ty: "list_head".to_string(),
                member: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Link
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.name())
    }
}

/// The struct a list header belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner
{
    /// The owning struct type, with no address (the field's own node)
    Unbound(TypeId),
    /// A null owner: marks the start or end of a traversal
    Null(TypeId),
    /// The owning struct at an address
    At(Place),
}

impl Owner
{
    /// The owning struct type
    pub fn ty(&self) -> TypeId
    {
        match self {
            Owner::Unbound(ty) | Owner::Null(ty) => *ty,
            Owner::At(place) => place.ty,
        }
    }

    /// The owner's address, if bound and not null
    pub fn address(&self) -> Option<Address>
    {
        match self {
            Owner::At(place) => Some(place.address),
            _ => None,
        }
    }
}

/// Result of following a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStep
{
    /// The sibling's owning struct
    Node(Place),
    /// The link was zero
    End,
}

/// A list header field embedded at `offset` inside struct `owner`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrusiveListField
{
    name: String,
    member: String,
    owner: TypeId,
    offset: u64,
}

impl IntrusiveListField
{
    /// Build a list field for member `member` of struct `owner`
    ///
    /// `offset` defaults to the member's own offset; an explicit offset is
    /// used when the list links a different struct than the one holding the
    /// header, in which case [`takeover`](Self::takeover) will refuse a
    /// member at a different offset.
    ///
    /// ## Errors
    ///
    /// - `UnknownMember` if `owner` has no such member
    /// - `InvalidSpecialization` if `owner` is not a struct
    pub fn over(registry: &TypeRegistry, owner: TypeId, member: &str, offset: Option<u64>) -> MemdiffResult<Self>
    {
        let member_id = registry.member_of(owner, member)?;
        let member_offset = registry.get(member_id)?.member_slot().map_or(0, |(_, offset)| offset);
        Ok(Self {
            name: format!("list_head({})", registry.name_of(owner)?),
            member: member.to_string(),
            owner,
            offset: offset.unwrap_or(member_offset),
        })
    }

    /// Replace member entry `target` with this field
    ///
    /// ## Errors
    ///
    /// - `OffsetMismatch` if `target` sits at a different offset
    /// - `InvalidSpecialization` if `target` is not a struct member
    ///
    /// The registry is unchanged on error.
    pub fn takeover(self, registry: &TypeRegistry, target: TypeId) -> MemdiffResult<TypeId>
    {
        let expected = self.offset;
        registry.replace_checked(
            target,
            |existing| match existing.member_slot() {
                Some((_, found)) if found == expected => Ok(()),
                Some((_, found)) => Err(MemdiffError::OffsetMismatch { expected, found }),
                None => Err(MemdiffError::InvalidSpecialization(format!(
                    "{target} ({}) is not a struct member",
                    existing.name()
                ))),
            },
            Descriptor::ListField(self),
        )?;
        Ok(target)
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Name of the member this field replaces
    pub fn member(&self) -> &str
    {
        &self.member
    }

    /// Offset of the header inside the owning struct
    pub fn offset(&self) -> u64
    {
        self.offset
    }

    /// Owning struct type
    pub fn owner_type(&self) -> TypeId
    {
        self.owner
    }

    /// Owning struct of the header at `address`
    ///
    /// `None` yields the owner type alone; a null address yields the tagged
    /// null owner.
    pub fn owner(&self, address: Option<Address>) -> Owner
    {
        match address {
            None => Owner::Unbound(self.owner),
            Some(address) if address.is_null() => Owner::Null(self.owner),
            Some(address) => Owner::At(Place::new(self.owner, address - self.offset)),
        }
    }

    /// Follow `link` of the header at `address` in `image`
    ///
    /// ## Errors
    ///
    /// Returns a `NullPointer` fault if `address` itself is null; a zero
    /// link is [`ListStep::End`], not an error.
    pub fn step(&self, model: &Model, link: Link, address: Address, image: Image) -> MemdiffResult<ListStep>
    {
        if address.is_null() {
            return Err(MemoryFault::NullPointer { image }.into());
        }
        let sibling = model.memory().resolve_pointer(address + link.offset(), image)?;
        if sibling.is_null() {
            return Ok(ListStep::End);
        }
        match self.owner(Some(sibling)) {
            Owner::At(place) => Ok(ListStep::Node(place)),
            _ => Ok(ListStep::End),
        }
    }

    /// Owners reachable from the header at `address`, one per link
    ///
    /// Without an address only the owner type is yielded.
    ///
    /// ## Errors
    ///
    /// Propagates faults from reading the links.
    pub fn iter(&self, model: &Model, address: Option<Address>, image: Image) -> MemdiffResult<Vec<Owner>>
    {
        let Some(address) = address else {
            return Ok(vec![self.owner(None)]);
        };
        Link::ALL
            .iter()
            .map(|link| {
                Ok(match self.step(model, *link, address, image)? {
                    ListStep::Node(place) => Owner::At(place),
                    ListStep::End => Owner::Null(self.owner),
                })
            })
            .collect()
    }

    /// Decodes to `{ next, prev }`, each the decoded owner one level shallower
    pub(crate) fn decode(&self, model: &Model, address: Address, image: Image, depth: usize) -> MemdiffResult<Value>
    {
        if depth == 0 {
            return Ok(Value::Truncated);
        }
        let mut fields = Vec::with_capacity(Link::ALL.len());
        for link in Link::ALL {
            let value = match self.step(model, link, address, image)? {
                ListStep::Node(place) => model.decode_at(place.ty, place.address, image, depth - 1)?,
                ListStep::End => Value::Null,
            };
            fields.push((link.name().to_string(), value));
        }
        Ok(Value::Struct(fields))
    }

    /// Compares according to the model's [`ListPolicy`]
    ///
    /// Under `Skip` nothing is read or scheduled and no difference is
    /// reported: unguarded traversal of shared kernel lists does not
    /// terminate in practice. `Peek` reads the `next` link in both images,
    /// so unreadable headers fault, and otherwise acts like `Skip`. Under
    /// `Follow` the raw header addresses must match, and the `next` owners
    /// of both images are scheduled.
    pub(crate) fn memcmp(
        &self,
        model: &Model,
        address0: Address,
        address1: Address,
        scheduler: &dyn Scheduler,
        path: &SymPath,
    ) -> MemdiffResult<bool>
    {
        match model.options().list_policy {
            ListPolicy::Skip => Ok(true),
            ListPolicy::Peek => {
                self.step(model, Link::Next, address0, Image::Primary)?;
                self.step(model, Link::Next, address1, Image::Secondary)?;
                Ok(true)
            }
            ListPolicy::Follow => {
                if address0 != address1 {
                    return Ok(false);
                }
                let next0 = self.step(model, Link::Next, address0, Image::Primary)?;
                let next1 = self.step(model, Link::Next, address1, Image::Secondary)?;
                match (next0, next1) {
                    (ListStep::Node(owner0), ListStep::Node(owner1)) => {
                        scheduler.enqueue_diff(path.member(Link::Next.name()), self.owner, owner0.address, owner1.address);
                    }
                    _ => trace!(%path, "end of list"),
                }
                Ok(true)
            }
        }
    }

    /// Records the header itself
    pub(crate) fn revmap(&self, id: TypeId, address: Address, scheduler: &dyn Scheduler, path: &SymPath)
    {
        scheduler.record_rev(path.clone(), id, address, LIST_HEAD_SIZE);
    }
}
