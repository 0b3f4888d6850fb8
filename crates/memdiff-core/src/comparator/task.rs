//! Units of work on the comparator queue.

use crate::model::TypeId;
use crate::types::{Address, SymPath};

/// A queued unit of work; created once, consumed once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task
{
    /// Compare `ty` at `address0` in image 0 with `address1` in image 1
    Diff
    {
        path: SymPath,
        ty: TypeId,
        address0: Address,
        address1: Address,
    },
    /// Reverse-map `ty` at `address` in image 0
    Rev
    {
        path: SymPath,
        ty: TypeId,
        address: Address,
    },
}

impl Task
{
    pub fn path(&self) -> &SymPath
    {
        match self {
            Task::Diff { path, .. } | Task::Rev { path, .. } => path,
        }
    }

    pub fn ty(&self) -> TypeId
    {
        match self {
            Task::Diff { ty, .. } | Task::Rev { ty, .. } => *ty,
        }
    }

    /// The image 0 address, which is also the dedup key
    pub fn address(&self) -> Address
    {
        match self {
            Task::Diff { address0, .. } => *address0,
            Task::Rev { address, .. } => *address,
        }
    }
}
