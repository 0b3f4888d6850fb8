//! Shared fixtures: a small writable heap turned into snapshot images.

#![allow(dead_code)]

use std::sync::Arc;

use memdiff_core::memory::{SnapshotImage, SnapshotPair};
use memdiff_core::model::{Model, ModelOptions, TypeRegistry};
use memdiff_core::types::Address;

/// Start of the fixture heap
pub const BASE: u64 = 0x1000;
/// Addresses below this fault as user space
pub const USERSPACE_LIMIT: u64 = 0x100;

/// Bytes backing one image, starting at [`BASE`]
#[derive(Clone)]
pub struct Heap
{
    bytes: Vec<u8>,
}

impl Heap
{
    pub fn new(size: usize) -> Self
    {
        Self { bytes: vec![0; size] }
    }

    pub fn put_bytes(&mut self, address: u64, data: &[u8]) -> &mut Self
    {
        let start = (address - BASE) as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        self
    }

    pub fn put_u64(&mut self, address: u64, value: u64) -> &mut Self
    {
        self.put_bytes(address, &value.to_le_bytes())
    }

    pub fn put_i32(&mut self, address: u64, value: i32) -> &mut Self
    {
        self.put_bytes(address, &value.to_le_bytes())
    }

    pub fn image(&self) -> SnapshotImage
    {
        SnapshotImage::new().with_region(Address::new(BASE), self.bytes.clone()).unwrap()
    }
}

pub fn pair(primary: &Heap, secondary: &Heap) -> SnapshotPair
{
    SnapshotPair::new(primary.image(), secondary.image()).with_userspace_limit(Address::new(USERSPACE_LIMIT))
}

pub fn model(registry: &Arc<TypeRegistry>, primary: &Heap, secondary: &Heap) -> Arc<Model>
{
    model_with(registry, primary, secondary, ModelOptions::default())
}

pub fn model_with(registry: &Arc<TypeRegistry>, primary: &Heap, secondary: &Heap, options: ModelOptions) -> Arc<Model>
{
    Arc::new(Model::with_options(
        Arc::clone(registry),
        Arc::new(pair(primary, secondary)),
        options,
    ))
}

pub fn addr(value: u64) -> Address
{
    Address::new(value)
}
