//! Tests for error handling

use memdiff_core::error::{MemdiffError, MemoryFault};
use memdiff_core::model::{Encoding, TypeRegistry};
use memdiff_core::types::{Address, Image};

#[test]
fn test_fault_messages()
{
    let fault = MemoryFault::Unmapped {
        address: Address::new(0xffff_8880_0000_1000),
        image: Image::Secondary,
        len: 8,
    };
    let message = fault.to_string();
    assert!(message.contains("0xffff888000001000"));
    assert!(message.contains("8 bytes"));

    let message = MemoryFault::NullPointer { image: Image::Primary }.to_string();
    assert!(message.contains("null pointer"));
}

#[test]
fn test_only_faults_are_recoverable()
{
    let fault: MemdiffError = MemoryFault::UserspaceAddress {
        address: Address::new(0x4000),
        image: Image::Primary,
    }
    .into();
    assert!(fault.is_fault());
    assert!(fault.to_string().starts_with("memory fault"));

    assert!(!MemdiffError::OffsetMismatch { expected: 16, found: 8 }.is_fault());
    assert!(!MemdiffError::Incomplete("node".to_string()).is_fault());
    assert!(!MemdiffError::Config("bad".to_string()).is_fault());
}

#[test]
fn test_offset_mismatch_message()
{
    let message = MemdiffError::OffsetMismatch { expected: 16, found: 8 }.to_string();
    assert!(message.contains("16"));
    assert!(message.contains('8'));
}

#[test]
fn test_unknown_type_message()
{
    let registry = TypeRegistry::new();
    let int = registry.register_basic("int", 4, Encoding::Signed).unwrap();
    let other = TypeRegistry::new();
    let err = other.get(int).unwrap_err();
    assert!(matches!(err, MemdiffError::UnknownType(_)));
    assert!(err.to_string().contains("#0"));
}

#[test]
fn test_io_error_conversion()
{
    let err: MemdiffError = std::io::Error::new(std::io::ErrorKind::NotFound, "dump.raw").into();
    assert!(matches!(err, MemdiffError::Io(_)));
    assert!(err.to_string().contains("dump.raw"));
}
