//! # Types
//!
//! Small value types shared by the memory layer, the type model and the
//! comparator.

pub mod address;
pub mod image;
pub mod sympath;
pub mod value;

// Re-export all public types
pub use address::Address;
pub use image::Image;
pub use sympath::SymPath;
pub use value::Value;
