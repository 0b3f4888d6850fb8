//! Scalar types.

use super::Model;
use crate::error::{MemdiffError, MemdiffResult};
use crate::types::{Address, Image, Value};

/// How the bytes of a scalar are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding
{
    /// Two's complement signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
    /// Boolean, non-zero is true
    Boolean,
    /// IEEE 754 float (4 or 8 bytes)
    Float,
}

/// Decoding mode requested from a scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpretation
{
    /// Decode the single value at the address
    #[default]
    Numeric,
    /// Treat the address as the start of a null-terminated character sequence
    NullTerminated,
}

/// A scalar of known width and encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicType
{
    name: String,
    size: u64,
    encoding: Encoding,
}

impl BasicType
{
    /// Create a scalar type
    ///
    /// ## Errors
    ///
    /// Returns `InvalidSpecialization` for unsupported widths.
    pub fn new(name: &str, size: u64, encoding: Encoding) -> MemdiffResult<Self>
    {
        let valid = match encoding {
            Encoding::Float => matches!(size, 4 | 8),
            _ => matches!(size, 1 | 2 | 4 | 8),
        };
        if !valid {
            return Err(MemdiffError::InvalidSpecialization(format!(
                "{name}: unsupported {encoding:?} width of {size} bytes"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            size,
            encoding,
        })
    }

    /// Type name
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Width in bytes
    pub fn size(&self) -> u64
    {
        self.size
    }

    /// Byte interpretation
    pub fn encoding(&self) -> Encoding
    {
        self.encoding
    }

    /// Whether this is a character-sized integer, usable as string element
    pub fn is_char(&self) -> bool
    {
        self.size == 1 && matches!(self.encoding, Encoding::Signed | Encoding::Unsigned)
    }

    /// Decode the scalar at `address`
    ///
    /// In [`Interpretation::NullTerminated`] mode the result is
    /// [`Value::Text`], read up to the model's `max_string_len`.
    ///
    /// ## Errors
    ///
    /// Propagates memory faults.
    pub fn decode(&self, model: &Model, address: Address, image: Image, mode: Interpretation) -> MemdiffResult<Value>
    {
        match mode {
            Interpretation::Numeric => Ok(self.value_from(self.read_raw(model, address, image)?)),
            Interpretation::NullTerminated => {
                Ok(Value::Text(self.decode_cstring(model, address, image, model.options().max_string_len)?))
            }
        }
    }

    /// Read characters at increasing offsets until a terminator
    ///
    /// Each element keeps its low 8 bits. Reading stops at a zero element,
    /// at an element outside `-128..=255`, or after `limit` elements. A
    /// faulting element fails the whole decode.
    pub(crate) fn decode_cstring(&self, model: &Model, address: Address, image: Image, limit: u64) -> MemdiffResult<String>
    {
        let mut text = String::new();
        for index in 0..limit {
            let raw = self.read_raw(model, address + index * self.size, image)?;
            let value = self.integer(raw);
            if value == 0 || !(-128..=255).contains(&value) {
                break;
            }
            text.push(char::from((value & 0xff) as u8));
        }
        Ok(text)
    }

    /// Whether the scalar at `address` is zero
    pub(crate) fn is_zero_at(&self, model: &Model, address: Address, image: Image) -> MemdiffResult<bool>
    {
        Ok(self.read_raw(model, address, image)? == 0)
    }

    /// Compare the raw bytes at `address0` (image 0) and `address1` (image 1)
    pub(crate) fn memcmp(&self, model: &Model, address0: Address, address1: Address) -> MemdiffResult<bool>
    {
        let left = self.read_raw(model, address0, Image::Primary)?;
        let right = self.read_raw(model, address1, Image::Secondary)?;
        Ok(left == right)
    }

    fn read_raw(&self, model: &Model, address: Address, image: Image) -> MemdiffResult<u64>
    {
        let mut buf = [0u8; 8];
        model.memory().read(address, image, &mut buf[..self.size as usize])?;
        Ok(u64::from_le_bytes(buf))
    }

    fn integer(&self, raw: u64) -> i128
    {
        match self.encoding {
            Encoding::Signed => i128::from(sign_extend(raw, self.size)),
            _ => i128::from(raw),
        }
    }

    fn value_from(&self, raw: u64) -> Value
    {
        match self.encoding {
            Encoding::Signed => Value::Int(sign_extend(raw, self.size)),
            Encoding::Unsigned => Value::UInt(raw),
            Encoding::Boolean => Value::Bool(raw != 0),
            Encoding::Float if self.size == 4 => Value::Float(f64::from(f32::from_bits(raw as u32))),
            Encoding::Float => Value::Float(f64::from_bits(raw)),
        }
    }
}

fn sign_extend(raw: u64, size: u64) -> i64
{
    let shift = 64 - size * 8;
    ((raw << shift) as i64) >> shift
}
