//! Decoded values.

use super::Address;

/// A value decoded from memory
///
/// Pointers decode to their raw target and are never followed; aggregates
/// decode recursively until the depth budget runs out, at which point the
/// remaining subtree is [`Value::Truncated`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value
{
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Boolean
    Bool(bool),
    /// Floating point number
    Float(f64),
    /// Null-terminated text
    Text(String),
    /// Non-null pointer target
    Pointer(Address),
    /// Null pointer, or the end of an intrusive list
    Null,
    /// Array elements in index order
    Array(Vec<Value>),
    /// Struct members in declaration order
    Struct(Vec<(String, Value)>),
    /// Depth budget exhausted
    Truncated,
}

impl Value
{
    /// Whether the value is numerically zero (or null)
    pub fn is_zero(&self) -> bool
    {
        match self {
            Value::Int(v) => *v == 0,
            Value::UInt(v) => *v == 0,
            Value::Bool(v) => !*v,
            Value::Float(v) => *v == 0.0,
            Value::Null => true,
            _ => false,
        }
    }

    /// Text content, if this is a decoded string
    pub fn as_text(&self) -> Option<&str>
    {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Look up a struct member by name
    pub fn field(&self, name: &str) -> Option<&Value>
    {
        match self {
            Value::Struct(fields) => fields.iter().find(|(field, _)| field == name).map(|(_, value)| value),
            _ => None,
        }
    }
}
