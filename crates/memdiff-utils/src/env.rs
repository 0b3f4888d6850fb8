//! Typed access to configuration environment variables.
//!
//! Every `MEMDIFF_*` knob goes through [`env_var`], so a malformed value is
//! reported with the variable name instead of being silently replaced by a
//! default.

use std::env::{self, VarError};
use std::fmt::Display;
use std::str::FromStr;

/// Environment variable parsing error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError
{
    /// The variable is set but its value does not parse
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid
    {
        key: String,
        value: String,
        reason: String,
    },

    /// The variable is set but is not valid unicode
    #[error("{0} is not valid unicode")]
    NotUnicode(String),
}

/// Read and parse `key`, returning `Ok(None)` when it is unset or empty.
///
/// ## Example
///
/// ```rust
/// use memdiff_utils::env_var;
///
/// let workers: Option<usize> = env_var("MEMDIFF_DOC_EXAMPLE_UNSET").unwrap();
/// assert_eq!(workers, None);
/// ```
///
/// ## Errors
///
/// Returns [`EnvError::Invalid`] if the value does not parse as `T`, and
/// [`EnvError::NotUnicode`] if it is not valid unicode.
pub fn env_var<T>(key: &str) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = match env::var(key) {
        Ok(raw) => raw,
        Err(VarError::NotPresent) => return Ok(None),
        Err(VarError::NotUnicode(_)) => return Err(EnvError::NotUnicode(key.to_string())),
    };
    parse_value(key, &raw)
}

fn parse_value<T>(key: &str, raw: &str) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<T>().map(Some).map_err(|err| EnvError::Invalid {
        key: key.to_string(),
        value: raw.to_string(),
        reason: err.to_string(),
    })
}
