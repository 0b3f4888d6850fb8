//! Image selector.

use std::fmt;

use crate::error::MemdiffError;

/// Selects one of the two memory snapshots a read targets
///
/// By convention `Primary` (0) is the image under inspection and `Secondary`
/// (1) the trusted reference it is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Image
{
    /// Image 0
    Primary,
    /// Image 1
    Secondary,
}

impl Image
{
    /// Both images, in index order
    pub const BOTH: [Image; 2] = [Image::Primary, Image::Secondary];

    /// Numeric index of the image (0 or 1)
    pub const fn index(self) -> usize
    {
        match self {
            Image::Primary => 0,
            Image::Secondary => 1,
        }
    }
}

impl TryFrom<u8> for Image
{
    type Error = MemdiffError;

    fn try_from(value: u8) -> Result<Self, Self::Error>
    {
        match value {
            0 => Ok(Image::Primary),
            1 => Ok(Image::Secondary),
            other => Err(MemdiffError::Config(format!("image selector must be 0 or 1, got {other}"))),
        }
    }
}

impl fmt::Display for Image
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.index())
    }
}
