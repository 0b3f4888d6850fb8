//! Comparator configuration.

use memdiff_utils::env_var;

use crate::error::{MemdiffError, MemdiffResult};

/// Tasks fetched per queue access
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Worker pool and queue settings
///
/// ## Example
///
/// ```rust
/// use memdiff_core::comparator::ComparatorConfig;
///
/// let config = ComparatorConfig::new().workers(4).max_path_depth(32);
/// assert_eq!(config.workers, 4);
/// assert_eq!(config.batch_size, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparatorConfig
{
    /// Default worker count for [`Comparator::run`](super::Comparator::run)
    /// and [`Comparator::revmap`](super::Comparator::revmap) callers
    pub workers: usize,
    /// Tasks a worker takes from the queue at once
    pub batch_size: usize,
    /// Tasks whose symbolic path is deeper than this are dropped at enqueue time
    pub max_path_depth: Option<usize>,
}

impl Default for ComparatorConfig
{
    fn default() -> Self
    {
        Self {
            workers: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            max_path_depth: None,
        }
    }
}

impl ComparatorConfig
{
    pub fn new() -> Self
    {
        Self::default()
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self
    {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self
    {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn max_path_depth(mut self, depth: usize) -> Self
    {
        self.max_path_depth = Some(depth);
        self
    }

    /// Defaults overridden by `MEMDIFF_WORKERS`, `MEMDIFF_BATCH_SIZE` and
    /// `MEMDIFF_MAX_PATH_DEPTH`
    ///
    /// ## Errors
    ///
    /// Returns `Config` for unparsable values and for a zero worker count or
    /// batch size.
    pub fn from_env() -> MemdiffResult<Self>
    {
        let defaults = Self::default();
        let config = Self {
            workers: env_var("MEMDIFF_WORKERS")?.unwrap_or(defaults.workers),
            batch_size: env_var("MEMDIFF_BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            max_path_depth: env_var("MEMDIFF_MAX_PATH_DEPTH")?.or(defaults.max_path_depth),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which no work would ever be drained
    ///
    /// ## Errors
    ///
    /// Returns `Config` for a zero worker count or batch size.
    pub fn validate(&self) -> MemdiffResult<()>
    {
        if self.workers == 0 {
            return Err(MemdiffError::Config("worker count must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(MemdiffError::Config("batch size must be at least 1".to_string()));
        }
        Ok(())
    }
}
