//! # memdiff utilities
//!
//! Shared utilities for the memdiff workspace: logging built on `tracing`,
//! and typed parsing of the environment variables that drive configuration.

pub mod env;
pub mod logging;

// Re-export commonly used logging functions for convenience
pub use env::{env_var, EnvError};
pub use logging::{init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
