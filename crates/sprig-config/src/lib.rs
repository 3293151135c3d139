//! Manifest parsing and settings layering for sprig
//!
//! This crate reads `sprig.toml`, turns its dependency tables into resolver
//! declarations, and merges settings from the global config file, the
//! project manifest, `SPRIG_*` environment variables and command-line flags.

pub mod toml;
pub mod merge;

// Re-export main types
pub use crate::toml::{DependencySpec, PackageSection, SprigToml, MANIFEST_FILE, PATH_SOURCE_PREFIX};
pub use crate::merge::{ConfigLayering, ConfigLoader, ConfigSource, GlobalConfig, Project, Settings};

use sprig_core::error::SprigError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, SprigError>;
