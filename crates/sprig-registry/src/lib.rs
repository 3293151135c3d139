//! Package sources for sprig
//!
//! This crate answers the resolver's metadata queries from package indexes
//! (a directory of JSON documents per package), local path packages, and
//! named alternate indexes, each index with its own document cache.

pub mod api;
pub mod cache;
pub mod index;
pub mod path;
pub mod source;

// Re-export main types
pub use api::{DependencyDocument, DistInfo, IndexedPackage, PackageDocument, VersionDocument};
pub use cache::{CacheEntry, CacheStats, MetadataCache};
pub use index::IndexSource;
pub use path::PathSource;
pub use source::{Source, SourceSet};

use sprig_core::error::SprigError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, SprigError>;
