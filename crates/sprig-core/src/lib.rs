//! # sprig-core
//!
//! Core types and utilities shared across all sprig crates.
//!
//! This crate provides:
//! - Version, VersionRange and VersionReq types with the constraint algebra
//! - PackageSelector, Dependency and Declaration types
//! - Environment markers and the target environment they are evaluated against
//! - The MetadataProvider trait implemented by package sources
//! - SprigError enum for unified error handling
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (Version, VersionRange, Marker, etc.)
//! - `provider`: The metadata lookup interface used by the resolver
//! - `error`: Error types and result aliases
//! - `utils`: Fingerprints and content hashing

pub mod error;
pub mod provider;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{SprigError, SprigResult};
pub use provider::{MetadataProvider, OfflineProvider, ProviderError};
pub use types::{
    canonical_name, Declaration, Dependency, DependencyKind, Marker, PackageSelector,
    TargetEnvironment, Version, VersionRange, VersionReq,
};
pub use utils::Fingerprint;

#[cfg(test)]
mod tests {
    use crate::{canonical_name, PackageSelector};

    #[test]
    fn test_root_exports() {
        assert_eq!(canonical_name(" Serde_JSON "), "serde-json");
        assert_eq!(PackageSelector::new("serde.json").name(), canonical_name("SERDE_JSON"));
    }
}
