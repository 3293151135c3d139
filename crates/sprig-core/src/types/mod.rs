//! Core data types for sprig dependency resolution.
//!
//! This module provides the fundamental types used throughout the workspace:
//! - Version, VersionRange and VersionReq for versions and constraints
//! - PackageSelector for package identity
//! - Marker and TargetEnvironment for environment conditions
//! - Dependency and Declaration specifications

pub mod dependency;
pub mod marker;
pub mod range;
pub mod req;
pub mod selector;
pub mod version;

// Re-export all public types
pub use dependency::{Declaration, Dependency, DependencyKind};
pub use marker::{Marker, MarkerError, MarkerOp, Operand, TargetEnvironment};
pub use range::VersionRange;
pub use req::{Comparator, Op, PartialVersion, VersionReq};
pub use selector::{canonical_name, PackageSelector};
pub use version::{Version, VersionError};
