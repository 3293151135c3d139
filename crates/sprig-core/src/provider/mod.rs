//! The metadata lookup interface the resolver is written against.
//!
//! Every package source implements [`MetadataProvider`]. The resolver is
//! generic over it and never inspects which kind of source answered.

mod offline;

pub use offline::OfflineProvider;

use std::sync::Arc;
use thiserror::Error;

use crate::types::{Dependency, PackageSelector, Version};
use crate::utils::Fingerprint;

/// Failure of a metadata source to answer a query
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{selector} has no version {version}")]
    VersionNotFound { selector: String, version: String },

    #[error("no source named '{name}' is configured")]
    UnknownSource { name: String },

    #[error("{message}")]
    Unavailable {
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ProviderError {
    /// A failure caused by an underlying error
    pub fn unavailable<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Unavailable {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn version_not_found(selector: &PackageSelector, version: &Version) -> Self {
        Self::VersionNotFound {
            selector: selector.to_string(),
            version: version.to_string(),
        }
    }
}

/// Answers the three questions resolution asks about packages.
///
/// Unknown packages have no versions; that is not an error. Implementations
/// must be `Sync` to take part in concurrent prefetching.
pub trait MetadataProvider {
    /// All published versions of a package, in any order
    fn list_versions(&self, selector: &PackageSelector) -> Result<Vec<Version>, ProviderError>;

    /// The requirements declared by one version
    fn requirements_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Vec<Dependency>, ProviderError>;

    /// Content hash of one version's artifact
    fn fingerprint_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Fingerprint, ProviderError>;
}

impl<P: MetadataProvider + ?Sized> MetadataProvider for &P {
    fn list_versions(&self, selector: &PackageSelector) -> Result<Vec<Version>, ProviderError> {
        (**self).list_versions(selector)
    }

    fn requirements_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Vec<Dependency>, ProviderError> {
        (**self).requirements_of(selector, version)
    }

    fn fingerprint_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Fingerprint, ProviderError> {
        (**self).fingerprint_of(selector, version)
    }
}

impl<P: MetadataProvider + ?Sized> MetadataProvider for Arc<P> {
    fn list_versions(&self, selector: &PackageSelector) -> Result<Vec<Version>, ProviderError> {
        (**self).list_versions(selector)
    }

    fn requirements_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Vec<Dependency>, ProviderError> {
        (**self).requirements_of(selector, version)
    }

    fn fingerprint_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Fingerprint, ProviderError> {
        (**self).fingerprint_of(selector, version)
    }
}
