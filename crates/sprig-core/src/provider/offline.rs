//! In-memory provider for tests, benchmarks and pre-fetched metadata.

use std::collections::BTreeMap;

use super::{MetadataProvider, ProviderError};
use crate::types::{Dependency, PackageSelector, Version, VersionError, VersionReq};
use crate::utils::Fingerprint;

/// A provider answering from a fixed table of packages
#[derive(Debug, Clone, Default)]
pub struct OfflineProvider {
    packages: BTreeMap<PackageSelector, BTreeMap<Version, Vec<Dependency>>>,
}

impl OfflineProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a version with already-built dependencies
    pub fn add_version(
        &mut self,
        selector: PackageSelector,
        version: Version,
        dependencies: impl IntoIterator<Item = Dependency>,
    ) {
        self.packages
            .entry(selector)
            .or_default()
            .insert(version, dependencies.into_iter().collect());
    }

    /// Register a default-registry version from requirement strings
    pub fn add(
        &mut self,
        name: &str,
        version: &str,
        dependencies: &[(&str, &str)],
    ) -> Result<&mut Self, VersionError> {
        let version = Version::parse(version)?;
        let dependencies = dependencies
            .iter()
            .map(|(dep, req)| {
                Ok(Dependency::new(
                    PackageSelector::new(dep),
                    VersionReq::parse(req)?.to_range(),
                ))
            })
            .collect::<Result<Vec<_>, VersionError>>()?;
        self.add_version(PackageSelector::new(name), version, dependencies);
        Ok(self)
    }

    pub fn selectors(&self) -> impl Iterator<Item = &PackageSelector> {
        self.packages.keys()
    }
}

impl MetadataProvider for OfflineProvider {
    fn list_versions(&self, selector: &PackageSelector) -> Result<Vec<Version>, ProviderError> {
        Ok(self
            .packages
            .get(selector)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn requirements_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Vec<Dependency>, ProviderError> {
        self.packages
            .get(selector)
            .and_then(|versions| versions.get(version))
            .cloned()
            .ok_or_else(|| ProviderError::version_not_found(selector, version))
    }

    fn fingerprint_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Fingerprint, ProviderError> {
        self.requirements_of(selector, version)?;
        Ok(Fingerprint::of_bytes(
            format!("{}@{}", selector, version).as_bytes(),
        ))
    }
}
