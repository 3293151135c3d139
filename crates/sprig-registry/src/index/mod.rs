//! Package indexes: a directory of JSON documents, or an in-memory table

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use sprig_core::{
    canonical_name, Dependency, Fingerprint, MetadataProvider, PackageSelector, ProviderError,
    Version,
};
use tracing::{debug, trace};

use crate::api::{IndexedPackage, PackageDocument, VersionDocument};
use crate::cache::{CacheStats, MetadataCache};

#[derive(Debug)]
enum Location {
    /// `<dir>/<name>.json` per package
    Directory(Utf8PathBuf),
    Memory(BTreeMap<String, PackageDocument>),
}

/// A package index with its own document cache
#[derive(Debug)]
pub struct IndexSource {
    location: Location,
    cache: MetadataCache,
}

impl IndexSource {
    /// Index stored as one JSON file per package under `dir`
    pub fn directory(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            location: Location::Directory(dir.into()),
            cache: MetadataCache::new(),
        }
    }

    /// Index answered from documents held in memory
    pub fn in_memory(documents: impl IntoIterator<Item = PackageDocument>) -> Self {
        let documents = documents
            .into_iter()
            .map(|doc| (canonical_name(&doc.name), doc))
            .collect();
        Self {
            location: Location::Memory(documents),
            cache: MetadataCache::new(),
        }
    }

    pub fn path(&self) -> Option<&Utf8Path> {
        match &self.location {
            Location::Directory(dir) => Some(dir),
            Location::Memory(_) => None,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Forget every cached document
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// The package's document, or `None` when the index does not have it
    pub fn package(&self, name: &str) -> Result<Option<Arc<IndexedPackage>>, ProviderError> {
        self.cache.get_or_load(name, || self.load(name))
    }

    fn load(&self, name: &str) -> Result<Option<IndexedPackage>, ProviderError> {
        let document = match &self.location {
            Location::Memory(documents) => documents.get(name).cloned(),
            Location::Directory(dir) => {
                let path = dir.join(format!("{}.json", name));
                trace!("reading {}", path);
                match std::fs::read_to_string(&path) {
                    Ok(json) => Some(PackageDocument::from_json(&json).map_err(|e| {
                        ProviderError::unavailable(format!("invalid index document {}", path), e)
                    })?),
                    Err(e) if e.kind() == ErrorKind::NotFound => None,
                    Err(e) => {
                        return Err(ProviderError::unavailable(
                            format!("cannot read {}", path),
                            e,
                        ))
                    },
                }
            },
        };

        let Some(document) = document else {
            debug!("{} is not in the index", name);
            return Ok(None);
        };
        let package = IndexedPackage::try_from(document)?;
        if package.name != name {
            return Err(ProviderError::Unavailable {
                message: format!("index document for {} is named {}", name, package.name),
                cause: None,
            });
        }
        Ok(Some(package))
    }

    fn with_version<T>(
        &self,
        selector: &PackageSelector,
        version: &Version,
        f: impl FnOnce(&VersionDocument) -> Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        let package = self.package(selector.name())?;
        let document = package
            .as_deref()
            .and_then(|p| p.version(version))
            .ok_or_else(|| ProviderError::version_not_found(selector, version))?;
        f(document)
    }
}

impl MetadataProvider for IndexSource {
    fn list_versions(&self, selector: &PackageSelector) -> Result<Vec<Version>, ProviderError> {
        Ok(self
            .package(selector.name())?
            .map(|package| package.listed_versions())
            .unwrap_or_default())
    }

    fn requirements_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Vec<Dependency>, ProviderError> {
        self.with_version(selector, version, VersionDocument::dependencies)
    }

    fn fingerprint_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Fingerprint, ProviderError> {
        self.with_version(selector, version, VersionDocument::fingerprint)
    }
}
