//! Routing metadata queries to the source a selector names.
//!
//! A selector without a source belongs to the default registry, a
//! `path:<dir>` source to a local directory, and any other source name to
//! the alternate index of that name in `[sources]`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use dashmap::DashMap;
use sprig_config::{Settings, PATH_SOURCE_PREFIX};
use sprig_core::error::SprigError;
use sprig_core::{Dependency, Fingerprint, MetadataProvider, PackageSelector, ProviderError, Version};
use tracing::debug;

use crate::cache::CacheStats;
use crate::index::IndexSource;
use crate::path::PathSource;
use crate::RegistryResult;

/// Every kind of place package metadata can come from
#[derive(Debug)]
pub enum Source {
    /// The default package index
    Registry(IndexSource),
    /// A local directory
    Path(PathSource),
    /// A named alternate index
    AlternateIndex { name: String, index: IndexSource },
}

impl Source {
    fn provider(&self) -> &dyn MetadataProvider {
        match self {
            Source::Registry(index) => index,
            Source::Path(path) => path,
            Source::AlternateIndex { index, .. } => index,
        }
    }

    fn index(&self) -> Option<&IndexSource> {
        match self {
            Source::Registry(index) | Source::AlternateIndex { index, .. } => Some(index),
            Source::Path(_) => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Registry(_) => write!(f, "registry"),
            Source::Path(path) => write!(f, "path {}", path.relative()),
            Source::AlternateIndex { name, .. } => write!(f, "index {}", name),
        }
    }
}

impl MetadataProvider for Source {
    fn list_versions(&self, selector: &PackageSelector) -> Result<Vec<Version>, ProviderError> {
        self.provider().list_versions(selector)
    }

    fn requirements_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Vec<Dependency>, ProviderError> {
        self.provider().requirements_of(selector, version)
    }

    fn fingerprint_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Fingerprint, ProviderError> {
        self.provider().fingerprint_of(selector, version)
    }
}

/// All sources configured for one project
#[derive(Debug)]
pub struct SourceSet {
    registry: Arc<Source>,
    alternates: BTreeMap<String, Arc<Source>>,
    /// Path dependencies are resolved against this directory
    project_root: Utf8PathBuf,
    /// Path sources, created on first use
    paths: DashMap<String, Arc<Source>>,
}

impl SourceSet {
    pub fn new(registry: IndexSource, project_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            registry: Arc::new(Source::Registry(registry)),
            alternates: BTreeMap::new(),
            project_root: project_root.into(),
            paths: DashMap::new(),
        }
    }

    /// Sources for a project from its merged settings
    pub fn from_settings(settings: &Settings, project_root: &Utf8Path) -> RegistryResult<Self> {
        let index = settings.index.as_ref().ok_or_else(|| {
            SprigError::validation(
                "registry.index",
                "no package index configured; set [registry] index, SPRIG_INDEX or --index",
            )
        })?;
        let mut set = Self::new(IndexSource::directory(index.clone()), project_root);
        for (name, dir) in &settings.sources {
            set = set.with_alternate(name.clone(), IndexSource::directory(dir.clone()));
        }
        Ok(set)
    }

    pub fn with_alternate(mut self, name: impl Into<String>, index: IndexSource) -> Self {
        let name = name.into();
        self.alternates.insert(
            name.clone(),
            Arc::new(Source::AlternateIndex { name, index }),
        );
        self
    }

    /// The source answering for `selector`
    pub fn route(&self, selector: &PackageSelector) -> Result<Arc<Source>, ProviderError> {
        match selector.source() {
            None => Ok(Arc::clone(&self.registry)),
            Some(source) => match source.strip_prefix(PATH_SOURCE_PREFIX) {
                Some(relative) => self.path_source(source, relative),
                None => self
                    .alternates
                    .get(source)
                    .cloned()
                    .ok_or_else(|| ProviderError::UnknownSource {
                        name: source.to_string(),
                    }),
            },
        }
    }

    fn path_source(&self, key: &str, relative: &str) -> Result<Arc<Source>, ProviderError> {
        if let Some(existing) = self.paths.get(key) {
            return Ok(Arc::clone(existing.value()));
        }
        let loaded = PathSource::load(&self.project_root, Utf8Path::new(relative))?;
        debug!("added path source {}", key);
        let entry = self
            .paths
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Source::Path(loaded)));
        Ok(Arc::clone(entry.value()))
    }

    /// Cache statistics summed over every index
    pub fn cache_stats(&self) -> CacheStats {
        let mut total = CacheStats::default();
        let indexes = std::iter::once(&self.registry).chain(self.alternates.values());
        for stats in indexes.filter_map(|s| s.index()).map(IndexSource::cache_stats) {
            total.total_entries += stats.total_entries;
            total.missing_packages += stats.missing_packages;
            total.hits += stats.hits;
            total.misses += stats.misses;
        }
        total
    }

    /// Drop cached documents so the next run re-reads every index
    pub fn clear_caches(&self) {
        let indexes = std::iter::once(&self.registry).chain(self.alternates.values());
        for index in indexes.filter_map(|s| s.index()) {
            index.clear_cache();
        }
        self.paths.clear();
    }
}

impl MetadataProvider for SourceSet {
    fn list_versions(&self, selector: &PackageSelector) -> Result<Vec<Version>, ProviderError> {
        self.route(selector)?.list_versions(selector)
    }

    fn requirements_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Vec<Dependency>, ProviderError> {
        self.route(selector)?.requirements_of(selector, version)
    }

    fn fingerprint_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Fingerprint, ProviderError> {
        self.route(selector)?.fingerprint_of(selector, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PackageDocument;
    use sprig_core::{Declaration, TargetEnvironment};
    use sprig_resolver::{expand, resolve, FeatureActivation};
    use tempfile::TempDir;

    fn document(json: &str) -> PackageDocument {
        PackageDocument::from_json(json).unwrap()
    }

    fn registry() -> IndexSource {
        IndexSource::in_memory([
            document(
                r#"{ "name": "app-core", "versions": {
                    "1.0.0": { "dependencies": { "tls": { "version": "^2", "source": "corp" } },
                               "dist": { "fingerprint": "blake3:0a" } } } }"#,
            ),
            document(
                r#"{ "name": "log", "versions": {
                    "0.4.0": { "dist": { "fingerprint": "blake3:0b" } },
                    "0.4.1": { "dist": { "fingerprint": "blake3:0c" } } } }"#,
            ),
        ])
    }

    fn corp() -> IndexSource {
        IndexSource::in_memory([document(
            r#"{ "name": "tls", "versions": {
                "2.1.0": { "dist": { "fingerprint": "blake3:0d" } } } }"#,
        )])
    }

    fn project_with_path_package() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("local")).unwrap();
        std::fs::write(
            root.join("local/sprig.toml"),
            "[package]\nname = \"local\"\nversion = \"0.1.0\"\n\n[dependencies]\nlog = \"^0.4\"\n",
        )
        .unwrap();
        (temp, root)
    }

    #[test]
    fn test_routing() {
        let (_temp, root) = project_with_path_package();
        let sources = SourceSet::new(registry(), &root).with_alternate("corp", corp());

        let registry_route = sources.route(&PackageSelector::new("log")).unwrap();
        assert_eq!(registry_route.to_string(), "registry");

        let corp_route = sources.route(&PackageSelector::with_source("tls", "corp")).unwrap();
        assert_eq!(corp_route.to_string(), "index corp");

        let path_route = sources
            .route(&PackageSelector::with_source("local", "path:local"))
            .unwrap();
        assert_eq!(path_route.to_string(), "path local");

        assert!(matches!(
            sources.route(&PackageSelector::with_source("x", "nowhere")),
            Err(ProviderError::UnknownSource { .. })
        ));
    }

    #[test]
    fn test_path_sources_are_created_once() {
        let (_temp, root) = project_with_path_package();
        let sources = SourceSet::new(registry(), &root);
        let selector = PackageSelector::with_source("local", "path:local");

        let first = sources.route(&selector).unwrap();
        std::fs::remove_file(root.join("local/sprig.toml")).unwrap();
        let second = sources.route(&selector).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        sources.clear_caches();
        assert!(sources.route(&selector).is_err());
    }

    #[test]
    fn test_same_name_from_different_sources() {
        let (_temp, root) = project_with_path_package();
        let sources = SourceSet::new(registry(), &root).with_alternate("corp", corp());
        assert_eq!(
            sources.list_versions(&PackageSelector::new("tls")).unwrap().len(),
            0
        );
        assert_eq!(
            sources
                .list_versions(&PackageSelector::with_source("tls", "corp"))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_resolve_across_sources() {
        let (_temp, root) = project_with_path_package();
        let sources = SourceSet::new(registry(), &root).with_alternate("corp", corp());
        let declarations = vec![
            Declaration::new("app-core", "^1.0"),
            Declaration::new("local", "").with_source("path:local"),
        ];
        let environment = TargetEnvironment::new();
        let root_requirements =
            expand(&declarations, &FeatureActivation::default(), &environment).unwrap();

        let resolution = resolve(&root_requirements, &sources, &environment).unwrap();
        let chosen: Vec<String> = resolution
            .iter()
            .map(|(selector, version)| format!("{} {}", selector, version))
            .collect();
        assert_eq!(
            chosen,
            vec![
                "app-core 1.0.0",
                "local (path:local) 0.1.0",
                "log 0.4.1",
                "tls (corp) 2.1.0",
            ]
        );
        assert!(sources.cache_stats().total_entries >= 3);
    }

    #[test]
    fn test_from_settings_requires_an_index() {
        let settings = Settings::default();
        assert!(SourceSet::from_settings(&settings, Utf8Path::new(".")).is_err());

        let settings = Settings {
            index: Some(Utf8PathBuf::from("/srv/index")),
            sources: BTreeMap::from([("corp".to_string(), Utf8PathBuf::from("/srv/corp"))]),
            ..Settings::default()
        };
        let sources = SourceSet::from_settings(&settings, Utf8Path::new(".")).unwrap();
        let corp = sources.route(&PackageSelector::with_source("a", "corp")).unwrap();
        assert_eq!(corp.to_string(), "index corp");
    }
}
