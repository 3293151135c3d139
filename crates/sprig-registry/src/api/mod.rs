//! Package index document types
//!
//! An index holds one JSON document per package:
//!
//! ```json
//! {
//!   "name": "http",
//!   "versions": {
//!     "1.4.2": {
//!       "dependencies": { "log": "^0.4", "winapi": { "version": "*", "markers": "os == 'windows'" } },
//!       "dist": { "fingerprint": "blake3:…" },
//!       "yanked": false
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sprig_core::{
    canonical_name, Dependency, Fingerprint, Marker, PackageSelector, ProviderError, Version,
    VersionReq,
};

/// One package as stored in an index
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PackageDocument {
    /// Package name
    pub name: String,
    /// All published versions, keyed by version string
    #[serde(default)]
    pub versions: BTreeMap<String, VersionDocument>,
}

/// Metadata for a specific package version
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VersionDocument {
    /// Dependencies by package name
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyDocument>,
    /// Distribution information
    pub dist: DistInfo,
    /// Withdrawn versions stay readable but are never offered as candidates
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub yanked: bool,
}

/// A dependency entry: a bare requirement or a table
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DependencyDocument {
    Simple(String),
    Detailed {
        version: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        markers: Option<String>,
    },
}

/// Distribution information for a package artifact
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DistInfo {
    /// Content hash, `algorithm:hex`
    pub fingerprint: String,
    /// Download location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Artifact size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A document with its version keys parsed
#[derive(Debug, Clone)]
pub struct IndexedPackage {
    pub name: String,
    versions: BTreeMap<Version, VersionDocument>,
}

impl PackageDocument {
    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl DependencyDocument {
    fn requirement(&self) -> &str {
        match self {
            DependencyDocument::Simple(version) => version,
            DependencyDocument::Detailed { version, .. } => version,
        }
    }

    fn source(&self) -> Option<&str> {
        match self {
            DependencyDocument::Detailed { source, .. } => source.as_deref(),
            DependencyDocument::Simple(_) => None,
        }
    }

    fn markers(&self) -> Option<&str> {
        match self {
            DependencyDocument::Detailed { markers, .. } => markers.as_deref(),
            DependencyDocument::Simple(_) => None,
        }
    }

    /// Convert into a resolver dependency on `name`
    pub fn to_dependency(&self, name: &str) -> Result<Dependency, ProviderError> {
        let req = VersionReq::parse(self.requirement()).map_err(|e| {
            ProviderError::unavailable(format!("invalid requirement on {}", name), e)
        })?;
        let selector = PackageSelector::from_parts(name, self.source().map(str::to_string));
        let mut dependency = Dependency::new(selector, req.to_range());
        if let Some(markers) = self.markers() {
            let marker = Marker::parse(markers).map_err(|e| {
                ProviderError::unavailable(format!("invalid markers on {}", name), e)
            })?;
            dependency = dependency.with_marker(marker);
        }
        Ok(dependency)
    }
}

impl VersionDocument {
    /// Declared dependencies, sorted by name
    pub fn dependencies(&self) -> Result<Vec<Dependency>, ProviderError> {
        self.dependencies
            .iter()
            .map(|(name, dependency)| dependency.to_dependency(name))
            .collect()
    }

    pub fn fingerprint(&self) -> Result<Fingerprint, ProviderError> {
        self.dist
            .fingerprint
            .parse()
            .map_err(|e| ProviderError::unavailable("invalid dist fingerprint", e))
    }
}

impl TryFrom<PackageDocument> for IndexedPackage {
    type Error = ProviderError;

    fn try_from(document: PackageDocument) -> Result<Self, Self::Error> {
        let mut versions = BTreeMap::new();
        for (raw, version) in document.versions {
            let parsed = Version::parse(&raw).map_err(|e| {
                ProviderError::unavailable(format!("{} lists a malformed version", document.name), e)
            })?;
            versions.insert(parsed, version);
        }
        Ok(Self {
            name: canonical_name(&document.name),
            versions,
        })
    }
}

impl IndexedPackage {
    /// Versions that may be chosen, oldest first
    pub fn listed_versions(&self) -> Vec<Version> {
        self.versions
            .iter()
            .filter(|(_, doc)| !doc.yanked)
            .map(|(version, _)| version.clone())
            .collect()
    }

    /// Metadata of one version, yanked or not
    pub fn version(&self, version: &Version) -> Option<&VersionDocument> {
        self.versions.get(version)
    }

    pub fn is_yanked(&self, version: &Version) -> bool {
        self.versions.get(version).map_or(false, |doc| doc.yanked)
    }
}
