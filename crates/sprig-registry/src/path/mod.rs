//! Packages read from a local directory holding a sprig.toml

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use sprig_config::toml::{parse_sprig_toml, SprigToml};
use sprig_config::{MANIFEST_FILE, PATH_SOURCE_PREFIX};
use sprig_core::{
    canonical_name, Dependency, Fingerprint, Marker, MetadataProvider, PackageSelector,
    ProviderError, Version, VersionReq,
};
use tracing::debug;

/// A single package version backed by a directory
#[derive(Debug, Clone)]
pub struct PathSource {
    /// Directory as written in the depending manifest, relative to the project
    relative: Utf8PathBuf,
    name: String,
    version: Version,
    dependencies: Vec<Dependency>,
    fingerprint: Fingerprint,
}

impl PathSource {
    /// Read `<project_root>/<relative>/sprig.toml`
    pub fn load(project_root: &Utf8Path, relative: &Utf8Path) -> Result<Self, ProviderError> {
        let manifest_path = project_root.join(relative).join(MANIFEST_FILE);
        let bytes = std::fs::read(&manifest_path)
            .map_err(|e| ProviderError::unavailable(format!("cannot read {}", manifest_path), e))?;
        let content = String::from_utf8_lossy(&bytes);
        let manifest = parse_sprig_toml(&content)
            .map_err(|e| ProviderError::unavailable(format!("invalid {}", manifest_path), e))?;

        let source = Self::from_manifest(relative, &manifest, Fingerprint::of_bytes(&bytes))?;
        debug!("loaded path package {} {} from {}", source.name, source.version, relative);
        Ok(source)
    }

    fn from_manifest(
        relative: &Utf8Path,
        manifest: &SprigToml,
        fingerprint: Fingerprint,
    ) -> Result<Self, ProviderError> {
        // Dev and optional dependencies of a path package are not installed
        let dependencies = manifest
            .dependencies
            .iter()
            .filter(|(_, spec)| !spec.is_optional())
            .map(|(name, spec)| {
                let constraint = spec.constraint().trim();
                let req = if constraint.is_empty() {
                    VersionReq::any()
                } else {
                    VersionReq::parse(constraint).map_err(|e| {
                        ProviderError::unavailable(format!("invalid requirement on {}", name), e)
                    })?
                };
                let source = match spec.path() {
                    Some(path) => Some(path_discriminator(&rebase(relative, path))),
                    None => spec.source().map(str::to_string),
                };
                let mut dependency =
                    Dependency::new(PackageSelector::from_parts(name, source), req.to_range());
                if let Some(markers) = spec.markers() {
                    let marker = Marker::parse(markers).map_err(|e| {
                        ProviderError::unavailable(format!("invalid markers on {}", name), e)
                    })?;
                    dependency = dependency.with_marker(marker);
                }
                Ok(dependency)
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(Self {
            relative: relative.to_path_buf(),
            name: canonical_name(&manifest.package.name),
            version: manifest.package.version.clone(),
            dependencies,
            fingerprint,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn relative(&self) -> &Utf8Path {
        &self.relative
    }

    fn check(&self, selector: &PackageSelector, version: &Version) -> Result<(), ProviderError> {
        if selector.name() == self.name && *version == self.version {
            Ok(())
        } else {
            Err(ProviderError::version_not_found(selector, version))
        }
    }
}

impl MetadataProvider for PathSource {
    fn list_versions(&self, selector: &PackageSelector) -> Result<Vec<Version>, ProviderError> {
        if selector.name() == self.name {
            Ok(vec![self.version.clone()])
        } else {
            Ok(Vec::new())
        }
    }

    fn requirements_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Vec<Dependency>, ProviderError> {
        self.check(selector, version)?;
        Ok(self.dependencies.clone())
    }

    fn fingerprint_of(
        &self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Fingerprint, ProviderError> {
        self.check(selector, version)?;
        Ok(self.fingerprint.clone())
    }
}

/// Source discriminator for a directory relative to the project root
pub fn path_discriminator(relative: &Utf8Path) -> String {
    format!("{}{}", PATH_SOURCE_PREFIX, relative)
}

/// `path` as seen from the project root, given it was written in the
/// manifest at `base`. `..` components are folded where possible.
pub fn rebase(base: &Utf8Path, path: &str) -> Utf8PathBuf {
    let joined = base.join(path);
    let mut parts: Vec<Utf8Component<'_>> = Vec::new();
    for component in joined.components() {
        match component {
            Utf8Component::CurDir => {},
            Utf8Component::ParentDir => match parts.last() {
                Some(Utf8Component::Normal(_)) => {
                    parts.pop();
                },
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return Utf8PathBuf::from(".");
    }
    parts.iter().map(|c| c.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LIB: &str = r#"
[package]
name = "Local_Lib"
version = "0.2.0"

[dependencies]
log = "^0.4"
helper = { path = "../helper" }
fancy = { version = "^1", optional = true }

[dev-dependencies]
pytest = "*"

[features]
fancy = ["fancy"]
"#;

    fn project() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("libs/local")).unwrap();
        std::fs::write(root.join("libs/local/sprig.toml"), LIB).unwrap();
        (temp, root)
    }

    #[test]
    fn test_load_path_package() {
        let (_temp, root) = project();
        let source = PathSource::load(&root, Utf8Path::new("libs/local")).unwrap();
        let selector = PackageSelector::with_source("local-lib", "path:libs/local");

        assert_eq!(source.name(), "local-lib");
        assert_eq!(source.list_versions(&selector).unwrap(), vec![Version::new(0, 2, 0)]);
        assert!(source.list_versions(&PackageSelector::new("other")).unwrap().is_empty());

        let deps = source.requirements_of(&selector, &Version::new(0, 2, 0)).unwrap();
        let names: Vec<String> = deps.iter().map(|d| d.selector.to_string()).collect();
        assert_eq!(names, vec!["helper (path:libs/helper)", "log"]);
    }

    #[test]
    fn test_fingerprint_is_manifest_hash() {
        let (_temp, root) = project();
        let source = PathSource::load(&root, Utf8Path::new("libs/local")).unwrap();
        let selector = PackageSelector::new("local-lib");
        let fp = source.fingerprint_of(&selector, &Version::new(0, 2, 0)).unwrap();
        assert_eq!(fp, Fingerprint::of_bytes(LIB.as_bytes()));
        assert!(source.fingerprint_of(&selector, &Version::new(9, 0, 0)).is_err());
    }

    #[test]
    fn test_missing_manifest() {
        let (_temp, root) = project();
        assert!(matches!(
            PathSource::load(&root, Utf8Path::new("libs/absent")),
            Err(ProviderError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_rebase() {
        assert_eq!(rebase(Utf8Path::new("libs/a"), "../b"), Utf8PathBuf::from("libs/b"));
        assert_eq!(rebase(Utf8Path::new("."), "./x"), Utf8PathBuf::from("x"));
        assert_eq!(rebase(Utf8Path::new("a"), "../../x"), Utf8PathBuf::from("../x"));
        assert_eq!(rebase(Utf8Path::new("a"), ".."), Utf8PathBuf::from("."));
        assert_eq!(rebase(Utf8Path::new("a"), "/abs/x"), Utf8PathBuf::from("/abs/x"));
    }
}
