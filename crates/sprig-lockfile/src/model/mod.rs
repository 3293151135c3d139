//! Lock file contents

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use sprig_core::error::SprigError;
use sprig_core::{Fingerprint, MetadataProvider, PackageSelector, Version};
use sprig_resolver::Resolution;

use crate::{LockfileResult, CURRENT_VERSION};

/// A whole sprig.lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    /// Lock format version
    pub version: u32,
    pub metadata: LockMetadata,
    /// One entry per selector, sorted by name then source
    #[serde(default, rename = "package")]
    pub packages: Vec<LockedPackage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LockMetadata {
    /// Hash of the manifest inputs the resolution was computed from
    pub content_hash: String,
}

/// One locked package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPackage {
    pub name: String,
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub fingerprint: Fingerprint,
    /// Resolved dependencies as `name` or `name (source)`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl LockedPackage {
    pub fn selector(&self) -> PackageSelector {
        PackageSelector::from_parts(&self.name, self.source.clone())
    }

    /// Selectors of the resolved dependencies
    pub fn dependency_selectors(&self) -> Vec<PackageSelector> {
        self.dependencies.iter().map(|d| parse_selector(d)).collect()
    }
}

/// Inverse of `PackageSelector`'s display form
fn parse_selector(text: &str) -> PackageSelector {
    match text.strip_suffix(')').and_then(|rest| rest.split_once(" (")) {
        Some((name, source)) => PackageSelector::with_source(name, source),
        None => PackageSelector::new(text),
    }
}

impl Lockfile {
    /// Lock a successful resolution. Fingerprints come from `provider`.
    pub fn from_resolution<P>(
        resolution: &Resolution,
        provider: &P,
        content_hash: impl Into<String>,
    ) -> LockfileResult<Self>
    where
        P: MetadataProvider + ?Sized,
    {
        let mut packages = Vec::with_capacity(resolution.len());
        // BTreeMap iteration gives (name, source) order
        for (selector, version) in resolution.iter() {
            let fingerprint = provider.fingerprint_of(selector, version).map_err(|e| {
                SprigError::Provider {
                    selector: format!("{} {}", selector, version),
                    message: e.to_string(),
                    source: Some(Box::new(e)),
                }
            })?;

            let mut dependencies: Vec<String> = resolution
                .dependencies
                .get(selector)
                .into_iter()
                .flatten()
                .map(|dep| dep.selector.to_string())
                .collect();
            dependencies.sort();
            dependencies.dedup();

            packages.push(LockedPackage {
                name: selector.name().to_string(),
                version: version.clone(),
                source: selector.source().map(str::to_string),
                fingerprint,
                dependencies,
            });
        }

        Ok(Self {
            version: CURRENT_VERSION,
            metadata: LockMetadata {
                content_hash: content_hash.into(),
            },
            packages,
        })
    }

    pub fn get(&self, selector: &PackageSelector) -> Option<&LockedPackage> {
        self.packages
            .iter()
            .find(|p| p.name == selector.name() && p.source.as_deref() == selector.source())
    }

    /// Locked versions, to be passed to the resolver as preferences
    pub fn preferences(&self) -> BTreeMap<PackageSelector, Version> {
        self.packages
            .iter()
            .map(|p| (p.selector(), p.version.clone()))
            .collect()
    }

    /// Packages ordered so that each comes after everything it depends on.
    /// Members of a dependency cycle keep their file order.
    pub fn install_plan(&self) -> Vec<&LockedPackage> {
        let index: BTreeMap<PackageSelector, usize> = self
            .packages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.selector(), i))
            .collect();

        let mut plan = Vec::with_capacity(self.packages.len());
        let mut visited = HashSet::new();
        for start in 0..self.packages.len() {
            if !visited.insert(start) {
                continue;
            }
            // Iterative post-order walk: (package, next dependency to visit)
            let mut stack = vec![(start, 0usize)];
            while let Some((current, next)) = stack.pop() {
                let deps = self.packages[current].dependency_selectors();
                let unvisited = deps[next..]
                    .iter()
                    .position(|dep| index.get(dep).map_or(false, |i| !visited.contains(i)));
                match unvisited {
                    Some(offset) => {
                        let dep_index = index[&deps[next + offset]];
                        stack.push((current, next + offset + 1));
                        visited.insert(dep_index);
                        stack.push((dep_index, 0));
                    },
                    None => plan.push(&self.packages[current]),
                }
            }
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{provider, resolution};
    use sprig_core::{OfflineProvider, TargetEnvironment, VersionReq};
    use sprig_resolver::{resolve, RootRequirements};

    #[test]
    fn test_from_resolution() {
        let provider = provider();
        let lock = Lockfile::from_resolution(&resolution(&provider), &provider, "abc").unwrap();

        assert_eq!(lock.version, CURRENT_VERSION);
        assert_eq!(lock.metadata.content_hash, "abc");
        let names: Vec<&str> = lock.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["app", "http", "log"]);
        assert_eq!(lock.packages[0].dependencies, vec!["http", "log"]);
        assert_eq!(lock.packages[2].version, Version::new(0, 4, 3));
        assert_eq!(
            lock.packages[1].fingerprint,
            provider
                .fingerprint_of(&PackageSelector::new("http"), &Version::new(1, 2, 0))
                .unwrap()
        );
    }

    #[test]
    fn test_preferences() {
        let provider = provider();
        let lock = Lockfile::from_resolution(&resolution(&provider), &provider, "abc").unwrap();
        let preferences = lock.preferences();
        assert_eq!(preferences.len(), 3);
        assert_eq!(
            preferences.get(&PackageSelector::new("http")),
            Some(&Version::new(1, 2, 0))
        );
    }

    #[test]
    fn test_sourced_dependencies() {
        let package = LockedPackage {
            name: "app".to_string(),
            version: Version::new(1, 0, 0),
            source: None,
            fingerprint: Fingerprint::of_bytes(b"app"),
            dependencies: vec!["local (path:libs/x)".to_string(), "tls (corp)".to_string(), "zlib".to_string()],
        };
        assert_eq!(
            package.dependency_selectors(),
            vec![
                PackageSelector::with_source("local", "path:libs/x"),
                PackageSelector::with_source("tls", "corp"),
                PackageSelector::new("zlib"),
            ]
        );
    }

    #[test]
    fn test_install_plan_puts_dependencies_first() {
        let provider = provider();
        let lock = Lockfile::from_resolution(&resolution(&provider), &provider, "abc").unwrap();
        let order: Vec<&str> = lock.install_plan().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, vec!["log", "http", "app"]);
    }

    #[test]
    fn test_install_plan_with_cycle() {
        let mut provider = OfflineProvider::new();
        provider
            .add("a", "1.0.0", &[("b", "*")])
            .unwrap()
            .add("b", "1.0.0", &[("a", "*")])
            .unwrap();
        let root: RootRequirements = [(PackageSelector::new("a"), VersionReq::any().to_range())]
            .into_iter()
            .collect();
        let resolved = resolve(&root, &provider, &TargetEnvironment::new()).unwrap();
        let lock = Lockfile::from_resolution(&resolved, &provider, "h").unwrap();

        let order: Vec<&str> = lock.install_plan().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }
}
