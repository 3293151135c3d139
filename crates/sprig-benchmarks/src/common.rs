//! Shared criterion settings and generated registries

use std::time::Duration;

use criterion::Criterion;
use sprig_core::{OfflineProvider, PackageSelector, VersionReq};
use sprig_resolver::RootRequirements;

pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(Duration::from_secs(3))
        .measurement_time(Duration::from_secs(10))
        .sample_size(50)
}

/// `layers` rows of `width` packages with `versions` versions each. Every
/// package depends on each package of the next row with `^1.0`.
pub fn layered_registry(layers: usize, width: usize, versions: usize) -> OfflineProvider {
    let mut provider = OfflineProvider::new();
    for layer in 0..layers {
        let next: Vec<String> = if layer + 1 < layers {
            (0..width).map(|i| package_name(layer + 1, i)).collect()
        } else {
            Vec::new()
        };
        let dependencies: Vec<(&str, &str)> = next.iter().map(|n| (n.as_str(), "^1.0")).collect();
        for i in 0..width {
            let name = package_name(layer, i);
            for minor in 0..versions {
                let version = format!("1.{}.0", minor);
                provider
                    .add(&name, &version, &dependencies)
                    .expect("generated versions parse");
            }
        }
    }
    provider
}

/// A registry where only the oldest of `versions` releases of `a` fits
/// the constraint `b` places on `c`, so the search rejects every newer `a`.
pub fn backtracking_registry(versions: usize) -> OfflineProvider {
    let mut provider = OfflineProvider::new();
    for minor in 0..versions {
        let version = format!("1.{}.0", minor);
        let floor = format!(">={}", version);
        provider
            .add("a", &version, &[("c", floor.as_str())])
            .expect("generated versions parse")
            .add("c", &version, &[])
            .expect("generated versions parse");
    }
    provider
        .add("b", "1.0.0", &[("c", "<1.1.0")])
        .expect("generated versions parse");
    provider
}

/// Root requirements on the first row of a layered registry
pub fn layered_root(width: usize) -> RootRequirements {
    (0..width)
        .map(|i| (PackageSelector::new(package_name(0, i)), VersionReq::any().to_range()))
        .collect()
}

pub fn root_of(names: &[&str]) -> RootRequirements {
    names
        .iter()
        .map(|name| (PackageSelector::new(*name), VersionReq::any().to_range()))
        .collect()
}

fn package_name(layer: usize, index: usize) -> String {
    format!("pkg-{}-{}", layer, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_core::{TargetEnvironment, Version};
    use sprig_resolver::resolve;

    #[test]
    fn test_layered_registry_resolves_to_latest() {
        let provider = layered_registry(3, 4, 5);
        let resolution = resolve(&layered_root(4), &provider, &TargetEnvironment::new()).unwrap();
        assert_eq!(resolution.len(), 12);
        assert!(resolution.iter().all(|(_, v)| *v == Version::new(1, 4, 0)));
    }

    #[test]
    fn test_backtracking_registry_settles_on_oldest() {
        let provider = backtracking_registry(20);
        let resolution =
            resolve(&root_of(&["a", "b"]), &provider, &TargetEnvironment::new()).unwrap();
        assert_eq!(
            resolution.version_of(&PackageSelector::new("a")),
            Some(&Version::new(1, 0, 0))
        );
        assert_eq!(
            resolution.version_of(&PackageSelector::new("c")),
            Some(&Version::new(1, 0, 0))
        );
    }
}
