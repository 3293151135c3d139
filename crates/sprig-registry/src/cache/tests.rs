//! Unit tests for the document cache

use super::*;
use crate::api::PackageDocument;
use std::sync::atomic::AtomicUsize;

fn create_test_package(name: &str) -> IndexedPackage {
    let json = format!(
        r#"{{ "name": "{}", "versions": {{ "1.0.0": {{ "dist": {{ "fingerprint": "blake3:00ff" }} }} }} }}"#,
        name
    );
    IndexedPackage::try_from(PackageDocument::from_json(&json).unwrap()).unwrap()
}

#[test]
fn test_metadata_cache_insert_and_get() {
    let cache = MetadataCache::new();
    cache.insert("test-package".to_string(), Some(Arc::new(create_test_package("test-package"))));

    let entry = cache.get("test-package").unwrap();
    assert_eq!(entry.package.unwrap().name, "test-package");
}

#[test]
fn test_metadata_cache_get_nonexistent() {
    let cache = MetadataCache::new();
    assert!(cache.get("nonexistent-package").is_none());
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn test_first_insert_wins() {
    let cache = MetadataCache::new();
    let first = cache.insert("a".to_string(), Some(Arc::new(create_test_package("a"))));
    let second = cache.insert("a".to_string(), None);
    assert!(first.is_some());
    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
}

#[test]
fn test_missing_packages_are_cached() {
    let cache = MetadataCache::new();
    let loads = AtomicUsize::new(0);
    for _ in 0..3 {
        let result: Result<_, ()> = cache.get_or_load("ghost", || {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });
        assert!(result.unwrap().is_none());
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().missing_packages, 1);
}

#[test]
fn test_failed_loads_are_not_cached() {
    let cache = MetadataCache::new();
    let failed: Result<_, &str> = cache.get_or_load("a", || Err("disk on fire"));
    assert!(failed.is_err());
    assert_eq!(cache.stats().total_entries, 0);

    let loaded: Result<_, &str> = cache.get_or_load("a", || Ok(Some(create_test_package("a"))));
    assert!(loaded.unwrap().is_some());
    assert!(cache.get("a").unwrap().package.is_some());
}

#[test]
fn test_concurrent_loads_agree() {
    let owned = MetadataCache::new();
    let cache = &owned;
    let results: Vec<Arc<IndexedPackage>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(move || {
                    let result: Result<_, ()> =
                        cache.get_or_load("shared", || Ok(Some(create_test_package("shared"))));
                    result.unwrap().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for result in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], result));
    }
    assert_eq!(cache.stats().total_entries, 1);
}

#[test]
fn test_cache_stats() {
    let cache = MetadataCache::new();

    let stats = cache.stats();
    assert_eq!(stats, CacheStats::default());

    cache.insert("test-package".to_string(), Some(Arc::new(create_test_package("test-package"))));
    cache.insert("another-package".to_string(), None);
    cache.get("test-package");

    let stats = cache.stats();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.missing_packages, 1);
    assert_eq!(stats.hits, 1);
}

#[test]
fn test_cache_clear() {
    let cache = MetadataCache::new();
    cache.insert("test-package".to_string(), None);
    assert!(cache.get("test-package").is_some());

    cache.clear();
    assert!(cache.get("test-package").is_none());
    assert_eq!(cache.stats().total_entries, 0);
}
