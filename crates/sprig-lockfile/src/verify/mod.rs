//! Freshness and integrity checks against the current manifest and sources

use sprig_core::error::SprigError;
use sprig_core::MetadataProvider;
use tracing::{debug, warn};

use crate::model::Lockfile;
use crate::LockfileResult;

impl Lockfile {
    /// Whether the lock was computed from manifest inputs hashing to `content_hash`
    pub fn is_fresh(&self, content_hash: &str) -> bool {
        self.metadata.content_hash == content_hash
    }

    pub fn ensure_fresh(&self, content_hash: &str) -> LockfileResult<()> {
        if self.is_fresh(content_hash) {
            Ok(())
        } else {
            Err(SprigError::StaleLockfile {
                reason: format!(
                    "resolution inputs changed since locking (locked {}, now {})",
                    self.metadata.content_hash, content_hash
                ),
            })
        }
    }

    /// Compare every locked fingerprint with what the sources report now
    pub fn verify<P>(&self, provider: &P) -> LockfileResult<()>
    where
        P: MetadataProvider + ?Sized,
    {
        for package in &self.packages {
            let selector = package.selector();
            let current = provider
                .fingerprint_of(&selector, &package.version)
                .map_err(|e| SprigError::Provider {
                    selector: format!("{} {}", selector, package.version),
                    message: e.to_string(),
                    source: Some(Box::new(e)),
                })?;
            if current != package.fingerprint {
                warn!("fingerprint of {} {} changed", selector, package.version);
                return Err(SprigError::IntegrityFailure {
                    package: format!("{} {}", selector, package.version),
                    expected: package.fingerprint.to_string(),
                    actual: current.to_string(),
                });
            }
        }
        debug!("verified {} locked packages", self.packages.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{provider, resolution};
    use sprig_core::{Fingerprint, PackageSelector, TargetEnvironment, Version, VersionReq};
    use sprig_resolver::{Resolver, RootRequirements};

    #[test]
    fn test_freshness() {
        let provider = provider();
        let lock = Lockfile::from_resolution(&resolution(&provider), &provider, "blake3:aa").unwrap();
        assert!(lock.is_fresh("blake3:aa"));
        assert!(lock.ensure_fresh("blake3:aa").is_ok());
        assert!(matches!(
            lock.ensure_fresh("blake3:bb"),
            Err(SprigError::StaleLockfile { .. })
        ));
    }

    #[test]
    fn test_verify_detects_changed_fingerprint() {
        let provider = provider();
        let mut lock =
            Lockfile::from_resolution(&resolution(&provider), &provider, "blake3:aa").unwrap();
        assert!(lock.verify(&provider).is_ok());

        lock.packages[1].fingerprint = Fingerprint::of_bytes(b"tampered");
        match lock.verify(&provider) {
            Err(SprigError::IntegrityFailure { package, .. }) => assert_eq!(package, "http 1.2.0"),
            other => panic!("expected an integrity failure, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_reports_missing_versions() {
        let provider = provider();
        let mut lock =
            Lockfile::from_resolution(&resolution(&provider), &provider, "blake3:aa").unwrap();
        lock.packages[2].version = Version::new(9, 9, 9);
        assert!(matches!(lock.verify(&provider), Err(SprigError::Provider { .. })));
    }

    #[test]
    fn test_preferences_reproduce_the_lock() {
        let mut provider = provider();
        let lock = Lockfile::from_resolution(&resolution(&provider), &provider, "h").unwrap();

        // A newer log appears after locking
        provider.add("log", "0.4.9", &[]).unwrap();

        let root: RootRequirements = [(PackageSelector::new("app"), VersionReq::any().to_range())]
            .into_iter()
            .collect();
        let environment = TargetEnvironment::new();
        let relocked = Resolver::new(&provider, &environment)
            .with_preferences(lock.preferences())
            .resolve(&root)
            .unwrap();
        let again = Lockfile::from_resolution(&relocked, &provider, "h").unwrap();
        assert_eq!(again.to_toml_string().unwrap(), lock.to_toml_string().unwrap());

        let fresh = resolution(&provider);
        assert_eq!(
            fresh.version_of(&PackageSelector::new("log")),
            Some(&Version::new(0, 4, 9))
        );
    }
}
