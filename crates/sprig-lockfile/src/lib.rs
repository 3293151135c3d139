//! The sprig.lock file
//!
//! A lock file records one successful resolution: every chosen package with
//! its version, source, content fingerprint and resolved dependencies, plus
//! the hash of the manifest inputs it was computed from. Writing an unchanged
//! resolution reproduces the file byte for byte.

pub mod io;
pub mod model;
pub mod verify;

pub use model::{LockMetadata, LockedPackage, Lockfile};

use sprig_core::error::SprigError;

/// File name of the lock file, next to sprig.toml
pub const LOCKFILE_NAME: &str = "sprig.lock";

/// Newest lock format this build reads and the one it writes
pub const CURRENT_VERSION: u32 = 1;

/// Result type for lock file operations
pub type LockfileResult<T> = Result<T, SprigError>;

#[cfg(test)]
pub(crate) mod testing {
    use sprig_core::{OfflineProvider, PackageSelector, TargetEnvironment, VersionReq};
    use sprig_resolver::{resolve, Resolution, RootRequirements};

    pub fn provider() -> OfflineProvider {
        let mut provider = OfflineProvider::new();
        provider
            .add("app", "1.0.0", &[("http", "^1.0"), ("log", "^0.4")])
            .unwrap()
            .add("http", "1.2.0", &[("log", ">=0.4.1")])
            .unwrap()
            .add("log", "0.4.0", &[])
            .unwrap()
            .add("log", "0.4.3", &[])
            .unwrap();
        provider
    }

    pub fn resolution(provider: &OfflineProvider) -> Resolution {
        let root: RootRequirements = [(PackageSelector::new("app"), VersionReq::any().to_range())]
            .into_iter()
            .collect();
        resolve(&root, provider, &TargetEnvironment::new()).unwrap()
    }
}
