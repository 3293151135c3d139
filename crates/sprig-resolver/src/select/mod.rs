//! Candidate version selection
//!
//! Picks which listed version of a package to try next, preferring the
//! highest stable version and falling back to pre-releases only when nothing
//! stable fits.

use sprig_core::{Version, VersionRange};

/// Version selector over one package's listed versions
#[derive(Debug, Clone, Copy)]
pub struct VersionSelector<'a> {
    /// Available versions sorted in ascending order, without duplicates
    available: &'a [Version],
}

impl<'a> VersionSelector<'a> {
    /// Create a selector over versions sorted ascending
    pub fn new(available: &'a [Version]) -> Self {
        Self { available }
    }

    /// Select highest version inside the range
    pub fn select_best(&self, range: &VersionRange) -> Option<&'a Version> {
        self.available.iter().rev().find(|v| range.contains(v))
    }

    /// Select highest stable version (no prerelease) inside the range
    pub fn select_best_stable(&self, range: &VersionRange) -> Option<&'a Version> {
        self.available
            .iter()
            .rev()
            .filter(|v| !v.is_prerelease())
            .find(|v| range.contains(v))
    }

    /// Select version with preference for stability
    pub fn select_preferred(
        &self,
        range: &VersionRange,
        allow_prerelease: bool,
    ) -> Option<&'a Version> {
        if allow_prerelease {
            self.select_best(range)
        } else {
            // Pre-releases only when the range admits nothing stable
            self.select_best_stable(range)
                .or_else(|| self.select_best(range))
        }
    }

    /// Use `preferred` when it is listed and still allowed
    pub fn select_locked(&self, range: &VersionRange, preferred: &Version) -> Option<&'a Version> {
        let idx = self.available.binary_search(preferred).ok()?;
        let version = &self.available[idx];
        range.contains(version).then_some(version)
    }

    /// Find all versions inside the range
    pub fn find_matching(&self, range: &VersionRange) -> Vec<&'a Version> {
        self.available.iter().filter(|v| range.contains(v)).collect()
    }

    pub fn count_matching(&self, range: &VersionRange) -> usize {
        self.available.iter().filter(|v| range.contains(v)).count()
    }

    /// Get the highest available version
    pub fn highest_version(&self) -> Option<&'a Version> {
        self.available.last()
    }

    /// Get the lowest available version
    pub fn lowest_version(&self) -> Option<&'a Version> {
        self.available.first()
    }

    pub fn has_matching(&self, range: &VersionRange) -> bool {
        self.available.iter().any(|v| range.contains(v))
    }
}
