//! Version type with a strict total order.
//!
//! A version is `major.minor.patch` with optional pre-release (`-rc.1`) and
//! local (`+local.2`) qualifiers. Ordering compares the release tuple, then the
//! pre-release (a pre-release sorts below its final release), then the local
//! qualifier (no local sorts below any local). The order is consistent with
//! equality, which the interval algebra relies on.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Package version (major.minor.patch-prerelease+local)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub local: Option<String>,
}

/// Version parsing and validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version format: {input}")]
    InvalidFormat { input: String },

    #[error("Invalid number in version: {component}")]
    InvalidNumber { component: String },

    #[error("Invalid prerelease identifier: {prerelease}")]
    InvalidPrerelease { prerelease: String },

    #[error("Invalid local qualifier: {local}")]
    InvalidLocal { local: String },

    #[error("Invalid version requirement '{input}': {reason}")]
    InvalidRequirement { input: String, reason: String },
}

impl Version {
    /// Create a new release version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            local: None,
        }
    }

    /// Parse a version string
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        input.parse()
    }

    /// Attach a pre-release qualifier
    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = Some(prerelease.into());
        self
    }

    /// Attach a local qualifier
    pub fn with_local(mut self, local: impl Into<String>) -> Self {
        self.local = Some(local.into());
        self
    }

    /// Check if this is a prerelease version
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// The release part only, without qualifiers
    pub fn release(&self) -> Version {
        Version::new(self.major, self.minor, self.patch)
    }
}

/// Compare dot-separated qualifier identifiers.
///
/// Numeric identifiers compare numerically and sort below alphanumeric ones.
/// A shorter list sorts first when it is a prefix of the longer one. Ties
/// between spellings of the same number ("01" and "1") fall back to the raw
/// text so the result is never `Equal` for different strings.
fn compare_identifiers(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(m), Ok(n)) => m.cmp(&n),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            },
        }
    }
}

fn valid_identifiers(input: &str, allow_hyphen: bool) -> bool {
    !input.is_empty()
        && input.split('.').all(|ident| {
            !ident.is_empty()
                && ident
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || (allow_hyphen && c == '-'))
        })
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let body = input
            .strip_prefix('v')
            .or_else(|| input.strip_prefix('V'))
            .unwrap_or(input);

        // Split on '+' for the local qualifier
        let (version_part, local) = match body.split_once('+') {
            Some((v, l)) => {
                if !valid_identifiers(l, true) {
                    return Err(VersionError::InvalidLocal {
                        local: l.to_string(),
                    });
                }
                (v, Some(l.to_string()))
            },
            None => (body, None),
        };

        // Split on the first '-' for the prerelease
        let (core_part, prerelease) = match version_part.split_once('-') {
            Some((c, p)) => {
                if !valid_identifiers(p, true) {
                    return Err(VersionError::InvalidPrerelease {
                        prerelease: p.to_string(),
                    });
                }
                (c, Some(p.to_string()))
            },
            None => (version_part, None),
        };

        // Parse major[.minor[.patch]]
        let parts: Vec<&str> = core_part.split('.').collect();
        if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(VersionError::InvalidFormat {
                input: input.to_string(),
            });
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| VersionError::InvalidNumber {
                component: part.to_string(),
            })?;
        }

        Ok(Version {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            prerelease,
            local,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;

        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }

        if let Some(ref local) = self.local {
            write!(f, "+{}", local)?;
        }

        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_identifiers(a, b),
            })
            .then_with(|| match (&self.local, &other.local) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => compare_identifiers(a, b),
            })
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    #[test]
    fn test_version_parsing() {
        let v = Version::from_str("1.2.3").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 2);
        assert_eq!(v.patch, 3);
        assert_eq!(v.prerelease, None);
        assert_eq!(v.local, None);
    }

    #[test]
    fn test_short_versions() {
        assert_eq!(v("1"), Version::new(1, 0, 0));
        assert_eq!(v("1.4"), Version::new(1, 4, 0));
        assert_eq!(v("v2.0.1"), Version::new(2, 0, 1));
    }

    #[test]
    fn test_version_with_qualifiers() {
        let parsed = v("1.2.3-alpha.1+ubuntu.2");
        assert_eq!(parsed.prerelease.as_deref(), Some("alpha.1"));
        assert_eq!(parsed.local.as_deref(), Some("ubuntu.2"));
        assert_eq!(parsed.to_string(), "1.2.3-alpha.1+ubuntu.2");
    }

    #[test]
    fn test_invalid_versions() {
        assert!(Version::from_str("").is_err());
        assert!(Version::from_str("1.2.3.4").is_err());
        assert!(Version::from_str("1..2").is_err());
        assert!(Version::from_str("a.b.c").is_err());
        assert!(Version::from_str("1.0.0-").is_err());
        assert!(Version::from_str("1.0.0+").is_err());
        assert!(Version::from_str("1.0.0-rc..1").is_err());
    }

    #[test]
    fn test_version_comparison() {
        assert!(v("1.0.0") < v("2.0.0"));
        assert!(v("1.0.0") < v("1.1.0"));
        assert!(v("1.1.0") < v("2.0.0"));
    }

    #[test]
    fn test_prerelease_sorts_below_release() {
        assert!(v("1.0.0-rc.1") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-alpha.1"));
        assert!(v("1.0.0-alpha.1") < v("1.0.0-alpha.beta"));
        assert!(v("1.0.0-beta.2") < v("1.0.0-beta.11"));
        assert!(v("1.0.0-rc.1") < v("1.0.0-rc.1+local"));
        assert!(v("0.9.9") < v("1.0.0-alpha"));
    }

    #[test]
    fn test_local_sorts_above_plain() {
        assert!(v("1.0.0") < v("1.0.0+1"));
        assert!(v("1.0.0+1") < v("1.0.0+2"));
        assert!(v("1.0.0+2") < v("1.0.1"));
    }

    #[test]
    fn test_order_consistent_with_eq() {
        let a = v("1.0.0-01");
        let b = v("1.0.0-1");
        assert_ne!(a, b);
        assert_ne!(a.cmp(&b), Ordering::Equal);
    }
}
