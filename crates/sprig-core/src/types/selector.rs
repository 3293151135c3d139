//! Package identity: a canonical name plus an optional source.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a package within one source.
///
/// The same name served by two different sources is two different selectors.
/// Ordering is by name, then source, which is the resolver's tie-break order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageSelector {
    name: String,
    source: Option<String>,
}

impl PackageSelector {
    /// Selector for a package from the default registry
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: canonical_name(name.as_ref()),
            source: None,
        }
    }

    /// Selector for a package from a named source
    pub fn with_source(name: impl AsRef<str>, source: impl Into<String>) -> Self {
        Self {
            name: canonical_name(name.as_ref()),
            source: Some(source.into()),
        }
    }

    pub fn from_parts(name: impl AsRef<str>, source: Option<String>) -> Self {
        Self {
            name: canonical_name(name.as_ref()),
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// Normalize a package name: lowercase, with `_` and `.` folded into `-`
pub fn canonical_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '_' | '.' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

impl fmt::Display for PackageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} ({})", self.name, source),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names() {
        assert_eq!(PackageSelector::new("Foo_Bar.baz").name(), "foo-bar-baz");
        assert_eq!(PackageSelector::new("foo-bar-baz"), PackageSelector::new("FOO_BAR_BAZ"));
    }

    #[test]
    fn test_sources_are_distinct() {
        let default = PackageSelector::new("a");
        let mirrored = PackageSelector::with_source("a", "mirror");
        assert_ne!(default, mirrored);
        assert!(default < mirrored);
        assert_eq!(mirrored.to_string(), "a (mirror)");
    }

    #[test]
    fn test_ordering_by_name_first() {
        let mut selectors = vec![
            PackageSelector::with_source("b", "alt"),
            PackageSelector::new("c"),
            PackageSelector::new("a"),
            PackageSelector::new("b"),
        ];
        selectors.sort();
        let names: Vec<String> = selectors.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["a", "b", "b (alt)", "c"]);
    }
}
