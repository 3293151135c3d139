//! Dependency and declaration types.
//!
//! A [`Dependency`] is what a metadata source reports for one package
//! version. A [`Declaration`] is a direct requirement as written in a
//! manifest, before its constraint and marker strings have been parsed.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Marker, PackageSelector, TargetEnvironment, VersionRange};

/// A requirement of one package version on another package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub selector: PackageSelector,
    pub range: VersionRange,
    pub marker: Option<Marker>,
}

/// Type of dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Normal runtime dependency
    Normal,
    /// Development-only dependency
    Dev,
}

/// A direct requirement from the project manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub constraint: String,
    pub source: Option<String>,
    /// Feature groups gating this declaration; empty means unconditional
    pub groups: Vec<String>,
    pub marker: Option<String>,
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn new(selector: PackageSelector, range: VersionRange) -> Self {
        Self {
            selector,
            range,
            marker: None,
        }
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Whether this dependency applies on the given target
    pub fn applies_to(&self, env: &TargetEnvironment) -> bool {
        self.marker.as_ref().map_or(true, |m| m.evaluate(env))
    }
}

impl DependencyKind {
    /// Check if this dependency is only for development
    pub fn is_dev_only(&self) -> bool {
        matches!(self, DependencyKind::Dev)
    }
}

impl Declaration {
    /// Create a normal, unconditional declaration
    pub fn new(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
            source: None,
            groups: Vec::new(),
            marker: None,
            kind: DependencyKind::Normal,
        }
    }

    /// Create a development declaration
    pub fn dev(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            kind: DependencyKind::Dev,
            ..Self::new(name, constraint)
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Gate this declaration behind a feature group
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    pub fn selector(&self) -> PackageSelector {
        PackageSelector::from_parts(&self.name, self.source.clone())
    }

    pub fn is_optional(&self) -> bool {
        !self.groups.is_empty()
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = \"{}\"", self.name, self.constraint)?;
        if let Some(ref marker) = self.marker {
            write!(f, " ; {}", marker)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Version;

    #[test]
    fn test_declaration_creation() {
        let decl = Declaration::new("Serde_Json", "^1.0");
        assert_eq!(decl.kind, DependencyKind::Normal);
        assert!(!decl.is_optional());
        assert_eq!(decl.selector(), PackageSelector::new("serde-json"));
        assert_eq!(decl.to_string(), "Serde_Json = \"^1.0\"");
    }

    #[test]
    fn test_dev_and_grouped_declarations() {
        let decl = Declaration::dev("pytest", "*");
        assert!(decl.kind.is_dev_only());

        let gated = Declaration::new("d", "^1.0")
            .in_group("extra1")
            .with_source("mirror")
            .with_marker("os == 'linux'");
        assert!(gated.is_optional());
        assert_eq!(gated.selector().source(), Some("mirror"));
        assert_eq!(gated.to_string(), "d = \"^1.0\" ; os == 'linux'");
    }

    #[test]
    fn test_dependency_marker_filtering() {
        let dep = Dependency::new(
            PackageSelector::new("winapi"),
            VersionRange::higher_than(Version::new(0, 3, 0)),
        )
        .with_marker(Marker::parse("os == 'windows'").unwrap());

        assert!(!dep.applies_to(&TargetEnvironment::new().with("os", "linux")));
        assert!(dep.applies_to(&TargetEnvironment::new().with("os", "windows")));

        let plain = Dependency::new(PackageSelector::new("libc"), VersionRange::full());
        assert!(plain.applies_to(&TargetEnvironment::new()));
    }
}
