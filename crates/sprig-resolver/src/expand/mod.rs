//! Turning manifest declarations into root requirements.
//!
//! Every declaration is parsed up front, so a malformed constraint fails the
//! run even when the declaration would have been filtered out. Declarations
//! then pass two gates: feature activation and the environment marker.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use sprig_core::{Declaration, Marker, PackageSelector, TargetEnvironment, VersionRange, VersionReq};

use crate::error::ResolveError;
use crate::ResolverResult;

/// Root constraints per selector, merged by intersection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootRequirements {
    requirements: BTreeMap<PackageSelector, VersionRange>,
    prereleases: BTreeSet<PackageSelector>,
}

impl RootRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `selector ∈ range`, narrowing any existing requirement
    pub fn add(&mut self, selector: PackageSelector, range: VersionRange) {
        let merged = match self.requirements.get(&selector) {
            Some(existing) => existing.intersection(&range),
            None => range,
        };
        self.requirements.insert(selector, merged);
    }

    /// Let candidate selection consider pre-releases of `selector`
    pub fn allow_prerelease(&mut self, selector: PackageSelector) {
        self.prereleases.insert(selector);
    }

    pub fn allows_prerelease(&self, selector: &PackageSelector) -> bool {
        self.prereleases.contains(selector)
    }

    pub fn get(&self, selector: &PackageSelector) -> Option<&VersionRange> {
        self.requirements.get(selector)
    }

    pub fn contains(&self, selector: &PackageSelector) -> bool {
        self.requirements.contains_key(selector)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PackageSelector, &VersionRange)> {
        self.requirements.iter()
    }

    pub fn selectors(&self) -> impl Iterator<Item = &PackageSelector> {
        self.requirements.keys()
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

impl FromIterator<(PackageSelector, VersionRange)> for RootRequirements {
    fn from_iter<I: IntoIterator<Item = (PackageSelector, VersionRange)>>(iter: I) -> Self {
        let mut root = Self::new();
        for (selector, range) in iter {
            root.add(selector, range);
        }
        root
    }
}

/// The feature groups and dependency kinds included in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureActivation {
    groups: BTreeSet<String>,
    include_dev: bool,
}

impl Default for FeatureActivation {
    fn default() -> Self {
        Self {
            groups: BTreeSet::new(),
            include_dev: true,
        }
    }
}

impl FeatureActivation {
    /// Resolve the requested groups against those the manifest defines
    pub fn select<'a>(
        defined: impl IntoIterator<Item = &'a str>,
        requested: &[String],
        all_features: bool,
    ) -> ResolverResult<Self> {
        if all_features && !requested.is_empty() {
            return Err(ResolveError::FeatureSelection {
                message: "You cannot specify explicit `--features` while installing using `--all-features`."
                    .to_string(),
            });
        }

        let defined: BTreeSet<String> = defined.into_iter().map(str::to_string).collect();
        if all_features {
            return Ok(Self {
                groups: defined,
                ..Self::default()
            });
        }

        let mut groups = BTreeSet::new();
        for name in requested {
            if !defined.contains(name) {
                return Err(ResolveError::FeatureSelection {
                    message: format!("Feature [{}] is not specified.", name),
                });
            }
            groups.insert(name.clone());
        }
        Ok(Self {
            groups,
            ..Self::default()
        })
    }

    pub fn with_dev(mut self, include_dev: bool) -> Self {
        self.include_dev = include_dev;
        self
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    pub fn includes_dev(&self) -> bool {
        self.include_dev
    }

    /// Whether the kind and group gates admit a declaration
    pub fn admits(&self, declaration: &Declaration) -> bool {
        if declaration.kind.is_dev_only() && !self.include_dev {
            return false;
        }
        !declaration.is_optional() || declaration.groups.iter().any(|g| self.groups.contains(g))
    }
}

struct Parsed<'a> {
    declaration: &'a Declaration,
    req: VersionReq,
    marker: Option<Marker>,
}

fn parse_declaration(declaration: &Declaration) -> ResolverResult<Parsed<'_>> {
    let malformed = |reason: String| ResolveError::MalformedConstraint {
        declaration: declaration.to_string(),
        reason,
    };

    let constraint = declaration.constraint.trim();
    let req = if constraint.is_empty() {
        VersionReq::any()
    } else {
        VersionReq::parse(constraint).map_err(|e| malformed(e.to_string()))?
    };
    let marker = declaration
        .marker
        .as_deref()
        .map(Marker::parse)
        .transpose()
        .map_err(|e| malformed(e.to_string()))?;

    Ok(Parsed {
        declaration,
        req,
        marker,
    })
}

/// Compute the root requirements for one run
pub fn expand(
    declarations: &[Declaration],
    activation: &FeatureActivation,
    environment: &TargetEnvironment,
) -> ResolverResult<RootRequirements> {
    let parsed = declarations
        .iter()
        .map(parse_declaration)
        .collect::<ResolverResult<Vec<_>>>()?;

    let mut root = RootRequirements::new();
    for entry in parsed {
        let declaration = entry.declaration;
        if !activation.admits(declaration) {
            debug!("{} is not activated, skipping", declaration.name);
            continue;
        }
        if let Some(ref marker) = entry.marker {
            if !marker.evaluate(environment) {
                debug!("{} does not apply to the target ({}), skipping", declaration.name, marker);
                continue;
            }
        }

        let selector = declaration.selector();
        if entry.req.mentions_prerelease() {
            root.allow_prerelease(selector.clone());
        }
        root.add(selector, entry.req.to_range());
    }

    debug!("expanded {} declarations into {} root requirements", declarations.len(), root.len());
    Ok(root)
}
