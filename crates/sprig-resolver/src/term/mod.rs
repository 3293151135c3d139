//! Terms: statements about the chosen version of one package.
//!
//! A positive term `a ∈ R` holds when `a` is selected at a version in `R`.
//! A negative term `¬(a ∈ R)` holds when `a` is not selected or is selected
//! outside `R`. Negative terms therefore admit the "not selected" state that
//! positive terms exclude, which is what makes the set operations below
//! asymmetric.

use std::fmt;

use sprig_core::{PackageSelector, Version, VersionRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    selector: PackageSelector,
    range: VersionRange,
    positive: bool,
}

/// How an accumulated assignment relates to a term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermRelation {
    Satisfied,
    Contradicted,
    Inconclusive,
}

impl Term {
    pub fn positive(selector: PackageSelector, range: VersionRange) -> Self {
        Self {
            selector,
            range,
            positive: true,
        }
    }

    pub fn negative(selector: PackageSelector, range: VersionRange) -> Self {
        Self {
            selector,
            range,
            positive: false,
        }
    }

    /// `selector == version`
    pub fn exact(selector: PackageSelector, version: Version) -> Self {
        Self::positive(selector, VersionRange::singleton(version))
    }

    pub fn selector(&self) -> &PackageSelector {
        &self.selector
    }

    pub fn range(&self) -> &VersionRange {
        &self.range
    }

    pub fn is_positive(&self) -> bool {
        self.positive
    }

    pub fn negate(&self) -> Term {
        Self {
            selector: self.selector.clone(),
            range: self.range.clone(),
            positive: !self.positive,
        }
    }

    /// `¬(a ∈ ∅)` holds in every assignment
    pub fn is_always_true(&self) -> bool {
        !self.positive && self.range.is_empty()
    }

    /// Whether selecting `version` satisfies this term
    pub fn contains(&self, version: &Version) -> bool {
        self.range.contains(version) == self.positive
    }

    /// Both terms hold. Terms must share a selector.
    pub fn intersection(&self, other: &Term) -> Term {
        debug_assert_eq!(self.selector, other.selector);
        let selector = self.selector.clone();
        match (self.positive, other.positive) {
            (true, true) => Term::positive(selector, self.range.intersection(&other.range)),
            (true, false) => Term::positive(selector, self.range.difference(&other.range)),
            (false, true) => Term::positive(selector, other.range.difference(&self.range)),
            (false, false) => Term::negative(selector, self.range.union(&other.range)),
        }
    }

    /// Either term holds. Terms must share a selector.
    pub fn union(&self, other: &Term) -> Term {
        debug_assert_eq!(self.selector, other.selector);
        let selector = self.selector.clone();
        match (self.positive, other.positive) {
            (true, true) => Term::positive(selector, self.range.union(&other.range)),
            (true, false) => Term::negative(selector, other.range.difference(&self.range)),
            (false, true) => Term::negative(selector, self.range.difference(&other.range)),
            (false, false) => Term::negative(selector, self.range.intersection(&other.range)),
        }
    }

    /// Every assignment satisfying `self` also satisfies `other`
    pub fn subset_of(&self, other: &Term) -> bool {
        self.intersection(other) == *self
    }

    /// No assignment satisfies both terms
    pub fn is_disjoint(&self, other: &Term) -> bool {
        match (self.positive, other.positive) {
            (true, true) => !self.range.allows_any(&other.range),
            (true, false) => self.range.subset_of(&other.range),
            (false, true) => other.range.subset_of(&self.range),
            (false, false) => false,
        }
    }

    /// Relation of this term to the accumulated term of its selector
    pub fn relation_with(&self, accumulated: &Term) -> TermRelation {
        if accumulated.subset_of(self) {
            TermRelation::Satisfied
        } else if accumulated.is_disjoint(self) {
            TermRelation::Contradicted
        } else {
            TermRelation::Inconclusive
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.positive {
            write!(f, "not ")?;
        }
        write!(f, "{} {}", self.selector, self.range)
    }
}
