//! Incompatibilities: sets of terms that must not all hold at once.
//!
//! Every fact the solver knows is an incompatibility: the root requirements,
//! "no versions match", one per dependency edge, and everything learned from
//! conflicts. Learned incompatibilities reference the two they were derived
//! from, so the store doubles as the proof of an eventual failure.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use sprig_core::{Dependency, PackageSelector, Version, VersionRange};

use crate::term::{Term, TermRelation};

/// Index of an incompatibility in its store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IncompatId(usize);

impl IncompatId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Why an incompatibility exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause {
    /// The root requires `selector ∈ range`
    Root {
        selector: PackageSelector,
        range: VersionRange,
    },
    /// No listed version of `selector` falls in `range`
    NoVersions {
        selector: PackageSelector,
        range: VersionRange,
    },
    /// `depender` at `version` requires `dependency ∈ range`
    Dependency {
        depender: PackageSelector,
        version: Version,
        dependency: PackageSelector,
        range: VersionRange,
    },
    /// Resolution of two earlier incompatibilities
    Derived(IncompatId, IncompatId),
}

/// How the partial solution relates to an incompatibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Every term holds: a conflict
    Satisfied,
    /// The term at this index is contradicted; nothing to learn
    Contradicted(usize),
    /// Every term holds except the one at this index, which is undecided
    AlmostSatisfied(usize),
    Inconclusive,
}

#[derive(Debug, Clone)]
pub struct Incompatibility {
    terms: Vec<Term>,
    cause: Cause,
}

impl Incompatibility {
    /// Build an incompatibility, merging terms on the same selector and
    /// dropping terms that always hold
    pub fn new(terms: impl IntoIterator<Item = Term>, cause: Cause) -> Self {
        let mut merged: Vec<Term> = Vec::new();
        for term in terms {
            match merged.iter_mut().find(|t| t.selector() == term.selector()) {
                Some(existing) => *existing = existing.intersection(&term),
                None => merged.push(term),
            }
        }
        merged.retain(|t| !t.is_always_true());
        Self {
            terms: merged,
            cause,
        }
    }

    pub fn root(selector: PackageSelector, range: VersionRange) -> Self {
        Self::new(
            [Term::negative(selector.clone(), range.clone())],
            Cause::Root { selector, range },
        )
    }

    pub fn no_versions(selector: PackageSelector, range: VersionRange) -> Self {
        Self::new(
            [Term::positive(selector.clone(), range.clone())],
            Cause::NoVersions { selector, range },
        )
    }

    pub fn from_dependency(
        depender: PackageSelector,
        version: Version,
        dependency: &Dependency,
    ) -> Self {
        Self::new(
            [
                Term::exact(depender.clone(), version.clone()),
                Term::negative(dependency.selector.clone(), dependency.range.clone()),
            ],
            Cause::Dependency {
                depender,
                version,
                dependency: dependency.selector.clone(),
                range: dependency.range.clone(),
            },
        )
    }

    /// Resolve `conflict` with the incompatibility that derived its satisfier.
    ///
    /// Both share a term on `selector`; the result keeps the union of those
    /// two terms and the intersection of everything else.
    pub fn prior_cause(
        conflict_id: IncompatId,
        conflict: &Incompatibility,
        cause_id: IncompatId,
        cause: &Incompatibility,
        selector: &PackageSelector,
    ) -> Self {
        let left = conflict.term_for(selector);
        let right = cause.term_for(selector);
        let pivot = match (left, right) {
            (Some(l), Some(r)) => Some(l.union(r)),
            (Some(t), None) | (None, Some(t)) => Some(t.clone()),
            (None, None) => None,
        };

        let others = conflict
            .terms
            .iter()
            .chain(cause.terms.iter())
            .filter(|t| t.selector() != selector)
            .cloned();

        Self::new(
            others.chain(pivot),
            Cause::Derived(conflict_id, cause_id),
        )
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    pub fn term_for(&self, selector: &PackageSelector) -> Option<&Term> {
        self.terms.iter().find(|t| t.selector() == selector)
    }

    /// An empty incompatibility means resolution has failed
    pub fn is_terminal(&self) -> bool {
        self.terms.is_empty()
    }

    /// Relate to a partial solution given the accumulated term per selector.
    /// Selectors without assignments are inconclusive.
    pub fn relation<'a>(
        &self,
        accumulated: impl Fn(&PackageSelector) -> Option<&'a Term>,
    ) -> Relation {
        let mut relation = Relation::Satisfied;
        for (idx, term) in self.terms.iter().enumerate() {
            match accumulated(term.selector()).map(|acc| term.relation_with(acc)) {
                Some(TermRelation::Satisfied) => {},
                Some(TermRelation::Contradicted) => return Relation::Contradicted(idx),
                Some(TermRelation::Inconclusive) | None => {
                    if relation == Relation::Satisfied {
                        relation = Relation::AlmostSatisfied(idx);
                    } else {
                        relation = Relation::Inconclusive;
                    }
                },
            }
        }
        relation
    }
}

/// Renders the incompatibility as the statement it encodes
impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Cause::Root { selector, range } => {
                return write!(f, "the project depends on {} {}", selector, range);
            },
            Cause::NoVersions { selector, range } => {
                return if range.is_full() {
                    write!(f, "there are no versions of {}", selector)
                } else {
                    write!(f, "no versions of {} match {}", selector, range)
                };
            },
            Cause::Dependency {
                depender,
                version,
                dependency,
                range,
            } => {
                return write!(
                    f,
                    "{} {} depends on {} {}",
                    depender, version, dependency, range
                );
            },
            Cause::Derived(..) => {},
        }
        write!(f, "{}", describe_terms(&self.terms))
    }
}

/// Phrase a set of terms as the constraint it forbids
pub fn describe_terms(terms: &[Term]) -> String {
    let positive = |t: &Term| format!("{} {}", t.selector(), t.range());
    match terms {
        [] => "version solving failed".to_string(),
        [t] if t.is_positive() => format!("{} is forbidden", positive(t)),
        [t] => format!("{} is required", positive(t)),
        [a, b] if a.is_positive() && !b.is_positive() => {
            format!("{} depends on {}", positive(a), positive(b))
        },
        [a, b] if !a.is_positive() && b.is_positive() => {
            format!("{} depends on {}", positive(b), positive(a))
        },
        [a, b] if a.is_positive() && b.is_positive() => {
            format!("{} is incompatible with {}", positive(a), positive(b))
        },
        [a, b] => format!("either {} or {}", positive(a), positive(b)),
        _ => {
            let listed: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
            format!("one of {} must be false", listed.join(", "))
        },
    }
}

/// Append-only arena of incompatibilities with a per-selector index.
///
/// Only indexed incompatibilities take part in propagation. Intermediate
/// derivations made during conflict resolution are allocated but stay
/// unindexed; they exist for the failure report.
#[derive(Debug, Default)]
pub struct IncompatibilityStore {
    arena: Vec<Incompatibility>,
    by_selector: HashMap<PackageSelector, Vec<IncompatId>>,
}

impl IncompatibilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store without indexing
    pub fn alloc(&mut self, incompat: Incompatibility) -> IncompatId {
        let id = IncompatId(self.arena.len());
        self.arena.push(incompat);
        id
    }

    /// Store and index for propagation
    pub fn add(&mut self, incompat: Incompatibility) -> IncompatId {
        let id = self.alloc(incompat);
        self.activate(id);
        id
    }

    /// Make a stored incompatibility visible to propagation
    pub fn activate(&mut self, id: IncompatId) {
        for term in &self.arena[id.0].terms {
            let ids = self.by_selector.entry(term.selector().clone()).or_default();
            if ids.last() != Some(&id) {
                ids.push(id);
            }
        }
    }

    /// Indexed incompatibilities mentioning `selector`, oldest first
    pub fn for_selector(&self, selector: &PackageSelector) -> &[IncompatId] {
        self.by_selector
            .get(selector)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get(&self, id: IncompatId) -> Option<&Incompatibility> {
        self.arena.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IncompatId, &Incompatibility)> {
        self.arena
            .iter()
            .enumerate()
            .map(|(idx, incompat)| (IncompatId(idx), incompat))
    }
}

impl Index<IncompatId> for IncompatibilityStore {
    type Output = Incompatibility;

    fn index(&self, id: IncompatId) -> &Self::Output {
        &self.arena[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sel(name: &str) -> PackageSelector {
        PackageSelector::new(name)
    }

    fn range(lo: u64, hi: u64) -> VersionRange {
        VersionRange::between(Version::new(lo, 0, 0), Version::new(hi, 0, 0))
    }

    #[test]
    fn test_terms_on_same_selector_merge() {
        let incompat = Incompatibility::new(
            [
                Term::positive(sel("a"), range(1, 3)),
                Term::positive(sel("a"), range(2, 4)),
                Term::negative(sel("b"), VersionRange::empty()),
            ],
            Cause::Derived(IncompatId(0), IncompatId(1)),
        );
        assert_eq!(incompat.terms(), &[Term::positive(sel("a"), range(2, 3))]);
    }

    #[test]
    fn test_prior_cause_unions_pivot() {
        let conflict = Incompatibility::no_versions(sel("b"), range(1, 2));
        let dep = Dependency::new(sel("b"), range(0, 3));
        let cause = Incompatibility::from_dependency(sel("a"), Version::new(1, 0, 0), &dep);

        // b ∈ [1,2) ∪ ¬(b ∈ [0,3)) leaves ¬(b ∈ [0,1) ∪ [2,3))
        let derived =
            Incompatibility::prior_cause(IncompatId(0), &conflict, IncompatId(1), &cause, &sel("b"));
        assert_eq!(derived.terms().len(), 2);
        assert_eq!(
            derived.term_for(&sel("b")),
            Some(&Term::negative(sel("b"), range(0, 1).union(&range(2, 3))))
        );
        assert_eq!(derived.cause(), &Cause::Derived(IncompatId(0), IncompatId(1)));
    }

    #[test]
    fn test_prior_cause_can_be_terminal() {
        let root = Incompatibility::root(sel("a"), range(1, 2));
        let none = Incompatibility::no_versions(sel("a"), range(1, 2));
        let derived =
            Incompatibility::prior_cause(IncompatId(1), &none, IncompatId(0), &root, &sel("a"));
        assert!(derived.is_terminal());
    }

    #[test]
    fn test_relation() {
        let dep = Dependency::new(sel("b"), range(1, 2));
        let incompat = Incompatibility::from_dependency(sel("a"), Version::new(1, 0, 0), &dep);

        let mut accumulated = BTreeMap::new();
        accumulated.insert(sel("a"), Term::exact(sel("a"), Version::new(1, 0, 0)));
        assert_eq!(
            incompat.relation(|s| accumulated.get(s)),
            Relation::AlmostSatisfied(1)
        );

        accumulated.insert(sel("b"), Term::positive(sel("b"), range(3, 4)));
        assert_eq!(incompat.relation(|s| accumulated.get(s)), Relation::Satisfied);

        accumulated.insert(sel("b"), Term::positive(sel("b"), range(1, 2)));
        assert_eq!(
            incompat.relation(|s| accumulated.get(s)),
            Relation::Contradicted(1)
        );

        accumulated.clear();
        assert_eq!(incompat.relation(|s| accumulated.get(s)), Relation::Inconclusive);
    }

    #[test]
    fn test_display_phrases() {
        let v1 = Version::new(1, 0, 0);
        let dep = Dependency::new(sel("b"), range(1, 2));
        assert_eq!(
            Incompatibility::from_dependency(sel("a"), v1.clone(), &dep).to_string(),
            "a 1.0.0 depends on b >=1.0.0, <2.0.0"
        );
        assert_eq!(
            Incompatibility::no_versions(sel("c"), VersionRange::full()).to_string(),
            "there are no versions of c"
        );

        let derived = |terms: Vec<Term>| {
            Incompatibility::new(terms, Cause::Derived(IncompatId(0), IncompatId(1))).to_string()
        };
        assert_eq!(derived(vec![]), "version solving failed");
        assert_eq!(
            derived(vec![Term::exact(sel("a"), v1.clone())]),
            "a 1.0.0 is forbidden"
        );
        assert_eq!(
            derived(vec![Term::negative(sel("a"), range(1, 2))]),
            "a >=1.0.0, <2.0.0 is required"
        );
        assert_eq!(
            derived(vec![
                Term::exact(sel("a"), v1.clone()),
                Term::exact(sel("b"), v1.clone())
            ]),
            "a 1.0.0 is incompatible with b 1.0.0"
        );
    }

    #[test]
    fn test_store_indexing() {
        let mut store = IncompatibilityStore::new();
        let dep = Dependency::new(sel("b"), range(1, 2));
        let indexed =
            store.add(Incompatibility::from_dependency(sel("a"), Version::new(1, 0, 0), &dep));
        let hidden = store.alloc(Incompatibility::no_versions(sel("a"), range(0, 1)));

        assert_eq!(store.len(), 2);
        assert_eq!(store.for_selector(&sel("a")), &[indexed]);
        assert_eq!(store.for_selector(&sel("b")), &[indexed]);
        assert!(store.for_selector(&sel("c")).is_empty());

        store.activate(hidden);
        assert_eq!(store.for_selector(&sel("a")), &[indexed, hidden]);
        assert!(store[hidden].to_string().starts_with("no versions of a"));
    }
}
