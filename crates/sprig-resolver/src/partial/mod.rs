//! The partial solution: an ordered log of decisions and derivations.
//!
//! Each assignment records its own term, the intersection of every term
//! assigned to the same selector so far, and the decision level it was made
//! at. Levels never decrease along the log, which lets backjumping truncate
//! with a binary search.

use std::collections::BTreeMap;

use sprig_core::{PackageSelector, Version, VersionRange};

use crate::incompat::{IncompatId, Incompatibility, Relation};
use crate::term::Term;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentKind {
    Decision(Version),
    Derivation(IncompatId),
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub term: Term,
    pub accumulated: Term,
    pub level: u32,
    pub kind: AssignmentKind,
}

impl Assignment {
    pub fn selector(&self) -> &PackageSelector {
        self.term.selector()
    }

    pub fn is_decision(&self) -> bool {
        matches!(self.kind, AssignmentKind::Decision(_))
    }

    /// The incompatibility this assignment was derived from
    pub fn cause(&self) -> Option<IncompatId> {
        match self.kind {
            AssignmentKind::Derivation(id) => Some(id),
            AssignmentKind::Decision(_) => None,
        }
    }
}

/// Result of searching for the assignment that completed a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Satisfier {
    /// Position of the satisfier in the log
    pub index: usize,
    /// Highest level among the other assignments needed for the conflict
    pub previous_level: u32,
}

#[derive(Debug, Default)]
pub struct PartialSolution {
    log: Vec<Assignment>,
    by_selector: BTreeMap<PackageSelector, Vec<usize>>,
    level: u32,
}

impl PartialSolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn assignment(&self, index: usize) -> &Assignment {
        &self.log[index]
    }

    /// Select `version` at a new decision level
    pub fn add_decision(&mut self, selector: PackageSelector, version: Version) {
        self.level += 1;
        let term = Term::exact(selector, version.clone());
        self.push(term, AssignmentKind::Decision(version));
    }

    pub fn add_derivation(&mut self, term: Term, cause: IncompatId) {
        self.push(term, AssignmentKind::Derivation(cause));
    }

    fn push(&mut self, term: Term, kind: AssignmentKind) {
        let accumulated = match self.relation_for(term.selector()) {
            Some(previous) => previous.intersection(&term),
            None => term.clone(),
        };
        let index = self.log.len();
        self.by_selector
            .entry(term.selector().clone())
            .or_default()
            .push(index);
        self.log.push(Assignment {
            term,
            accumulated,
            level: self.level,
            kind,
        });
    }

    /// The accumulated term for a selector, if it has any assignment
    pub fn relation_for(&self, selector: &PackageSelector) -> Option<&Term> {
        self.by_selector
            .get(selector)
            .and_then(|indices| indices.last())
            .map(|&idx| &self.log[idx].accumulated)
    }

    pub fn decision_for(&self, selector: &PackageSelector) -> Option<&Version> {
        self.by_selector
            .get(selector)?
            .iter()
            .rev()
            .find_map(|&idx| match &self.log[idx].kind {
                AssignmentKind::Decision(version) => Some(version),
                AssignmentKind::Derivation(_) => None,
            })
    }

    pub fn relation(&self, incompat: &Incompatibility) -> Relation {
        incompat.relation(|selector| self.relation_for(selector))
    }

    pub fn satisfies(&self, incompat: &Incompatibility) -> bool {
        self.relation(incompat) == Relation::Satisfied
    }

    /// Selectors required by a positive term but not yet decided, in
    /// selector order, with the range they are currently limited to
    pub fn undecided(&self) -> Vec<(&PackageSelector, &VersionRange)> {
        self.by_selector
            .iter()
            .filter_map(|(selector, indices)| {
                let last = &self.log[*indices.last()?];
                let decided = indices.iter().any(|&idx| self.log[idx].is_decision());
                (last.accumulated.is_positive() && !decided)
                    .then(|| (selector, last.accumulated.range()))
            })
            .collect()
    }

    /// Every decided selector with its version
    pub fn decisions(&self) -> BTreeMap<PackageSelector, Version> {
        self.log
            .iter()
            .filter_map(|assignment| match &assignment.kind {
                AssignmentKind::Decision(version) => {
                    Some((assignment.selector().clone(), version.clone()))
                },
                AssignmentKind::Derivation(_) => None,
            })
            .collect()
    }

    /// Drop every assignment made above `level`
    pub fn truncate_to_level(&mut self, level: u32) {
        let keep = self.log.partition_point(|a| a.level <= level);
        for idx in (keep..self.log.len()).rev() {
            let selector = self.log[idx].term.selector();
            if let Some(indices) = self.by_selector.get_mut(selector) {
                indices.pop();
                if indices.is_empty() {
                    self.by_selector.remove(selector);
                }
            }
        }
        self.log.truncate(keep);
        self.level = level;
    }

    /// Find the earliest assignment after which `incompat` is satisfied, and
    /// the level the solution could backjump to while keeping it almost
    /// satisfied. `incompat` must be satisfied by the full log.
    pub fn satisfier_search(&self, incompat: &Incompatibility) -> Satisfier {
        // Earliest satisfying position for each term
        let earliest: Vec<usize> = incompat
            .terms()
            .iter()
            .map(|term| {
                let indices = self.indices_for(term.selector());
                let pos = indices
                    .partition_point(|&idx| !self.log[idx].accumulated.subset_of(term));
                indices
                    .get(pos)
                    .or(indices.last())
                    .copied()
                    .unwrap_or(0)
            })
            .collect();

        let Some((term_idx, &index)) = earliest.iter().enumerate().max_by_key(|(_, idx)| **idx)
        else {
            return Satisfier {
                index: 0,
                previous_level: 0,
            };
        };

        let mut previous = earliest
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != term_idx)
            .map(|(_, &idx)| idx)
            .max();

        // The satisfier may only partially satisfy its own term, in which
        // case an earlier assignment for the same selector completes it.
        let term = &incompat.terms()[term_idx];
        let satisfier = &self.log[index];
        if !satisfier.term.subset_of(term) {
            let indices = self.indices_for(term.selector());
            let before = &indices[..indices.partition_point(|&idx| idx < index)];
            let pos = before.partition_point(|&idx| {
                !self.log[idx]
                    .accumulated
                    .intersection(&satisfier.term)
                    .subset_of(term)
            });
            if let Some(&idx) = before.get(pos) {
                previous = previous.max(Some(idx));
            }
        }

        Satisfier {
            index,
            previous_level: previous.map_or(0, |idx| self.log[idx].level),
        }
    }

    fn indices_for(&self, selector: &PackageSelector) -> &[usize] {
        self.by_selector
            .get(selector)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incompat::{Cause, IncompatibilityStore};
    use sprig_core::Dependency;

    fn sel(name: &str) -> PackageSelector {
        PackageSelector::new(name)
    }

    fn range(lo: u64, hi: u64) -> VersionRange {
        VersionRange::between(Version::new(lo, 0, 0), Version::new(hi, 0, 0))
    }

    #[test]
    fn test_accumulation() {
        let mut store = IncompatibilityStore::new();
        let cause = store.add(Incompatibility::root(sel("a"), range(1, 5)));
        let mut solution = PartialSolution::new();

        solution.add_derivation(Term::positive(sel("a"), range(1, 5)), cause);
        solution.add_derivation(Term::negative(sel("a"), range(3, 4)), cause);

        let acc = solution.relation_for(&sel("a")).unwrap();
        assert_eq!(acc, &Term::positive(sel("a"), range(1, 3).union(&range(4, 5))));
        assert!(solution.relation_for(&sel("b")).is_none());
    }

    #[test]
    fn test_decisions_and_undecided() {
        let mut store = IncompatibilityStore::new();
        let cause = store.add(Incompatibility::root(sel("a"), range(1, 2)));
        let mut solution = PartialSolution::new();

        solution.add_derivation(Term::positive(sel("a"), range(1, 2)), cause);
        solution.add_derivation(Term::positive(sel("b"), range(1, 2)), cause);
        solution.add_derivation(Term::negative(sel("c"), range(1, 2)), cause);
        assert_eq!(solution.undecided().len(), 2);

        solution.add_decision(sel("a"), Version::new(1, 0, 0));
        assert_eq!(solution.level(), 1);
        assert_eq!(solution.decision_for(&sel("a")), Some(&Version::new(1, 0, 0)));

        let undecided = solution.undecided();
        assert_eq!(undecided.len(), 1);
        assert_eq!(undecided[0].0, &sel("b"));
        assert_eq!(solution.decisions().len(), 1);
    }

    #[test]
    fn test_truncate_to_level() {
        let mut store = IncompatibilityStore::new();
        let cause = store.add(Incompatibility::root(sel("a"), range(1, 3)));
        let mut solution = PartialSolution::new();

        solution.add_derivation(Term::positive(sel("a"), range(1, 3)), cause);
        solution.add_decision(sel("a"), Version::new(2, 0, 0));
        solution.add_derivation(Term::positive(sel("b"), range(1, 2)), cause);
        solution.add_decision(sel("b"), Version::new(1, 0, 0));
        assert_eq!(solution.len(), 4);

        solution.truncate_to_level(1);
        assert_eq!(solution.len(), 3);
        assert_eq!(solution.level(), 1);
        assert!(solution.decision_for(&sel("b")).is_none());

        solution.truncate_to_level(0);
        assert_eq!(solution.len(), 1);
        assert!(solution.relation_for(&sel("b")).is_none());
        assert_eq!(
            solution.relation_for(&sel("a")),
            Some(&Term::positive(sel("a"), range(1, 3)))
        );
    }

    #[test]
    fn test_satisfies() {
        let mut store = IncompatibilityStore::new();
        let root = store.add(Incompatibility::root(sel("a"), range(1, 3)));
        let mut solution = PartialSolution::new();
        solution.add_derivation(Term::positive(sel("a"), range(1, 3)), root);

        let pair = Incompatibility::new(
            [
                Term::positive(sel("a"), range(1, 3)),
                Term::positive(sel("b"), range(1, 2)),
            ],
            Cause::Derived(root, root),
        );
        assert!(matches!(solution.relation(&pair), Relation::AlmostSatisfied(_)));
        assert!(!solution.satisfies(&pair));
        assert!(!solution.satisfies(&store[root]));

        solution.add_decision(sel("b"), Version::new(1, 0, 0));
        assert!(solution.satisfies(&pair));

        solution.truncate_to_level(0);
        assert!(!solution.satisfies(&pair));
    }

    #[test]
    fn test_satisfier_search() {
        let mut store = IncompatibilityStore::new();
        let root = store.add(Incompatibility::root(sel("a"), range(1, 2)));
        let dep = Dependency::new(sel("b"), range(1, 2));
        let edge = store.add(Incompatibility::from_dependency(
            sel("a"),
            Version::new(1, 0, 0),
            &dep,
        ));

        let mut solution = PartialSolution::new();
        solution.add_derivation(Term::positive(sel("a"), range(1, 2)), root);
        solution.add_decision(sel("a"), Version::new(1, 0, 0));
        solution.add_derivation(Term::positive(sel("b"), range(1, 2)), edge);

        // Conflict: a 1.0.0 together with b in [1, 2)
        let conflict = Incompatibility::new(
            [
                Term::exact(sel("a"), Version::new(1, 0, 0)),
                Term::positive(sel("b"), range(1, 2)),
            ],
            Cause::Derived(root, edge),
        );
        let found = solution.satisfier_search(&conflict);
        assert_eq!(found.index, 2);
        assert_eq!(found.previous_level, 1);
        assert_eq!(solution.assignment(found.index).cause(), Some(edge));

        // A decision alone: nothing before it is needed
        let single = Incompatibility::new(
            [Term::exact(sel("a"), Version::new(1, 0, 0))],
            Cause::Derived(root, edge),
        );
        let found = solution.satisfier_search(&single);
        assert_eq!(found.index, 1);
        assert_eq!(found.previous_level, 0);
    }

    #[test]
    fn test_partial_satisfier_uses_earlier_assignment() {
        let mut store = IncompatibilityStore::new();
        let cause = store.add(Incompatibility::root(sel("a"), range(1, 3)));
        let mut solution = PartialSolution::new();

        solution.add_derivation(Term::positive(sel("a"), range(1, 3)), cause);
        solution.add_decision(sel("b"), Version::new(1, 0, 0));
        solution.add_derivation(Term::negative(sel("a"), range(2, 3)), cause);

        // a ∈ [1,2) only holds once both assignments on `a` are combined
        let conflict = Incompatibility::new(
            [Term::positive(sel("a"), range(1, 2))],
            Cause::Derived(cause, cause),
        );
        let found = solution.satisfier_search(&conflict);
        assert_eq!(found.index, 2);
        assert_eq!(found.previous_level, 0);
    }
}
