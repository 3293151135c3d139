//! Failure explanations.
//!
//! When resolution fails, the terminal incompatibility is the root of a
//! derivation DAG whose leaves are external facts: root requirements,
//! missing versions and dependency edges. [`NoSolution`] holds that tree and
//! renders it as numbered prose, one derivation step per line.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use sprig_core::{PackageSelector, Version, VersionRange};

use crate::incompat::{describe_terms, Cause, IncompatId, IncompatibilityStore};
use crate::term::Term;

/// A fact that holds independently of the search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum External {
    Root {
        selector: PackageSelector,
        range: VersionRange,
    },
    NoVersions {
        selector: PackageSelector,
        range: VersionRange,
    },
    Dependency {
        depender: PackageSelector,
        version: Version,
        dependency: PackageSelector,
        range: VersionRange,
    },
}

impl fmt::Display for External {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            External::Root { selector, range } => {
                write!(f, "the project depends on {} {}", selector, range)
            },
            External::NoVersions { selector, range } if range.is_full() => {
                write!(f, "there are no versions of {}", selector)
            },
            External::NoVersions { selector, range } => {
                write!(f, "no versions of {} match {}", selector, range)
            },
            External::Dependency {
                depender,
                version,
                dependency,
                range,
            } => write!(
                f,
                "{} {} depends on {} {}",
                depender, version, dependency, range
            ),
        }
    }
}

/// An incompatibility learned from two others
#[derive(Debug, Clone)]
pub struct Derived {
    pub terms: Vec<Term>,
    /// Set when more than one derivation refers to this one
    pub shared_id: Option<IncompatId>,
    pub cause1: Arc<DerivationTree>,
    pub cause2: Arc<DerivationTree>,
}

#[derive(Debug, Clone)]
pub enum DerivationTree {
    External(External),
    Derived(Derived),
}

impl DerivationTree {
    /// Build the tree rooted at `id`, sharing nodes that several
    /// derivations reference
    pub fn build(store: &IncompatibilityStore, id: IncompatId) -> Self {
        let mut parents: HashMap<IncompatId, usize> = HashMap::new();
        let mut visited = HashSet::new();
        count_parents(store, id, &mut parents, &mut visited);

        let shared: HashSet<IncompatId> = parents
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id)
            .collect();

        let mut memo = HashMap::new();
        let tree = build_node(store, id, &shared, &mut memo);
        drop(memo);
        Arc::try_unwrap(tree).unwrap_or_else(|arc| (*arc).clone())
    }

    /// External facts at the leaves, each listed once
    pub fn externals(&self) -> Vec<&External> {
        let mut found = Vec::new();
        self.collect_externals(&mut found);
        found
    }

    fn collect_externals<'a>(&'a self, found: &mut Vec<&'a External>) {
        match self {
            DerivationTree::External(external) => {
                if !found.contains(&external) {
                    found.push(external);
                }
            },
            DerivationTree::Derived(derived) => {
                derived.cause1.collect_externals(found);
                derived.cause2.collect_externals(found);
            },
        }
    }
}

fn count_parents(
    store: &IncompatibilityStore,
    id: IncompatId,
    parents: &mut HashMap<IncompatId, usize>,
    visited: &mut HashSet<IncompatId>,
) {
    if !visited.insert(id) {
        return;
    }
    if let Cause::Derived(left, right) = store[id].cause() {
        for cause in [*left, *right] {
            *parents.entry(cause).or_default() += 1;
            count_parents(store, cause, parents, visited);
        }
    }
}

fn build_node(
    store: &IncompatibilityStore,
    id: IncompatId,
    shared: &HashSet<IncompatId>,
    memo: &mut HashMap<IncompatId, Arc<DerivationTree>>,
) -> Arc<DerivationTree> {
    if let Some(node) = memo.get(&id) {
        return Arc::clone(node);
    }

    let incompat = &store[id];
    let node = match incompat.cause() {
        Cause::Root { selector, range } => DerivationTree::External(External::Root {
            selector: selector.clone(),
            range: range.clone(),
        }),
        Cause::NoVersions { selector, range } => DerivationTree::External(External::NoVersions {
            selector: selector.clone(),
            range: range.clone(),
        }),
        Cause::Dependency {
            depender,
            version,
            dependency,
            range,
        } => DerivationTree::External(External::Dependency {
            depender: depender.clone(),
            version: version.clone(),
            dependency: dependency.clone(),
            range: range.clone(),
        }),
        Cause::Derived(left, right) => DerivationTree::Derived(Derived {
            terms: incompat.terms().to_vec(),
            shared_id: shared.contains(&id).then_some(id),
            cause1: build_node(store, *left, shared, memo),
            cause2: build_node(store, *right, shared, memo),
        }),
    };

    let node = Arc::new(node);
    memo.insert(id, Arc::clone(&node));
    node
}

/// Proof that no assignment satisfies the root requirements
#[derive(Debug, Clone)]
pub struct NoSolution {
    tree: DerivationTree,
}

impl NoSolution {
    pub fn new(store: &IncompatibilityStore, terminal: IncompatId) -> Self {
        Self {
            tree: DerivationTree::build(store, terminal),
        }
    }

    pub fn tree(&self) -> &DerivationTree {
        &self.tree
    }

    /// The external facts the failure rests on
    pub fn externals(&self) -> Vec<&External> {
        self.tree.externals()
    }

    /// Selectors named anywhere in the explanation
    pub fn selectors(&self) -> Vec<&PackageSelector> {
        let mut names = Vec::new();
        for external in self.externals() {
            let mentioned: Vec<&PackageSelector> = match external {
                External::Root { selector, .. } | External::NoVersions { selector, .. } => {
                    vec![selector]
                },
                External::Dependency {
                    depender,
                    dependency,
                    ..
                } => vec![depender, dependency],
            };
            for selector in mentioned {
                if !names.contains(&selector) {
                    names.push(selector);
                }
            }
        }
        names
    }

    pub fn report(&self) -> String {
        match &self.tree {
            DerivationTree::External(external) => {
                format!("Because {}, version solving failed.", external)
            },
            DerivationTree::Derived(derived) => {
                let mut reporter = Reporter::default();
                reporter.build_recursive(derived);
                reporter.lines.join("\n")
            },
        }
    }
}

impl fmt::Display for NoSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

#[derive(Default)]
struct Reporter {
    lines: Vec<String>,
    ref_count: usize,
    shared_with_ref: HashMap<IncompatId, usize>,
}

impl Reporter {
    fn build_recursive(&mut self, derived: &Derived) {
        self.build_recursive_helper(derived);
        if let Some(id) = derived.shared_id {
            if !self.shared_with_ref.contains_key(&id) {
                self.add_line_ref();
                self.shared_with_ref.insert(id, self.ref_count);
            }
        }
    }

    fn build_recursive_helper(&mut self, current: &Derived) {
        use DerivationTree::{Derived as D, External as E};

        match (current.cause1.as_ref(), current.cause2.as_ref()) {
            (E(e1), E(e2)) => {
                self.lines.push(format!(
                    "Because {} and {}, {}.",
                    e1,
                    e2,
                    describe_terms(&current.terms)
                ));
            },
            (D(derived), E(external)) | (E(external), D(derived)) => {
                self.report_one_each(derived, external, &current.terms);
            },
            (D(derived1), D(derived2)) => {
                match (self.line_ref_of(derived1), self.line_ref_of(derived2)) {
                    (Some(ref1), Some(ref2)) => self.lines.push(format!(
                        "Because {} ({}) and {} ({}), {}.",
                        describe_terms(&derived1.terms),
                        ref1,
                        describe_terms(&derived2.terms),
                        ref2,
                        describe_terms(&current.terms)
                    )),
                    (Some(ref1), None) => {
                        self.build_recursive(derived2);
                        self.and_explain_ref(ref1, derived1, &current.terms);
                    },
                    (None, Some(ref2)) => {
                        self.build_recursive(derived1);
                        self.and_explain_ref(ref2, derived2, &current.terms);
                    },
                    (None, None) => {
                        self.build_recursive(derived1);
                        if derived1.shared_id.is_some() {
                            // derived1 now has a line number; restart this node
                            self.lines.push(String::new());
                            self.build_recursive(current);
                        } else {
                            self.add_line_ref();
                            let ref1 = self.ref_count;
                            self.lines.push(String::new());
                            self.build_recursive(derived2);
                            self.and_explain_ref(ref1, derived1, &current.terms);
                        }
                    },
                }
            },
        }
    }

    fn report_one_each(&mut self, derived: &Derived, external: &External, current: &[Term]) {
        match self.line_ref_of(derived) {
            Some(ref_id) => self.lines.push(format!(
                "Because {} ({}) and {}, {}.",
                describe_terms(&derived.terms),
                ref_id,
                external,
                describe_terms(current)
            )),
            None => self.report_recurse_one_each(derived, external, current),
        }
    }

    fn report_recurse_one_each(
        &mut self,
        derived: &Derived,
        external: &External,
        current: &[Term],
    ) {
        use DerivationTree::{Derived as D, External as E};

        match (derived.cause1.as_ref(), derived.cause2.as_ref()) {
            // Chain the prior external fact into the same sentence
            (D(prior_derived), E(prior_external)) | (E(prior_external), D(prior_derived)) => {
                self.build_recursive(prior_derived);
                self.lines.push(format!(
                    "And because {} and {}, {}.",
                    prior_external,
                    external,
                    describe_terms(current)
                ));
            },
            _ => {
                self.build_recursive(derived);
                self.lines.push(format!(
                    "And because {}, {}.",
                    external,
                    describe_terms(current)
                ));
            },
        }
    }

    fn and_explain_ref(&mut self, ref_id: usize, derived: &Derived, current: &[Term]) {
        self.lines.push(format!(
            "And because {} ({}), {}.",
            describe_terms(&derived.terms),
            ref_id,
            describe_terms(current)
        ));
    }

    fn add_line_ref(&mut self) {
        self.ref_count += 1;
        if let Some(line) = self.lines.last_mut() {
            line.push_str(&format!(" ({})", self.ref_count));
        }
    }

    fn line_ref_of(&self, derived: &Derived) -> Option<usize> {
        derived
            .shared_id
            .and_then(|id| self.shared_with_ref.get(&id).copied())
    }
}
