//! The resolution engine.
//!
//! A conflict-driven search over the partial solution:
//!
//! - **Propagating** derives every term forced by an almost-satisfied
//!   incompatibility, newest incompatibilities first.
//! - **ChoosingDecision** picks the undecided package with the fewest
//!   candidate versions and tries its preferred version.
//! - **Conflict** walks back through the causes of a satisfied
//!   incompatibility until it can learn one that forces a different choice,
//!   then backjumps.
//!
//! The engine is synchronous and owns all of its state for one call. Version
//! lists for the decision candidates are fetched together, in parallel when
//! prefetching is enabled, and folded back in selector order so response
//! timing never changes the outcome.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, trace};

use sprig_core::{
    Dependency, MetadataProvider, PackageSelector, ProviderError, TargetEnvironment, Version,
    VersionRange,
};

use crate::error::ResolveError;
use crate::expand::RootRequirements;
use crate::incompat::{IncompatId, Incompatibility, IncompatibilityStore, Relation};
use crate::partial::PartialSolution;
use crate::report::NoSolution;
use crate::select::VersionSelector;
use crate::term::Term;


/// Knobs that change how the search runs, never what it may return
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Fetch candidate version lists concurrently
    pub prefetch: bool,
    /// Treat pre-releases like stable versions during selection
    pub allow_prereleases: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            prefetch: true,
            allow_prereleases: false,
        }
    }
}

/// Cooperative cancellation flag shared with the caller
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters describing one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub decisions: usize,
    pub propagations: usize,
    pub conflicts: usize,
    pub backjumps: usize,
    pub incompatibilities: usize,
    pub resolution_time_ms: u64,
}

/// A successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    /// One version per reachable selector
    pub packages: BTreeMap<PackageSelector, Version>,
    /// The applicable dependencies of every chosen version
    pub dependencies: BTreeMap<PackageSelector, Vec<Dependency>>,
    pub stats: SolverStats,
}

impl Resolution {
    pub fn version_of(&self, selector: &PackageSelector) -> Option<&Version> {
        self.packages.get(selector)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PackageSelector, &Version)> {
        self.packages.iter()
    }
}

pub type ResolutionResult = Result<Resolution, ResolveError>;

/// Entry point for one or more resolutions against a provider
pub struct Resolver<'a, P: ?Sized> {
    provider: &'a P,
    environment: &'a TargetEnvironment,
    options: ResolverOptions,
    preferences: BTreeMap<PackageSelector, Version>,
    cancellation: CancellationToken,
}

impl<'a, P> Resolver<'a, P>
where
    P: MetadataProvider + Sync + ?Sized,
{
    pub fn new(provider: &'a P, environment: &'a TargetEnvironment) -> Self {
        Self {
            provider,
            environment,
            options: ResolverOptions::default(),
            preferences: BTreeMap::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Versions to try first, typically from a lockfile
    pub fn with_preferences(mut self, preferences: BTreeMap<PackageSelector, Version>) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn resolve(&self, root: &RootRequirements) -> ResolutionResult {
        let started = Instant::now();
        info!("Resolving {} root requirements", root.len());
        SearchState::new(self, root).run(started)
    }
}

/// Resolve with default options and no preferences
pub fn resolve<P>(
    root: &RootRequirements,
    provider: &P,
    environment: &TargetEnvironment,
) -> ResolutionResult
where
    P: MetadataProvider + Sync + ?Sized,
{
    Resolver::new(provider, environment).resolve(root)
}

enum Phase {
    Propagating(Vec<PackageSelector>),
    ChoosingDecision,
    Conflict(IncompatId),
    Success,
    Failure(IncompatId),
}

struct DependencyRecord {
    incompatibilities: Vec<IncompatId>,
    dependencies: Vec<Dependency>,
}

struct SearchState<'r, 'a, P: ?Sized> {
    resolver: &'r Resolver<'a, P>,
    root: &'r RootRequirements,
    store: IncompatibilityStore,
    solution: PartialSolution,
    /// Sorted, deduplicated version lists
    versions: HashMap<PackageSelector, Vec<Version>>,
    dependencies: HashMap<(PackageSelector, Version), DependencyRecord>,
    stats: SolverStats,
}

impl<'r, 'a, P> SearchState<'r, 'a, P>
where
    P: MetadataProvider + Sync + ?Sized,
{
    fn new(resolver: &'r Resolver<'a, P>, root: &'r RootRequirements) -> Self {
        Self {
            resolver,
            root,
            store: IncompatibilityStore::new(),
            solution: PartialSolution::new(),
            versions: HashMap::new(),
            dependencies: HashMap::new(),
            stats: SolverStats::default(),
        }
    }

    fn run(mut self, started: Instant) -> ResolutionResult {
        let mut queue = Vec::new();
        for (selector, range) in self.root.iter() {
            let id = self
                .store
                .add(Incompatibility::root(selector.clone(), range.clone()));
            if self.store[id].is_terminal() {
                return Err(self.failure(id));
            }
            queue.push(selector.clone());
        }
        // Pop in selector order
        queue.reverse();

        let mut phase = Phase::Propagating(queue);
        loop {
            phase = match phase {
                Phase::Propagating(changed) => {
                    self.check_cancelled()?;
                    match self.propagate(changed) {
                        Some(conflict) => Phase::Conflict(conflict),
                        None => Phase::ChoosingDecision,
                    }
                },
                Phase::ChoosingDecision => {
                    self.check_cancelled()?;
                    match self.choose_decision()? {
                        Some(selector) => Phase::Propagating(vec![selector]),
                        None => Phase::Success,
                    }
                },
                Phase::Conflict(id) => match self.resolve_conflict(id) {
                    Ok(selector) => Phase::Propagating(vec![selector]),
                    Err(terminal) => Phase::Failure(terminal),
                },
                Phase::Success => return Ok(self.finish(started)),
                Phase::Failure(id) => {
                    info!(
                        "Resolution failed after {} conflicts in {}ms",
                        self.stats.conflicts,
                        started.elapsed().as_millis()
                    );
                    return Err(self.failure(id));
                },
            };
        }
    }

    fn check_cancelled(&self) -> Result<(), ResolveError> {
        if self.resolver.cancellation.is_cancelled() {
            debug!("Resolution cancelled");
            Err(ResolveError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Unit propagation. Returns a satisfied incompatibility on conflict.
    fn propagate(&mut self, mut changed: Vec<PackageSelector>) -> Option<IncompatId> {
        while let Some(selector) = changed.pop() {
            for &id in self.store.for_selector(&selector).iter().rev() {
                let incompat = &self.store[id];
                match self.solution.relation(incompat) {
                    Relation::Satisfied => {
                        self.stats.conflicts += 1;
                        debug!("Conflict: {}", incompat);
                        return Some(id);
                    },
                    Relation::AlmostSatisfied(idx) => {
                        let term = incompat.terms()[idx].negate();
                        trace!("Derived {} from {}", term, incompat);
                        let derived = term.selector().clone();
                        self.solution.add_derivation(term, id);
                        self.stats.propagations += 1;
                        if !changed.contains(&derived) {
                            changed.push(derived);
                        }
                    },
                    Relation::Contradicted(_) | Relation::Inconclusive => {},
                }
            }
        }
        None
    }

    /// Learn from a conflict until a backjump is possible. Returns the
    /// selector to propagate from, or the terminal incompatibility.
    fn resolve_conflict(&mut self, mut id: IncompatId) -> Result<PackageSelector, IncompatId> {
        let mut learned = false;
        loop {
            let incompat = &self.store[id];
            if incompat.is_terminal() {
                return Err(id);
            }

            let found = self.solution.satisfier_search(incompat);
            let satisfier = self.solution.assignment(found.index);
            let selector = satisfier.selector().clone();
            let level = satisfier.level;

            match satisfier.cause() {
                Some(cause) if found.previous_level >= level => {
                    let prior =
                        Incompatibility::prior_cause(id, incompat, cause, &self.store[cause], &selector);
                    trace!("Learned {} from {} and {}", prior, incompat, self.store[cause]);
                    id = self.store.alloc(prior);
                    learned = true;
                },
                _ => {
                    if learned {
                        self.store.activate(id);
                        debug!("Learned: {}", self.store[id]);
                    }
                    debug!(
                        "Backjumping from level {} to {}",
                        self.solution.level(),
                        found.previous_level
                    );
                    self.solution.truncate_to_level(found.previous_level);
                    self.stats.backjumps += 1;
                    return Ok(selector);
                },
            }
        }
    }

    /// Make the next decision. Returns the selector to propagate from, or
    /// `None` when every required package is decided.
    fn choose_decision(&mut self) -> Result<Option<PackageSelector>, ResolveError> {
        let candidates: Vec<(PackageSelector, VersionRange)> = self
            .solution
            .undecided()
            .into_iter()
            .map(|(selector, range)| (selector.clone(), range.clone()))
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        self.prefetch(candidates.iter().map(|(selector, _)| selector))?;

        // Fewest candidate versions first; ties keep selector order
        let Some((selector, range)) = candidates
            .into_iter()
            .min_by_key(|(selector, range)| self.count_candidates(selector, range))
        else {
            return Ok(None);
        };

        let Some(version) = self.pick_version(&selector, &range) else {
            debug!("No versions of {} match {}", selector, range);
            self.store
                .add(Incompatibility::no_versions(selector.clone(), range));
            return Ok(Some(selector));
        };

        let edges = self.dependency_incompatibilities(&selector, &version)?;
        let chosen = Term::exact(selector.clone(), version.clone());
        let immediate_conflict = edges.iter().any(|&edge| {
            self.store[edge].relation(|s| {
                if s == &selector {
                    Some(&chosen)
                } else {
                    self.solution.relation_for(s)
                }
            }) == Relation::Satisfied
        });

        if immediate_conflict {
            debug!("Not deciding {} {}: a dependency is already excluded", selector, version);
        } else {
            debug!("Decision: {} {}", selector, version);
            self.solution.add_decision(selector.clone(), version);
            self.stats.decisions += 1;
        }
        Ok(Some(selector))
    }

    fn count_candidates(&self, selector: &PackageSelector, range: &VersionRange) -> usize {
        self.versions
            .get(selector)
            .map_or(0, |versions| VersionSelector::new(versions).count_matching(range))
    }

    fn pick_version(&self, selector: &PackageSelector, range: &VersionRange) -> Option<Version> {
        let versions = self.versions.get(selector)?;
        let chooser = VersionSelector::new(versions);

        if let Some(preferred) = self.resolver.preferences.get(selector) {
            if let Some(version) = chooser.select_locked(range, preferred) {
                return Some(version.clone());
            }
            debug!("Locked {} {} is no longer allowed", selector, preferred);
        }

        let allow_prerelease =
            self.resolver.options.allow_prereleases || self.root.allows_prerelease(selector);
        chooser.select_preferred(range, allow_prerelease).cloned()
    }

    /// Fetch version lists that are not cached yet
    fn prefetch<'s>(
        &mut self,
        selectors: impl Iterator<Item = &'s PackageSelector>,
    ) -> Result<(), ResolveError> {
        let missing: Vec<PackageSelector> = selectors
            .filter(|selector| !self.versions.contains_key(*selector))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let provider = self.resolver.provider;
        let fetch = |selector: PackageSelector| {
            let result = provider.list_versions(&selector);
            (selector, result)
        };
        let fetched: Vec<(PackageSelector, Result<Vec<Version>, ProviderError>)> =
            if self.resolver.options.prefetch && missing.len() > 1 {
                trace!("Prefetching {} version lists", missing.len());
                missing.into_par_iter().map(fetch).collect()
            } else {
                missing.into_iter().map(fetch).collect()
            };

        for (selector, result) in fetched {
            let mut versions = result.map_err(|source| ResolveError::Provider {
                selector: selector.clone(),
                version: None,
                source,
            })?;
            versions.sort();
            versions.dedup();
            trace!("{} has {} versions", selector, versions.len());
            self.versions.insert(selector, versions);
        }
        Ok(())
    }

    /// Dependency incompatibilities of one version, added on first use
    fn dependency_incompatibilities(
        &mut self,
        selector: &PackageSelector,
        version: &Version,
    ) -> Result<Vec<IncompatId>, ResolveError> {
        let key = (selector.clone(), version.clone());
        if let Some(record) = self.dependencies.get(&key) {
            return Ok(record.incompatibilities.clone());
        }

        let declared = self
            .resolver
            .provider
            .requirements_of(selector, version)
            .map_err(|source| ResolveError::Provider {
                selector: selector.clone(),
                version: Some(version.clone()),
                source,
            })?;

        let environment = self.resolver.environment;
        let dependencies: Vec<Dependency> = declared
            .into_iter()
            .filter(|dep| {
                let applies = dep.applies_to(environment);
                if !applies {
                    trace!("{} {}: skipping {} for this target", selector, version, dep.selector);
                }
                applies
            })
            .collect();

        let incompatibilities: Vec<IncompatId> = dependencies
            .iter()
            .map(|dep| {
                self.store.add(Incompatibility::from_dependency(
                    selector.clone(),
                    version.clone(),
                    dep,
                ))
            })
            .collect();

        self.dependencies.insert(
            key,
            DependencyRecord {
                incompatibilities: incompatibilities.clone(),
                dependencies,
            },
        );
        Ok(incompatibilities)
    }

    fn failure(&self, terminal: IncompatId) -> ResolveError {
        ResolveError::Unsatisfiable(NoSolution::new(&self.store, terminal))
    }

    fn finish(mut self, started: Instant) -> Resolution {
        debug_assert!(
            self.store
                .iter()
                .all(|(_, incompat)| !self.solution.satisfies(incompat)),
            "final solution satisfies a stored incompatibility"
        );
        let packages = self.solution.decisions();
        let dependencies = packages
            .iter()
            .map(|(selector, version)| {
                let deps = self
                    .dependencies
                    .remove(&(selector.clone(), version.clone()))
                    .map(|record| record.dependencies)
                    .unwrap_or_default();
                (selector.clone(), deps)
            })
            .collect();

        self.stats.incompatibilities = self.store.len();
        self.stats.resolution_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "Resolved {} packages in {}ms ({} decisions, {} conflicts)",
            packages.len(),
            self.stats.resolution_time_ms,
            self.stats.decisions,
            self.stats.conflicts
        );

        Resolution {
            packages,
            dependencies,
            stats: self.stats,
        }
    }
}
