//! Dependency resolution engine for sprig
//!
//! This crate computes one consistent assignment of package versions from a
//! set of root requirements. The search is conflict-driven: unit propagation
//! over incompatibilities, greedy decisions, and on conflict a learned
//! incompatibility plus a backjump. Failures come with a derivation tree that
//! explains exactly which requirements clash.
//!
//! ## Architecture
//!
//! - `term`: positive and negative statements about one package
//! - `incompat`: incompatibilities and the append-only store
//! - `partial`: the assignment log with per-selector relations
//! - `solver`: the state machine driving the search
//! - `report`: derivation trees and their textual rendering
//! - `expand`: manifest declarations to root requirements
//! - `select`: candidate version choice
//! - `graph`: the resolved dependency graph

pub mod error;
pub mod expand;
pub mod graph;
pub mod incompat;
pub mod partial;
pub mod report;
pub mod select;
pub mod solver;
pub mod term;

// Re-export main types
pub use error::ResolveError;
pub use expand::{expand, FeatureActivation, RootRequirements};
pub use graph::{DependencyEdge, DependencyGraph, PackageNode};
pub use report::{DerivationTree, External, NoSolution};
pub use solver::{
    resolve, CancellationToken, Resolution, ResolutionResult, Resolver, ResolverOptions,
    SolverStats,
};

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, ResolveError>;
