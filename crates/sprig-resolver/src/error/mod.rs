//! Errors surfaced at the engine boundary.

use thiserror::Error;

use sprig_core::{PackageSelector, ProviderError, SprigError, Version};

use crate::report::NoSolution;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Malformed requirement '{declaration}': {reason}")]
    MalformedConstraint { declaration: String, reason: String },

    #[error("{message}")]
    FeatureSelection { message: String },

    #[error("Metadata unavailable for {}", describe_target(.selector, .version))]
    Provider {
        selector: PackageSelector,
        version: Option<Version>,
        #[source]
        source: ProviderError,
    },

    #[error("{0}")]
    Unsatisfiable(NoSolution),

    #[error("Resolution was cancelled")]
    Cancelled,
}

fn describe_target(selector: &PackageSelector, version: &Option<Version>) -> String {
    match version {
        Some(version) => format!("{} {}", selector, version),
        None => selector.to_string(),
    }
}

impl ResolveError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResolveError::Cancelled)
    }
}

impl From<ResolveError> for SprigError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::MalformedConstraint {
                declaration,
                reason,
            } => SprigError::MalformedConstraint {
                declaration,
                reason,
            },
            ResolveError::FeatureSelection { message } => {
                SprigError::validation("features", message)
            },
            ResolveError::Provider {
                selector,
                version,
                source,
            } => SprigError::Provider {
                selector: describe_target(&selector, &version),
                message: source.to_string(),
                source: Some(Box::new(source)),
            },
            ResolveError::Unsatisfiable(no_solution) => SprigError::Unsatisfiable {
                report: no_solution.to_string(),
            },
            ResolveError::Cancelled => SprigError::Cancelled,
        }
    }
}
