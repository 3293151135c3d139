//! Error types and result aliases for sprig operations.
//!
//! Provides a unified error type that covers every failure surfaced to users
//! across the sprig workspace, with actionable suggestions.

use thiserror::Error;

/// Unified error type for all sprig operations
#[derive(Error, Debug)]
pub enum SprigError {
    // Config errors
    #[error("Failed to parse {path}: {message}")]
    TomlParse { path: String, message: String },

    #[error("Failed to parse index document: {message}")]
    JsonParse { message: String },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // Resolution errors
    #[error("Malformed requirement '{declaration}': {reason}")]
    MalformedConstraint { declaration: String, reason: String },

    #[error("Package '{name}' not found in any configured source")]
    PackageNotFound { name: String },

    #[error("Metadata unavailable for {selector}: {message}")]
    Provider {
        selector: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Dependency resolution failed:\n{report}")]
    Unsatisfiable { report: String },

    #[error("Resolution was cancelled")]
    Cancelled,

    // Lockfile errors
    #[error("Failed to parse sprig.lock: {message}")]
    LockfileParse { message: String },

    #[error("sprig.lock is out of date: {reason}")]
    StaleLockfile { reason: String },

    #[error("Integrity check failed for {package}: expected {expected}, got {actual}")]
    IntegrityFailure {
        package: String,
        expected: String,
        actual: String,
    },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for sprig operations
pub type SprigResult<T> = Result<T, SprigError>;

impl SprigError {
    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Create a validation error for a configuration field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SprigError::Provider { .. } | SprigError::Io { .. })
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            SprigError::PackageNotFound { .. } => {
                Some("Check the package name spelling and the configured sources")
            },
            SprigError::Provider { .. } => Some("Check that the package index is reachable"),
            SprigError::Unsatisfiable { .. } => {
                Some("Relax one of the requirements named above and run 'sprig lock' again")
            },
            SprigError::StaleLockfile { .. } => Some("Run 'sprig lock' to refresh sprig.lock"),
            SprigError::IntegrityFailure { .. } => {
                Some("The index changed since locking; run 'sprig lock' to re-resolve")
            },
            SprigError::MalformedConstraint { .. } => {
                Some("Use a range such as '^1.2', '>=1.0,<2.0' or '*'")
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SprigError::MalformedConstraint {
            declaration: "a = \">>1\"".to_string(),
            reason: "unknown operator".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed requirement 'a = \">>1\"': unknown operator"
        );

        let err = SprigError::Cancelled;
        assert_eq!(err.to_string(), "Resolution was cancelled");
    }

    #[test]
    fn test_suggestions() {
        let err = SprigError::StaleLockfile {
            reason: "manifest changed".to_string(),
        };
        assert!(err.suggestion().is_some());
        assert!(SprigError::Cancelled.suggestion().is_none());
    }

    #[test]
    fn test_recoverable() {
        let io = SprigError::io(
            "read".to_string(),
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(io.is_recoverable());
        assert!(!SprigError::Cancelled.is_recoverable());
    }
}
