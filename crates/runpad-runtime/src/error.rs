//! Error types for runtime acquisition.

use thiserror::Error;

/// Classified failure of a [`RuntimeLoader`](crate::RuntimeLoader) attempt.
///
/// Both variants are retryable: the next `acquire()` starts a fresh attempt.
/// `Clone` because one failed attempt is reported to every attached caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The bootstrap artifact was unreachable or failed to load.
    #[error("failed to load runtime bootstrap: {0}")]
    ScriptInjection(String),

    /// A factory was available but instantiation raised.
    #[error("failed to start runtime: {0}")]
    FactoryInvocation(String),
}

impl LoadError {
    /// Returns the underlying message without the classification prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::ScriptInjection(msg) | Self::FactoryInvocation(msg) => msg,
        }
    }
}

/// Error reported by a [`RuntimeProvider`](crate::RuntimeProvider) or
/// [`RuntimeFactory`](crate::RuntimeFactory).
///
/// The loader decides the [`LoadError`] class from the phase that failed,
/// not from the variant.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The artifact could not be read or fetched.
    #[error("bootstrap artifact '{location}' unreachable: {reason}")]
    Unreachable { location: String, reason: String },

    /// The artifact was fetched but is not usable.
    #[error("bootstrap artifact '{location}' invalid: {reason}")]
    Invalid { location: String, reason: String },

    /// Loading finished without registering a factory.
    #[error("bootstrap finished without registering a runtime factory")]
    NoFactory,

    /// The factory raised while creating an instance.
    #[error("{0}")]
    Instantiation(String),
}

impl BootstrapError {
    /// Creates an unreachable-artifact error.
    pub fn unreachable(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unreachable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an invalid-artifact error.
    pub fn invalid(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::Invalid {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_display_and_message() {
        let err = LoadError::ScriptInjection("404".into());
        assert_eq!(err.to_string(), "failed to load runtime bootstrap: 404");
        assert_eq!(err.message(), "404");

        let err = LoadError::FactoryInvocation("prelude failed".into());
        assert!(err.to_string().contains("failed to start runtime"));
        assert_eq!(err.message(), "prelude failed");
    }

    #[test]
    fn bootstrap_error_display() {
        let err = BootstrapError::unreachable("https://cdn.example/prelude.lua", "timeout");
        assert!(err.to_string().contains("https://cdn.example/prelude.lua"));
        assert!(err.to_string().contains("timeout"));
    }
}
