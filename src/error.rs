//! Error types for avo-core.

use thiserror::Error;

use crate::verification::{VerificationLevel, VerificationMethod, VerificationStrategy};

/// Result type alias using avo-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during verification orchestration.
///
/// Only structural misconfiguration escapes [`crate::StrategyExecutor::verify`];
/// per-method and per-assumption failures are folded into the result itself.
#[derive(Error, Debug)]
pub enum Error {
    /// The candidate method list for the requested level is empty
    #[error("No verification methods available for {strategy} at {level} level")]
    NoMethodsAvailable {
        strategy: VerificationStrategy,
        level: VerificationLevel,
    },

    /// A single prover gateway call failed
    #[error("Prover call failed: {method} - {message}")]
    ProverCall {
        method: VerificationMethod,
        message: String,
    },

    /// History persistence error
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a prover call error.
    pub fn prover_call(method: VerificationMethod, message: impl Into<String>) -> Self {
        Self::ProverCall {
            method,
            message: message.into(),
        }
    }

    /// Create a no-methods-available error.
    pub fn no_methods(strategy: VerificationStrategy, level: VerificationLevel) -> Self {
        Self::NoMethodsAvailable { strategy, level }
    }

    /// Create a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Whether this error signals caller misconfiguration rather than a
    /// transient downstream failure.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::NoMethodsAvailable { .. } | Self::Config(_))
    }
}
