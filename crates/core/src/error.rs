// Central Error Type for a poll session

use thiserror::Error;

use crate::domain::{ConfigError, DomainError};
use crate::port::PredicateError;

/// Poll session error type
///
/// Every terminal failure of a poll session is reported as exactly one of these.
#[derive(Error, Debug)]
pub enum PollError {
    /// Rejected before any evaluation; never retried
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Attempt budget reached zero without the predicate succeeding
    #[error("Predicate not satisfied after {attempts} attempts")]
    AttemptsExhausted { attempts: u64 },

    /// Error surfaced by the predicate, propagated verbatim
    #[error(transparent)]
    Predicate(#[from] PredicateError),

    /// `poll` was called outside a tokio runtime
    #[error("Runtime unavailable: {0}")]
    Runtime(String),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl PollError {
    /// True for configuration errors (detected before any evaluation)
    pub fn is_config(&self) -> bool {
        matches!(self, PollError::Config(_) | PollError::Domain(DomainError::Config(_)))
    }

    /// True if the attempt budget ran out
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PollError::AttemptsExhausted { .. })
    }
}

/// Result type alias using PollError
pub type Result<T> = std::result::Result<T, PollError>;
