// Domain Error Types

use thiserror::Error;

/// Configuration errors, detected before any predicate evaluation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0}")]
    InvalidInterval(String),

    #[error("{0}")]
    InvalidMaxAttempts(String),

    #[error("{0}")]
    InvalidTimeout(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid poll state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, DomainError>;
