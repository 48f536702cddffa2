// Domain Layer - Pure polling configuration and session state

pub mod config;
pub mod error;
pub mod session;

// Re-exports
pub use config::{is_safe_integer, Interval, MaxAttempts, PollConfig, MAX_SAFE_INTEGER};
pub use error::{ConfigError, DomainError};
pub use session::{AttemptBudget, PollReport, PollSession, PollState};
