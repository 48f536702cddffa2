// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod predicate;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use predicate::{Predicate, PredicateError};
pub use time_provider::TimeProvider;
