// Pollster Core - Polling Engine, Domain & Ports
// NO infrastructure dependencies (Hexagonal Architecture)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{asynchronize, asynchronize_infallible, poll, Poller, SyncPredicate};
pub use domain::{Interval, MaxAttempts, PollConfig, PollReport};
pub use error::{PollError, Result};
pub use port::{Predicate, PredicateError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
