// Pollster Infrastructure - System Adapters
// Implements: Predicate over child processes

pub mod spawn_options;
pub mod subprocess_predicate;

pub use spawn_options::{SpawnOptions, StdioMode};
pub use subprocess_predicate::{spawn_predicate, SubprocessPredicate};
