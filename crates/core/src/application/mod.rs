// Application Layer - Polling engine and predicate adapters

pub mod adapter;
pub mod constants;
mod panic_guard;
pub mod poller;

// Re-exports
pub use adapter::{asynchronize, asynchronize_infallible, SyncPredicate};
pub use panic_guard::{execute_guarded, PanicGuardResult};
pub use poller::{poll, Poller};
