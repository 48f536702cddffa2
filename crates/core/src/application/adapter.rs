// Predicate adapter: synchronous check -> async Predicate
use async_trait::async_trait;
use std::convert::Infallible;
use tracing::trace;

use super::panic_guard::{execute_guarded, PanicGuardResult};
use crate::port::{Predicate, PredicateError};

/// Async predicate backed by a synchronous check
///
/// Each evaluation calls the check exactly once:
/// - `Ok(b)` is delivered as `b`
/// - `Err(e)` is delivered as `PredicateError::Check(e)`
/// - a panic is delivered as `PredicateError::Panicked`
pub struct SyncPredicate<F> {
    check: F,
}

impl<F> SyncPredicate<F> {
    pub fn new(check: F) -> Self {
        Self { check }
    }
}

/// Wrap a fallible synchronous check as a predicate
///
/// # Example
/// ```text
/// let predicate = asynchronize(|| std::fs::metadata("/tmp/ready").map(|m| m.is_file()));
/// ```
pub fn asynchronize<F, E>(check: F) -> SyncPredicate<F>
where
    F: Fn() -> Result<bool, E> + Send + Sync,
    E: std::error::Error + Send + Sync + 'static,
{
    SyncPredicate::new(check)
}

/// Wrap an infallible synchronous check as a predicate
pub fn asynchronize_infallible<F>(
    check: F,
) -> SyncPredicate<impl Fn() -> Result<bool, Infallible> + Send + Sync>
where
    F: Fn() -> bool + Send + Sync,
{
    SyncPredicate::new(move || Ok(check()))
}

#[async_trait]
impl<F, E> Predicate for SyncPredicate<F>
where
    F: Fn() -> Result<bool, E> + Send + Sync,
    E: std::error::Error + Send + Sync + 'static,
{
    async fn evaluate(&self) -> Result<bool, PredicateError> {
        let outcome = match execute_guarded(|| (self.check)()) {
            PanicGuardResult::Success(Ok(met)) => Ok(met),
            PanicGuardResult::Success(Err(e)) => Err(PredicateError::check(e)),
            PanicGuardResult::Panicked(msg) => Err(PredicateError::Panicked(msg)),
        };

        trace!(outcome = ?outcome.as_ref().map_err(|e| e.to_string()), "Synchronous check evaluated");
        outcome
    }
}
