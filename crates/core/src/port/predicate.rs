// Predicate Port
// Abstraction for one evaluation of the condition being polled

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors delivered by a predicate evaluation
///
/// Propagated verbatim to the poll session's completion; never retried.
#[derive(Error, Debug)]
pub enum PredicateError {
    /// A synchronous check returned an error
    #[error("Predicate check failed: {0}")]
    Check(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A synchronous check panicked
    #[error("Predicate panicked: {0}")]
    Panicked(String),

    #[error("Predicate spawn failed: {0}")]
    Spawn(String),

    #[error("Predicate IO error: {0}")]
    Io(String),

    #[error("Predicate exited with code {0}")]
    ExitCode(i32),

    /// Terminated by a signal the predicate did not send itself
    #[error("Predicate interrupted: {signal}")]
    Interrupted { signal: String },

    /// Terminated by the predicate's own timeout
    #[error("Predicate interrupted: {signal} (timed out after {timeout_ms}ms)")]
    TimedOut { timeout_ms: u64, signal: String },
}

impl PredicateError {
    /// Wrap any error type returned by a synchronous check
    pub fn check<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PredicateError::Check(Box::new(err))
    }

    /// True if the process was terminated by a signal (ours or external)
    pub fn is_signal(&self) -> bool {
        matches!(
            self,
            PredicateError::Interrupted { .. } | PredicateError::TimedOut { .. }
        )
    }
}

/// Predicate trait
///
/// One call to `evaluate` delivers exactly one of:
/// - `Ok(true)`: condition met
/// - `Ok(false)`: condition not yet met
/// - `Err(_)`: evaluation failed
///
/// Implementations:
/// - SyncPredicate: wraps a synchronous check (core)
/// - SubprocessPredicate: runs a child process per call (infra-system)
#[async_trait]
pub trait Predicate: Send + Sync {
    async fn evaluate(&self) -> Result<bool, PredicateError>;
}

#[async_trait]
impl<P: Predicate + ?Sized> Predicate for Arc<P> {
    async fn evaluate(&self) -> Result<bool, PredicateError> {
        (**self).evaluate().await
    }
}

#[async_trait]
impl<P: Predicate + ?Sized> Predicate for Box<P> {
    async fn evaluate(&self) -> Result<bool, PredicateError> {
        (**self).evaluate().await
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Mock predicate behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always report the given value
        Always(bool),
        /// Report false for the first N calls, then true
        SucceedAfter(usize),
        /// Report false for the first N calls, then fail with message
        FailAfter(usize, String),
    }

    /// Mock Predicate for testing
    pub struct MockPredicate {
        behavior: MockBehavior,
        calls: Mutex<Vec<Instant>>,
    }

    impl MockPredicate {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                calls: Mutex::new(Vec::new()),
            }
        }
        pub fn always_true() -> Self {
            Self::new(MockBehavior::Always(true))
        }
        pub fn always_false() -> Self {
            Self::new(MockBehavior::Always(false))
        }
        pub fn succeed_after(failures: usize) -> Self {
            Self::new(MockBehavior::SucceedAfter(failures))
        }
        pub fn fail_after(failures: usize, message: impl Into<String>) -> Self {
            Self::new(MockBehavior::FailAfter(failures, message.into()))
        }
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
        /// Instants at which each evaluation started
        pub fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Predicate for MockPredicate {
        async fn evaluate(&self) -> Result<bool, PredicateError> {
            let previous = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(Instant::now());
                calls.len() - 1
            };

            match &self.behavior {
                MockBehavior::Always(value) => Ok(*value),
                MockBehavior::SucceedAfter(failures) => Ok(previous >= *failures),
                MockBehavior::FailAfter(failures, msg) => {
                    if previous >= *failures {
                        Err(PredicateError::Spawn(msg.clone()))
                    } else {
                        Ok(false)
                    }
                }
            }
        }
    }
}
