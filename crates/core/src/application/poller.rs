// Polling engine: repeated predicate evaluation under an interval and attempt budget
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::panic_guard::panic_message;
use crate::domain::{PollConfig, PollReport, PollSession};
use crate::error::{PollError, Result};
use crate::port::id_provider::UuidProvider;
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{IdProvider, Predicate, PredicateError, TimeProvider};

/// Drives poll sessions
///
/// Each call to [`Poller::poll`] is an independent session with its own
/// attempt budget. Evaluations within a session are strictly sequential.
pub struct Poller {
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(Arc::new(SystemTimeProvider), Arc::new(UuidProvider))
    }
}

impl Poller {
    /// Create a new poller
    ///
    /// # Arguments
    /// * `time_provider` - Clock used for elapsed-time reporting
    /// * `id_provider` - Source of session IDs (log correlation)
    pub fn new(time_provider: Arc<dyn TimeProvider>, id_provider: Arc<dyn IdProvider>) -> Self {
        Self {
            time_provider,
            id_provider,
        }
    }

    /// Evaluate `predicate` until it reports true, fails, or the budget runs out
    ///
    /// Returns:
    /// - `Ok(report)` once the predicate reports true
    /// - `Err(PollError::Predicate)` on the first predicate error
    /// - `Err(PollError::AttemptsExhausted)` once the budget reaches zero
    ///
    /// The wait between evaluations is a tokio sleep, so only this session is
    /// suspended. The interval is measured from the end of one evaluation to
    /// the start of the next.
    pub async fn poll(&self, predicate: &dyn Predicate, config: &PollConfig) -> Result<PollReport> {
        let session = PollSession::new(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            config.max_attempts,
        );

        let span = info_span!("poll", session_id = %session.id);
        self.run(session, predicate, config).instrument(span).await
    }

    async fn run(
        &self,
        mut session: PollSession,
        predicate: &dyn Predicate,
        config: &PollConfig,
    ) -> Result<PollReport> {
        debug!(
            interval_ms = config.interval.as_millis(),
            max_attempts = %config.max_attempts,
            "Starting poll session"
        );

        loop {
            if session.budget.is_exhausted() {
                session.fail()?;
                warn!(attempts = session.attempts, "Attempt budget exhausted");
                return Err(PollError::AttemptsExhausted {
                    attempts: session.attempts,
                });
            }

            session.begin_evaluation()?;
            debug!(attempt = session.attempts, "Evaluating predicate");

            match predicate.evaluate().await {
                Ok(true) => {
                    session.succeed()?;
                    let report = session.report(self.time_provider.now_millis());
                    info!(
                        attempts = report.attempts,
                        elapsed_ms = report.elapsed_ms,
                        "Condition met"
                    );
                    return Ok(report);
                }
                Ok(false) => {
                    session.wait()?;
                    debug!(
                        attempt = session.attempts,
                        remaining = ?session.budget.remaining(),
                        interval_ms = config.interval.as_millis(),
                        "Condition not met, waiting"
                    );
                    sleep(config.interval.as_duration()).await;
                }
                Err(e) => {
                    session.fail()?;
                    warn!(attempt = session.attempts, error = %e, "Predicate failed");
                    return Err(e.into());
                }
            }
        }
    }
}

/// Callback-style entry point
///
/// Configuration errors are reported to `on_done` before returning and no
/// evaluation happens (`None` is returned). The same applies when there is no
/// tokio runtime to run the session on (`PollError::Runtime`). Otherwise the
/// session is spawned on the current runtime and `on_done` runs exactly once
/// when it ends. A predicate that panics ends the session with
/// `PredicateError::Panicked`.
///
/// `max_attempts = None` means unbounded, same as `Some(f64::INFINITY)`.
///
/// # Example
/// ```text
/// poll(predicate, 100, Some(5.0), |result| match result {
///     Ok(report) => println!("ready after {} attempts", report.attempts),
///     Err(e) => eprintln!("gave up: {}", e),
/// });
/// ```
pub fn poll<P, F>(
    predicate: P,
    interval_ms: i64,
    max_attempts: Option<f64>,
    on_done: F,
) -> Option<JoinHandle<()>>
where
    P: Predicate + 'static,
    F: FnOnce(Result<PollReport>) + Send + 'static,
{
    let config = match PollConfig::from_raw(interval_ms, max_attempts) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Rejected poll configuration");
            on_done(Err(e.into()));
            return None;
        }
    };

    let runtime = match Handle::try_current() {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!(error = %e, "No runtime to poll on");
            on_done(Err(PollError::Runtime(e.to_string())));
            return None;
        }
    };

    let poller = Poller::default();
    Some(runtime.spawn(async move {
        let session = AssertUnwindSafe(poller.poll(&predicate, &config)).catch_unwind();
        let result = match session.await {
            Ok(result) => result,
            Err(payload) => {
                let panic_msg = panic_message(payload.as_ref());
                error!(panic_msg = %panic_msg, "Predicate panicked during poll session");
                Err(PredicateError::Panicked(panic_msg).into())
            }
        };
        on_done(result);
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Interval, MaxAttempts, PollState};
    use crate::port::id_provider::SequentialIdProvider;
    use crate::port::predicate::mocks::MockPredicate;
    use crate::port::time_provider::FixedTimeProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Panics on its first evaluation
    struct PanickingPredicate;

    #[async_trait]
    impl Predicate for PanickingPredicate {
        async fn evaluate(&self) -> std::result::Result<bool, PredicateError> {
            panic!("socket closed")
        }
    }

    /// Moves the clock forward by `step_ms` on every evaluation
    struct ClockStepPredicate {
        clock: Arc<FixedTimeProvider>,
        step_ms: i64,
        succeed_on: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Predicate for ClockStepPredicate {
        async fn evaluate(&self) -> std::result::Result<bool, PredicateError> {
            self.clock.advance(self.step_ms);
            Ok(self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.succeed_on)
        }
    }

    fn config(interval_ms: i64, max_attempts: Option<u64>) -> PollConfig {
        let max_attempts = match max_attempts {
            Some(n) => MaxAttempts::limited(n).unwrap(),
            None => MaxAttempts::Unbounded,
        };
        PollConfig::new(Interval::from_millis(interval_ms).unwrap(), max_attempts)
    }

    fn test_poller() -> Poller {
        Poller::new(
            Arc::new(FixedTimeProvider::new(1000)),
            Arc::new(SequentialIdProvider::default()),
        )
    }

    #[tokio::test]
    async fn test_always_true_succeeds_on_first_evaluation() {
        let predicate = MockPredicate::always_true();

        let report = test_poller()
            .poll(&predicate, &config(1000, None))
            .await
            .unwrap();

        assert_eq!(predicate.call_count(), 1);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.state, PollState::Succeeded);
        assert_eq!(report.session_id, "session-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_false_exhausts_after_exactly_max_attempts() {
        let predicate = MockPredicate::always_false();

        let err = test_poller()
            .poll(&predicate, &config(5, Some(5)))
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::AttemptsExhausted { attempts: 5 }));
        assert_eq!(predicate.call_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_nth_call_waits_n_minus_one_intervals() {
        let predicate = MockPredicate::succeed_after(10);
        let start = tokio::time::Instant::now();

        let report = test_poller()
            .poll(&predicate, &config(10, None))
            .await
            .unwrap();

        assert_eq!(report.attempts, 11);
        assert_eq!(predicate.call_count(), 11);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(110), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluations_are_spaced_by_interval() {
        let predicate = MockPredicate::succeed_after(3);

        test_poller()
            .poll(&predicate, &config(50, Some(10)))
            .await
            .unwrap();

        let times = predicate.call_times();
        assert_eq!(times.len(), 4);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(50));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_error_ends_session_immediately() {
        let predicate = MockPredicate::fail_after(2, "command not found");

        let err = test_poller()
            .poll(&predicate, &config(10, None))
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::Predicate(_)));
        assert!(err.to_string().contains("command not found"));
        assert_eq!(predicate.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_last_allowed_attempt() {
        let predicate = MockPredicate::succeed_after(2);

        let report = test_poller()
            .poll(&predicate, &config(5, Some(3)))
            .await
            .unwrap();

        assert_eq!(report.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_elapsed_uses_time_provider() {
        let clock = Arc::new(FixedTimeProvider::new(1000));
        let predicate = ClockStepPredicate {
            clock: clock.clone(),
            step_ms: 250,
            succeed_on: 3,
            calls: AtomicU32::new(0),
        };
        let poller = Poller::new(clock.clone(), Arc::new(SequentialIdProvider::default()));

        let report = poller.poll(&predicate, &config(10, None)).await.unwrap();

        assert_eq!(report.attempts, 3);
        assert_eq!(report.elapsed_ms, 750);
        assert_eq!(clock.now_millis(), 1750);
    }

    #[tokio::test]
    async fn test_callback_reports_predicate_panic() {
        let (tx, rx) = oneshot::channel();

        let handle = poll(PanickingPredicate, 10, None, move |result| {
            let _ = tx.send(result);
        })
        .unwrap();

        handle.await.unwrap();
        let err = rx.await.unwrap().unwrap_err();
        match err {
            PollError::Predicate(PredicateError::Panicked(msg)) => {
                assert_eq!(msg, "socket closed")
            }
            other => panic!("expected Panicked, got {}", other),
        }
    }

    #[test]
    fn test_callback_without_runtime_reports_error() {
        let predicate = Arc::new(MockPredicate::always_true());
        let (tx, mut rx) = oneshot::channel();

        let handle = poll(predicate.clone(), 10, None, move |result| {
            let _ = tx.send(result);
        });

        assert!(handle.is_none());
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, PollError::Runtime(_)), "{}", err);
        assert_eq!(predicate.call_count(), 0);
    }

    #[tokio::test]
    async fn test_callback_reports_config_error_synchronously() {
        let predicate = Arc::new(MockPredicate::always_true());
        let (tx, mut rx) = oneshot::channel();

        let handle = poll(predicate.clone(), 0, None, move |result| {
            let _ = tx.send(result);
        });

        assert!(handle.is_none());
        // on_done already ran, before poll returned
        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("interval 0 is non-positive"));
        assert_eq!(predicate.call_count(), 0);
    }

    #[tokio::test]
    async fn test_callback_rejects_invalid_max_attempts() {
        for max_attempts in [Some(f64::NAN), Some(0.0), Some(-3.0)] {
            let predicate = Arc::new(MockPredicate::always_true());
            let (tx, mut rx) = oneshot::channel();

            let handle = poll(predicate.clone(), 10, max_attempts, move |result| {
                let _ = tx.send(result);
            });

            assert!(handle.is_none());
            let err = rx.try_recv().unwrap().unwrap_err();
            assert!(err.is_config(), "{}", err);
            assert_eq!(predicate.call_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_callback_success() {
        let (tx, rx) = oneshot::channel();

        let handle = poll(MockPredicate::always_true(), 1000, Some(f64::INFINITY), move |result| {
            let _ = tx.send(result);
        })
        .unwrap();

        handle.await.unwrap();
        let report = rx.await.unwrap().unwrap();
        assert_eq!(report.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_unset_max_attempts_is_unbounded() {
        let predicate = Arc::new(MockPredicate::succeed_after(10));
        let (tx, rx) = oneshot::channel();

        poll(predicate.clone(), 1, None, move |result| {
            let _ = tx.send(result);
        })
        .unwrap();

        let report = rx.await.unwrap().unwrap();
        assert_eq!(report.attempts, 11);
        assert_eq!(predicate.call_count(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_exhaustion() {
        let predicate = Arc::new(MockPredicate::always_false());
        let (tx, rx) = oneshot::channel();

        poll(predicate.clone(), 5, Some(5.0), move |result| {
            let _ = tx.send(result);
        })
        .unwrap();

        let err = rx.await.unwrap().unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(predicate.call_count(), 5);
    }
}
