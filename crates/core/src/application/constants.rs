// Polling constants (No magic values)
use std::time::Duration;

/// Default gap between evaluations (1s)
pub const DEFAULT_INTERVAL_MS: i64 = 1000;

/// Default hard timeout for one subprocess evaluation (10s)
pub const DEFAULT_SUBPROCESS_TIMEOUT_MS: i64 = 10_000;

/// Exit code a subprocess uses to report "condition met"
pub const EXIT_CONDITION_MET: i32 = 0;

/// Exit code a subprocess uses to report "condition not yet met"
pub const EXIT_CONDITION_NOT_MET: i32 = 1;

/// Grace period between the configured kill signal and a forced kill (5 seconds)
/// Only matters when the timeout signal is catchable (e.g. SIGTERM)
pub const KILL_GRACE_PERIOD: Duration = Duration::from_millis(5000);
