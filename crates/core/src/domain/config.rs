// Poll Configuration Domain Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;
use std::time::Duration;

use super::error::ConfigError;

/// Largest integer exactly representable as an IEEE-754 double (2^53 - 1)
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Returns true if `value` lies within the safe-integer range
pub fn is_safe_integer(value: i64) -> bool {
    (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&value)
}

/// Gap between the end of one evaluation and the start of the next.
///
/// Always a positive, safe-integer number of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u64")]
pub struct Interval(u64);

impl Interval {
    /// Validate a raw millisecond value
    ///
    /// # Errors
    /// - `ConfigError::InvalidInterval` if `millis` is outside the safe-integer range
    /// - `ConfigError::InvalidInterval` if `millis <= 0`
    pub fn from_millis(millis: i64) -> Result<Self, ConfigError> {
        if !is_safe_integer(millis) {
            return Err(ConfigError::InvalidInterval(format!(
                "interval {} is not a safe integer",
                millis
            )));
        }

        if millis <= 0 {
            return Err(ConfigError::InvalidInterval(format!(
                "interval {} is non-positive",
                millis
            )));
        }

        Ok(Self(millis as u64))
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl TryFrom<i64> for Interval {
    type Error = ConfigError;

    fn try_from(millis: i64) -> Result<Self, Self::Error> {
        Self::from_millis(millis)
    }
}

impl From<Interval> for u64 {
    fn from(interval: Interval) -> Self {
        interval.0
    }
}

impl FromStr for Interval {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let millis: i64 = s.trim().parse().map_err(|_| {
            ConfigError::InvalidInterval(format!("interval {} is not a safe integer", s))
        })?;
        Self::from_millis(millis)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Maximum number of predicate evaluations in one poll session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Option<f64>", into = "Option<u64>")]
pub enum MaxAttempts {
    Limited(NonZeroU64),
    Unbounded,
}

impl MaxAttempts {
    /// Build a limited budget
    ///
    /// # Errors
    /// - `ConfigError::InvalidMaxAttempts` if `attempts == 0`
    pub fn limited(attempts: u64) -> Result<Self, ConfigError> {
        NonZeroU64::new(attempts)
            .map(MaxAttempts::Limited)
            .ok_or_else(|| {
                ConfigError::InvalidMaxAttempts(format!("maxAttempts {} is non-positive", attempts))
            })
    }

    /// Resolve a raw attempt count
    ///
    /// `None` (unset) and `+inf` both mean unbounded. A fractional budget
    /// rounds up: every started unit of budget buys one evaluation.
    ///
    /// # Errors
    /// - `ConfigError::InvalidMaxAttempts` if `raw` is NaN
    /// - `ConfigError::InvalidMaxAttempts` if `raw <= 0`
    pub fn from_raw(raw: Option<f64>) -> Result<Self, ConfigError> {
        let value = match raw {
            None => return Ok(MaxAttempts::Unbounded),
            Some(value) => value,
        };

        if value.is_nan() {
            return Err(ConfigError::InvalidMaxAttempts(format!(
                "maxAttempts {} is not a number",
                value
            )));
        }

        if value <= 0.0 {
            return Err(ConfigError::InvalidMaxAttempts(format!(
                "maxAttempts {} is non-positive",
                value
            )));
        }

        if value.is_infinite() {
            return Ok(MaxAttempts::Unbounded);
        }

        // value > 0, so the ceiling is at least 1; `as` saturates huge values
        Self::limited(value.ceil() as u64)
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, MaxAttempts::Unbounded)
    }

    /// Limit as a plain number (`None` when unbounded)
    pub fn get(&self) -> Option<u64> {
        match self {
            MaxAttempts::Limited(n) => Some(n.get()),
            MaxAttempts::Unbounded => None,
        }
    }
}

impl Default for MaxAttempts {
    fn default() -> Self {
        MaxAttempts::Unbounded
    }
}

impl TryFrom<Option<f64>> for MaxAttempts {
    type Error = ConfigError;

    fn try_from(raw: Option<f64>) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
    }
}

impl From<MaxAttempts> for Option<u64> {
    fn from(max_attempts: MaxAttempts) -> Self {
        max_attempts.get()
    }
}

impl FromStr for MaxAttempts {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "inf" | "infinity" | "unbounded" | "none" => return Ok(MaxAttempts::Unbounded),
            _ => {}
        }

        let value: f64 = trimmed.parse().map_err(|_| {
            ConfigError::InvalidMaxAttempts(format!("maxAttempts {} is not a number", s))
        })?;
        Self::from_raw(Some(value))
    }
}

impl fmt::Display for MaxAttempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxAttempts::Limited(n) => write!(f, "{}", n),
            MaxAttempts::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Immutable configuration of one poll session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval: Interval,
    #[serde(default)]
    pub max_attempts: MaxAttempts,
}

impl PollConfig {
    pub fn new(interval: Interval, max_attempts: MaxAttempts) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Validate raw values: interval first, then max attempts
    pub fn from_raw(interval_ms: i64, max_attempts: Option<f64>) -> Result<Self, ConfigError> {
        let interval = Interval::from_millis(interval_ms)?;
        let max_attempts = MaxAttempts::from_raw(max_attempts)?;
        Ok(Self::new(interval, max_attempts))
    }
}
