// Poll Session Domain Model

use serde::{Deserialize, Serialize};

use super::config::MaxAttempts;
use super::error::{DomainError, Result};

/// Poll Session State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollState {
    Validating,
    Evaluating,
    Waiting,
    Succeeded,
    Failed,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollState::Succeeded | PollState::Failed)
    }

    fn can_transition_to(&self, next: PollState) -> bool {
        use PollState::*;
        matches!(
            (self, next),
            (Validating, Evaluating)
                | (Validating, Failed)
                | (Evaluating, Succeeded)
                | (Evaluating, Failed)
                | (Evaluating, Waiting)
                | (Waiting, Evaluating)
                | (Waiting, Failed)
        )
    }
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollState::Validating => write!(f, "VALIDATING"),
            PollState::Evaluating => write!(f, "EVALUATING"),
            PollState::Waiting => write!(f, "WAITING"),
            PollState::Succeeded => write!(f, "SUCCEEDED"),
            PollState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Remaining evaluations for one poll session
///
/// Decremented once per failed evaluation. Never shared between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptBudget {
    remaining: Option<u64>,
}

impl AttemptBudget {
    pub fn new(max_attempts: MaxAttempts) -> Self {
        Self {
            remaining: max_attempts.get(),
        }
    }

    /// Consume one attempt after a failed evaluation
    pub fn consume(&mut self) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    /// Unbounded budgets are never exhausted
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }
}

/// State tracker for one poll session
///
/// Owned by exactly one in-flight session; enforces legal transitions.
#[derive(Debug)]
pub struct PollSession {
    pub id: String,
    pub state: PollState,
    pub budget: AttemptBudget,
    pub attempts: u64,
    pub started_at: i64, // epoch ms
}

impl PollSession {
    pub fn new(id: impl Into<String>, started_at: i64, max_attempts: MaxAttempts) -> Self {
        Self {
            id: id.into(),
            state: PollState::Validating,
            budget: AttemptBudget::new(max_attempts),
            attempts: 0,
            started_at,
        }
    }

    fn transition(&mut self, next: PollState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// VALIDATING/WAITING -> EVALUATING, counting the attempt
    pub fn begin_evaluation(&mut self) -> Result<()> {
        self.transition(PollState::Evaluating)?;
        self.attempts += 1;
        Ok(())
    }

    /// EVALUATING -> WAITING, consuming one unit of budget
    pub fn wait(&mut self) -> Result<()> {
        self.transition(PollState::Waiting)?;
        self.budget.consume();
        Ok(())
    }

    pub fn succeed(&mut self) -> Result<()> {
        self.transition(PollState::Succeeded)
    }

    pub fn fail(&mut self) -> Result<()> {
        self.transition(PollState::Failed)
    }

    /// Build the outcome summary once terminal
    pub fn report(&self, finished_at: i64) -> PollReport {
        PollReport {
            session_id: self.id.clone(),
            state: self.state,
            attempts: self.attempts,
            elapsed_ms: (finished_at - self.started_at).max(0),
        }
    }
}

/// Summary of a finished poll session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReport {
    pub session_id: String,
    pub state: PollState,
    pub attempts: u64,
    pub elapsed_ms: i64,
}
