//! Pipeline state machine.
//!
//! # State Transitions
//! ```text
//! Validating → Attempting         (request admitted)
//! Validating → Auditing           (input error)
//! Attempting → Deciding           (external call succeeded, gate configured)
//! Attempting → Executing          (external call succeeded, no gate)
//! Attempting → Auditing           (exhausted, fatal, cancelled, acquire failure)
//! Deciding   → Executing          (Proceed)
//! Deciding   → Auditing           (Deny, engine failure)
//! Executing  → Auditing           (success or side-effect failure)
//! Auditing   → Terminal(outcome)
//! ```

use serde::Serialize;

use crate::audit::record::OutcomeClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "outcome")]
pub enum PipelineState {
    Validating,
    Attempting,
    Deciding,
    Executing,
    Auditing,
    Terminal(OutcomeClass),
}

impl PipelineState {
    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Validating, Attempting)
                | (Validating, Auditing)
                | (Attempting, Deciding)
                | (Attempting, Executing)
                | (Attempting, Auditing)
                | (Deciding, Executing)
                | (Deciding, Auditing)
                | (Executing, Auditing)
                | (Auditing, Terminal(_))
        )
    }

    /// Lowercase stage name used in audit details.
    pub fn stage_name(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Attempting => "attempting",
            Self::Deciding => "deciding",
            Self::Executing => "executing",
            Self::Auditing => "auditing",
            Self::Terminal(_) => "terminal",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

/// Ordered record of the states one run passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTrace {
    states: Vec<PipelineState>,
}

impl StateTrace {
    pub fn new() -> Self {
        Self {
            states: vec![PipelineState::Validating],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Validating)
    }

    /// Move to `next`. Illegal transitions are logged and still recorded so
    /// the trace stays faithful to what actually ran.
    pub fn advance(&mut self, next: PipelineState) {
        let current = self.current();
        if !current.can_transition_to(&next) {
            tracing::error!(from = ?current, to = ?next, "Illegal pipeline transition");
        } else {
            tracing::trace!(from = ?current, to = ?next, "Pipeline transition");
        }
        self.states.push(next);
    }

    pub fn states(&self) -> &[PipelineState] {
        &self.states
    }
}

impl Default for StateTrace {
    fn default() -> Self {
        Self::new()
    }
}
