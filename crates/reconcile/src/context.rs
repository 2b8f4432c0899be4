//! Phase tracking for one reconciliation
//!
//! The engine reports every state-machine transition to a [`PhaseObserver`],
//! so hosts can render progress without the engine depending on any UI.

use crate::planner::Action;
use serde::Serialize;
use std::fmt;

/// Where a reconciliation is in its lifecycle
///
/// `NotProbed -> Probed -> PlanDecided -> {Skipped | Executed} -> Classified -> Reported`.
/// `Skipped` and `Reported` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotProbed,
    Probed,
    PlanDecided,
    Skipped,
    Executed,
    Classified,
    Reported,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Reported)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotProbed => "not-probed",
            Self::Probed => "probed",
            Self::PlanDecided => "plan-decided",
            Self::Skipped => "skipped",
            Self::Executed => "executed",
            Self::Classified => "classified",
            Self::Reported => "reported",
        };
        f.write_str(name)
    }
}

/// Receives phase transitions
pub trait PhaseObserver {
    /// Called on every transition
    fn on_phase(&mut self, phase: Phase);

    /// Called once the plan is known
    fn on_plan(&mut self, _action: Action) {}

    /// Called right before the mutating command runs, with the redacted
    /// command line
    fn on_execute(&mut self, _command: &str) {}
}

/// Observer that ignores everything
pub struct NoObserver;

impl PhaseObserver for NoObserver {
    fn on_phase(&mut self, _phase: Phase) {}
}

/// Observer that remembers the phases it saw
#[derive(Debug, Default)]
pub struct PhaseLog {
    pub phases: Vec<Phase>,
    pub action: Option<Action>,
    pub commands: Vec<String>,
}

impl PhaseLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last phase reached
    pub fn last(&self) -> Option<Phase> {
        self.phases.last().copied()
    }
}

impl PhaseObserver for PhaseLog {
    fn on_phase(&mut self, phase: Phase) {
        self.phases.push(phase);
    }

    fn on_plan(&mut self, action: Action) {
        self.action = Some(action);
    }

    fn on_execute(&mut self, command: &str) {
        self.commands.push(command.to_string());
    }
}
