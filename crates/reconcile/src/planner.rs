//! State comparator - decides the one action needed to converge

use crate::types::{ObservedState, TargetPresence};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the engine must do to reach the desired state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Already in the desired state
    Noop,
    /// Bring the resource into existence
    Create,
    /// Remove the resource
    Destroy,
    /// Move the resource to the newest level
    Update,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Create => "create",
            Self::Destroy => "destroy",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The decided action for one reconciliation
///
/// Only [`compare`] and [`plan`] construct this; callers cannot fabricate
/// a plan that disagrees with the observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPlan {
    action: Action,
}

impl ActionPlan {
    pub fn action(&self) -> Action {
        self.action
    }

    pub fn is_noop(&self) -> bool {
        self.action == Action::Noop
    }

    /// Whether carrying out this plan changes the managed system
    pub fn mutates(&self) -> bool {
        !self.is_noop()
    }
}

/// Decide the action from the target and whether the resource is present
///
/// | target  | present | action  |
/// |---------|---------|---------|
/// | present | false   | create  |
/// | present | true    | noop    |
/// | absent  | true    | destroy |
/// | absent  | false   | noop    |
/// | latest  | any     | update  |
pub fn compare(target: TargetPresence, present: bool) -> ActionPlan {
    let action = match (target, present) {
        (TargetPresence::Present, false) => Action::Create,
        (TargetPresence::Present, true) => Action::Noop,
        (TargetPresence::Absent, true) => Action::Destroy,
        (TargetPresence::Absent, false) => Action::Noop,
        (TargetPresence::Latest, _) => Action::Update,
    };
    ActionPlan { action }
}

/// [`compare`] against a full observed state
pub fn plan(target: TargetPresence, observed: &ObservedState) -> ActionPlan {
    compare(target, observed.present)
}
