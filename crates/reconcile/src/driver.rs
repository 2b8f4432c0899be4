//! Driver trait - probe, build and classify for one kind of resource
//!
//! A driver knows one external tool: how to ask it what exists, how to parse
//! the answer, which command performs a transition, and how to read that
//! command's result. The engine owns the control flow; drivers own the
//! tool-specific text.

use crate::command::CommandSpec;
use crate::error::Result;
use crate::planner::{Action, ActionPlan};
use crate::types::{CommandOutput, DesiredState, ObservedState};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// How a driver reads the result of a mutating command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// The command did what was asked
    Success,
    /// The command failed, but only because the end state already held
    AlreadySatisfied { reason: String },
    /// A genuine failure
    Failure { reason: String },
}

impl Classification {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// A known "exit code that actually means success" for one action
///
/// Drivers enumerate these explicitly; nothing is inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenignRule {
    /// Action the rule applies to
    pub action: Action,
    /// Every needle must appear in stdout or stderr
    pub all_of: &'static [&'static str],
    /// None of these may appear
    pub none_of: &'static [&'static str],
    /// Reported as the already-satisfied reason
    pub reason: &'static str,
}

impl BenignRule {
    /// Rule that matches when every needle appears
    pub const fn when(
        action: Action,
        needles: &'static [&'static str],
        reason: &'static str,
    ) -> Self {
        Self {
            action,
            all_of: needles,
            none_of: &[],
            reason,
        }
    }

    /// Whether this rule recognises `output` for `action`
    pub fn matches(&self, output: &CommandOutput, action: Action) -> bool {
        self.action == action
            && !self.all_of.is_empty()
            && self.all_of.iter().all(|n| output.contains_ignore_case(n))
            && !self.none_of.iter().any(|n| output.contains_ignore_case(n))
    }
}

/// Standard classification: exit 0 is success, otherwise the first
/// matching benign rule wins, otherwise failure.
pub fn classify_with_rules(
    rules: &[BenignRule],
    output: &CommandOutput,
    plan: &ActionPlan,
) -> Classification {
    if output.success() {
        return Classification::Success;
    }
    if let Some(rule) = rules.iter().find(|r| r.matches(output, plan.action())) {
        return Classification::AlreadySatisfied {
            reason: rule.reason.to_string(),
        };
    }
    Classification::Failure {
        reason: match output.exit_code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        },
    }
}

/// Core trait for resource kinds
///
/// # Example
///
/// ```ignore
/// use reconcile::{Driver, DesiredState, ObservedState, CommandSpec, CommandOutput,
///     ActionPlan, Classification, Result};
///
/// #[derive(Debug)]
/// struct Marker;
///
/// impl Driver for Marker {
///     fn kind(&self) -> &'static str { "marker" }
///
///     fn build_probe_command(&self, d: &DesiredState) -> Result<Option<CommandSpec>> {
///         Ok(Some(CommandSpec::new("test").arg("-e").arg(d.resource_id())))
///     }
///
///     fn parse_probe(&self, _: &DesiredState, out: &CommandOutput) -> Result<ObservedState> {
///         Ok(if out.success() { ObservedState::present() } else { ObservedState::absent() })
///     }
///
///     fn build_mutating_command(&self, d: &DesiredState, _: &ActionPlan) -> Result<CommandSpec> {
///         Ok(CommandSpec::new("touch").arg(d.resource_id()))
///     }
///
///     fn classify(&self, out: &CommandOutput, _: &ActionPlan) -> Classification {
///         if out.success() { Classification::Success }
///         else { Classification::Failure { reason: out.stderr.clone() } }
///     }
/// }
/// ```
pub trait Driver: Send + Sync + fmt::Debug {
    /// Resource kind, e.g. "package", "profile"
    fn kind(&self) -> &'static str;

    /// Path whose absence means the tool itself is not installed.
    ///
    /// Checked before anything runs. `None` for drivers that install the
    /// tool themselves.
    fn tool_marker(&self, _desired: &DesiredState) -> Option<PathBuf> {
        None
    }

    /// Read-only inspection command.
    ///
    /// `None` when absence is already certain without running anything
    /// (for example, the destination directory does not exist).
    fn build_probe_command(&self, desired: &DesiredState) -> Result<Option<CommandSpec>>;

    /// Turn probe output into an observed state.
    ///
    /// A failed match is `present = false`, not an error. Return
    /// [`crate::Error::Probe`] only when the probe itself failed for a
    /// reason other than "not found".
    fn parse_probe(&self, desired: &DesiredState, output: &CommandOutput) -> Result<ObservedState>;

    /// Required-parameter checks for the planned action.
    ///
    /// Runs before the mutating command is built.
    fn check_preconditions(&self, _desired: &DesiredState, _plan: &ActionPlan) -> Result<()> {
        Ok(())
    }

    /// The install/uninstall/update/start/stop invocation
    fn build_mutating_command(&self, desired: &DesiredState, plan: &ActionPlan)
    -> Result<CommandSpec>;

    /// Read the mutating command's result
    fn classify(&self, output: &CommandOutput, plan: &ActionPlan) -> Classification;

    /// Human message for an outcome
    fn describe(&self, desired: &DesiredState, action: Action, changed: bool) -> String {
        let id = desired.resource_id();
        let kind = self.kind();
        match (action, changed) {
            (Action::Noop, _) => format!("{kind} '{id}' is already in the desired state"),
            (Action::Create, true) => format!("{kind} '{id}' created"),
            (Action::Destroy, true) => format!("{kind} '{id}' removed"),
            (Action::Update, true) => format!("{kind} '{id}' updated"),
            (_, false) => format!("{kind} '{id}' already satisfied"),
        }
    }
}

/// A boxed driver for configuration-driven selection
pub type BoxedDriver = Box<dyn Driver>;
