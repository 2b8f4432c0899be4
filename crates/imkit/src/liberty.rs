//! Liberty server definitions under `usr/servers`

use crate::common::{is_plain_name, noop_error, probe_failed, reject_latest, tool_root};
use reconcile::{
    Action, ActionPlan, BenignRule, Classification, CommandOutput, CommandSpec, DesiredState,
    Driver, Error, ObservedState, Result, classify_with_rules,
};
use std::path::PathBuf;

pub const DEFAULT_ROOT: &str = "/opt/IBM/WebSphere/Liberty";

const RULES: &[BenignRule] = &[BenignRule::when(
    Action::Create,
    &["already exists"],
    "server already exists",
)];

#[derive(Debug, Default)]
pub struct LibertyServerDriver;

impl LibertyServerDriver {
    fn server_script(desired: &DesiredState) -> PathBuf {
        tool_root(desired, DEFAULT_ROOT).join("bin/server")
    }

    fn server_dir(desired: &DesiredState) -> PathBuf {
        tool_root(desired, DEFAULT_ROOT)
            .join("usr/servers")
            .join(desired.resource_id())
    }
}

/// Server names from `server list`, one per line after the heading
fn listed_servers(output: &str) -> impl Iterator<Item = &str> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains(' '))
}

impl Driver for LibertyServerDriver {
    fn kind(&self) -> &'static str {
        "liberty server"
    }

    fn tool_marker(&self, desired: &DesiredState) -> Option<PathBuf> {
        Some(Self::server_script(desired))
    }

    fn build_probe_command(&self, desired: &DesiredState) -> Result<Option<CommandSpec>> {
        Ok(Some(CommandSpec::new(Self::server_script(desired)).arg("list")))
    }

    fn parse_probe(&self, desired: &DesiredState, output: &CommandOutput) -> Result<ObservedState> {
        if !output.success() {
            return Err(probe_failed(desired, "could not list servers", output));
        }
        if listed_servers(&output.stdout).any(|name| name == desired.resource_id()) {
            Ok(ObservedState::present()
                .with_fact("server_name", desired.resource_id())
                .with_fact("server_dir", Self::server_dir(desired).display().to_string()))
        } else {
            Ok(ObservedState::absent())
        }
    }

    fn check_preconditions(&self, desired: &DesiredState, _plan: &ActionPlan) -> Result<()> {
        reject_latest(self.kind(), desired)?;
        if !is_plain_name(desired.resource_id()) {
            return Err(Error::precondition(format!(
                "invalid server name '{}'",
                desired.resource_id()
            )));
        }
        Ok(())
    }

    fn build_mutating_command(&self, desired: &DesiredState, plan: &ActionPlan) -> Result<CommandSpec> {
        match plan.action() {
            Action::Create => Ok(CommandSpec::new(Self::server_script(desired))
                .arg("create")
                .arg(desired.resource_id())),
            Action::Destroy => Ok(CommandSpec::new("rm")
                .arg("-rf")
                .path_arg(&Self::server_dir(desired))),
            Action::Update | Action::Noop => Err(noop_error(self.kind(), plan)),
        }
    }

    fn classify(&self, output: &CommandOutput, plan: &ActionPlan) -> Classification {
        classify_with_rules(RULES, output, plan)
    }
}
