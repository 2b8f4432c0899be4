//! WebSphere profiles via `manageprofiles.sh`

use crate::common::{
    is_plain_name, noop_error, probe_failed, reject_latest, required, required_credentials,
    tool_root,
};
use reconcile::{
    Action, ActionPlan, BenignRule, Classification, CommandOutput, CommandSpec, DesiredState,
    Driver, Error, ObservedState, Result, classify_with_rules,
};
use std::path::PathBuf;

pub const DEFAULT_ROOT: &str = "/opt/IBM/WebSphere/AppServer";

/// Profile templates under `profileTemplates/`
const TEMPLATES: &[&str] = &["management", "managed", "default"];

const RULES: &[BenignRule] = &[
    BenignRule::when(
        Action::Destroy,
        &["INSTCONFFAILED", "does not exist"],
        "profile does not exist",
    ),
    BenignRule::when(
        Action::Destroy,
        &["INSTCONFFAILED", "cannot be found"],
        "profile does not exist",
    ),
    BenignRule::when(Action::Create, &["INSTCONFFAILED", "already exists"], "profile already exists"),
];

/// Creates and deletes deployment manager and node agent profiles
///
/// Parameters: `template` (`management` by default, or `managed`),
/// `cell_name`, `host_name`, `node_name`. Creating a profile enables
/// administrative security and so needs credentials.
#[derive(Debug, Default)]
pub struct ProfileDriver;

impl ProfileDriver {
    fn manageprofiles(desired: &DesiredState) -> PathBuf {
        tool_root(desired, DEFAULT_ROOT).join("bin/manageprofiles.sh")
    }

    fn template(desired: &DesiredState) -> Result<&str> {
        let template = desired.parameters().get("template").unwrap_or("management");
        if TEMPLATES.contains(&template) {
            Ok(template)
        } else {
            Err(Error::precondition(format!(
                "unknown profile template '{template}' (expected one of {})",
                TEMPLATES.join(", ")
            )))
        }
    }
}

/// Profile names from `-listProfiles` output: `[Dmgr01, AppSrv01]`
pub fn parse_profile_list(output: &str) -> Vec<&str> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('[')?.strip_suffix(']'))
        .flat_map(|inner| inner.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

impl Driver for ProfileDriver {
    fn kind(&self) -> &'static str {
        "profile"
    }

    fn tool_marker(&self, desired: &DesiredState) -> Option<PathBuf> {
        Some(Self::manageprofiles(desired))
    }

    fn build_probe_command(&self, desired: &DesiredState) -> Result<Option<CommandSpec>> {
        Ok(Some(CommandSpec::new(Self::manageprofiles(desired)).arg("-listProfiles")))
    }

    fn parse_probe(&self, desired: &DesiredState, output: &CommandOutput) -> Result<ObservedState> {
        if !output.success() {
            return Err(probe_failed(desired, "could not list profiles", output));
        }
        let profiles = parse_profile_list(&output.stdout);
        if !profiles.contains(&desired.resource_id()) {
            return Ok(ObservedState::absent());
        }
        let path = tool_root(desired, DEFAULT_ROOT)
            .join("profiles")
            .join(desired.resource_id());
        Ok(ObservedState::present()
            .with_fact("profile_name", desired.resource_id())
            .with_fact("profile_path", path.display().to_string())
            .with_fact("profiles", profiles.join(",")))
    }

    fn check_preconditions(&self, desired: &DesiredState, plan: &ActionPlan) -> Result<()> {
        reject_latest(self.kind(), desired)?;
        if !is_plain_name(desired.resource_id()) {
            return Err(Error::precondition(format!(
                "invalid profile name '{}'",
                desired.resource_id()
            )));
        }
        if plan.action() == Action::Create {
            Self::template(desired)?;
            for key in ["cell_name", "host_name", "node_name"] {
                required(desired, key, "creating a profile")?;
            }
            required_credentials(desired, "creating a profile")?;
        }
        Ok(())
    }

    fn build_mutating_command(&self, desired: &DesiredState, plan: &ActionPlan) -> Result<CommandSpec> {
        let root = tool_root(desired, DEFAULT_ROOT);
        let name = desired.resource_id();
        let command = CommandSpec::new(Self::manageprofiles(desired));

        match plan.action() {
            Action::Create => {
                let credentials = required_credentials(desired, "creating a profile")?;
                Ok(command
                    .arg("-create")
                    .arg("-profileName")
                    .arg(name)
                    .arg("-profilePath")
                    .path_arg(&root.join("profiles").join(name))
                    .arg("-templatePath")
                    .path_arg(&root.join("profileTemplates").join(Self::template(desired)?))
                    .arg("-cellName")
                    .arg(required(desired, "cell_name", "creating a profile")?)
                    .arg("-hostName")
                    .arg(required(desired, "host_name", "creating a profile")?)
                    .arg("-nodeName")
                    .arg(required(desired, "node_name", "creating a profile")?)
                    .arg("-enableAdminSecurity")
                    .arg("true")
                    .arg("-adminUserName")
                    .arg(credentials.username.as_str())
                    .arg("-adminPassword")
                    .secret_arg(credentials.password()))
            }
            Action::Destroy => Ok(command.arg("-delete").arg("-profileName").arg(name)),
            Action::Update | Action::Noop => Err(noop_error(self.kind(), plan)),
        }
    }

    fn classify(&self, output: &CommandOutput, plan: &ActionPlan) -> Classification {
        // manageprofiles.sh can exit 0 after a failed configuration action
        if output.success() && output.contains("INSTCONFFAILED") {
            return Classification::Failure {
                reason: "INSTCONFFAILED reported despite exit status 0".into(),
            };
        }
        classify_with_rules(RULES, output, plan)
    }
}
