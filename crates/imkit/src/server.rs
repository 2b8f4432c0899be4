//! Server processes: start and stop Liberty or traditional WebSphere servers
//!
//! `present` means running and `absent` means stopped. The flavour parameter
//! picks the scripts:
//!
//! - `liberty`: `bin/server start|stop|status <name>`
//! - `traditional`: `bin/startServer.sh`, `bin/stopServer.sh` and
//!   `bin/serverStatus.sh` with `-profileName`

use crate::common::{is_plain_name, noop_error, probe_failed, reject_latest, tool_root};
use reconcile::{
    Action, ActionPlan, BenignRule, Classification, CommandOutput, CommandSpec, DesiredState,
    Driver, Error, ObservedState, Result, classify_with_rules,
};
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const RULES: &[BenignRule] = &[
    BenignRule::when(Action::Create, &["is running with process"], "server is already running"),
    BenignRule::when(Action::Create, &["already running"], "server is already running"),
    BenignRule::when(Action::Create, &["may already be running"], "server is already running"),
    BenignRule::when(Action::Destroy, &["is not running"], "server is already stopped"),
    BenignRule::when(Action::Destroy, &["appears to be stopped"], "server is already stopped"),
];

/// Which set of scripts controls the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flavour {
    #[default]
    Liberty,
    Traditional,
}

impl Flavour {
    fn default_root(&self) -> &'static str {
        match self {
            Self::Liberty => crate::liberty::DEFAULT_ROOT,
            Self::Traditional => crate::profile::DEFAULT_ROOT,
        }
    }
}

impl FromStr for Flavour {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "liberty" => Ok(Self::Liberty),
            "traditional" | "was" => Ok(Self::Traditional),
            other => Err(Error::precondition(format!(
                "unknown server flavour '{other}' (expected liberty or traditional)"
            ))),
        }
    }
}

impl fmt::Display for Flavour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Liberty => "liberty",
            Self::Traditional => "traditional",
        })
    }
}

/// Starts and stops servers
///
/// Parameters: `flavour` (`liberty` by default), `profile` (traditional
/// only, defaults to the server name). Credentials are passed to the
/// traditional scripts when given.
#[derive(Debug, Default)]
pub struct ServerProcessDriver;

impl ServerProcessDriver {
    fn flavour(desired: &DesiredState) -> Result<Flavour> {
        desired
            .parameters()
            .get("flavour")
            .map(Flavour::from_str)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    fn script(desired: &DesiredState, flavour: Flavour, name: &str) -> PathBuf {
        tool_root(desired, flavour.default_root()).join("bin").join(name)
    }

    /// `<script> <verb?> <name>` plus the traditional profile and credentials
    fn command(desired: &DesiredState, flavour: Flavour, liberty_verb: &str, traditional: &str) -> CommandSpec {
        let name = desired.resource_id();
        match flavour {
            Flavour::Liberty => CommandSpec::new(Self::script(desired, flavour, "server"))
                .arg(liberty_verb)
                .arg(name),
            Flavour::Traditional => {
                let profile = desired.parameters().get("profile").unwrap_or(name);
                let command = CommandSpec::new(Self::script(desired, flavour, traditional))
                    .arg(name)
                    .arg("-profileName")
                    .arg(profile);
                match desired.credentials() {
                    Some(credentials) => command
                        .arg("-username")
                        .arg(credentials.username.as_str())
                        .arg("-password")
                        .secret_arg(credentials.password()),
                    None => command,
                }
            }
        }
    }

    fn parse_liberty(desired: &DesiredState, output: &CommandOutput) -> Result<Option<bool>> {
        if output.contains_ignore_case("does not exist") {
            return Err(probe_failed(
                desired,
                format!("server '{}' does not exist", desired.resource_id()),
                output,
            ));
        }
        if output.success() {
            return Ok(Some(true));
        }
        if output.exit_code == Some(1) || output.contains_ignore_case("is not running") {
            return Ok(Some(false));
        }
        Ok(None)
    }

    fn parse_traditional(output: &CommandOutput) -> Option<bool> {
        if output.contains("is STARTED") {
            Some(true)
        } else if output.contains_ignore_case("appears to be stopped")
            || output.contains_ignore_case("cannot be reached")
        {
            Some(false)
        } else {
            None
        }
    }
}

/// Process id from "... is running with process ID 1234"
fn process_id(output: &str) -> Option<String> {
    let re = Regex::new(r"process ID (\d+)").ok()?;
    re.captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

impl Driver for ServerProcessDriver {
    fn kind(&self) -> &'static str {
        "server"
    }

    fn tool_marker(&self, desired: &DesiredState) -> Option<PathBuf> {
        let flavour = Self::flavour(desired).unwrap_or_default();
        Some(tool_root(desired, flavour.default_root()).join("bin"))
    }

    fn build_probe_command(&self, desired: &DesiredState) -> Result<Option<CommandSpec>> {
        let flavour = Self::flavour(desired)?;
        Ok(Some(Self::command(desired, flavour, "status", "serverStatus.sh")))
    }

    fn parse_probe(&self, desired: &DesiredState, output: &CommandOutput) -> Result<ObservedState> {
        let flavour = Self::flavour(desired)?;
        let running = match flavour {
            Flavour::Liberty => Self::parse_liberty(desired, output)?,
            Flavour::Traditional => Self::parse_traditional(output),
        };
        let Some(running) = running else {
            return Err(probe_failed(
                desired,
                "could not determine server status",
                output,
            ));
        };

        let state = if running { "running" } else { "stopped" };
        let observed = if running {
            ObservedState::present()
        } else {
            ObservedState::absent()
        };
        let observed = observed
            .with_fact("server_name", desired.resource_id())
            .with_fact("flavour", flavour.to_string())
            .with_fact("state", state);
        Ok(match process_id(&output.combined()) {
            Some(pid) if running => observed.with_fact("pid", pid),
            _ => observed,
        })
    }

    fn check_preconditions(&self, desired: &DesiredState, _plan: &ActionPlan) -> Result<()> {
        reject_latest(self.kind(), desired)?;
        Self::flavour(desired)?;
        if !is_plain_name(desired.resource_id()) {
            return Err(Error::precondition(format!(
                "invalid server name '{}'",
                desired.resource_id()
            )));
        }
        Ok(())
    }

    fn build_mutating_command(&self, desired: &DesiredState, plan: &ActionPlan) -> Result<CommandSpec> {
        let flavour = Self::flavour(desired)?;
        match plan.action() {
            Action::Create => Ok(Self::command(desired, flavour, "start", "startServer.sh")),
            Action::Destroy => Ok(Self::command(desired, flavour, "stop", "stopServer.sh")),
            Action::Update | Action::Noop => Err(noop_error(self.kind(), plan)),
        }
    }

    fn classify(&self, output: &CommandOutput, plan: &ActionPlan) -> Classification {
        classify_with_rules(RULES, output, plan)
    }

    fn describe(&self, desired: &DesiredState, action: Action, changed: bool) -> String {
        let id = desired.resource_id();
        match (action, changed, desired.target()) {
            (Action::Create, true, _) => format!("server '{id}' started"),
            (Action::Destroy, true, _) => format!("server '{id}' stopped"),
            (_, _, reconcile::TargetPresence::Absent) => format!("server '{id}' is already stopped"),
            _ => format!("server '{id}' is already running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::testing::ScriptedInvoker;
    use reconcile::{Credentials, LocationHints, Parameters, TargetPresence, compare, reconcile};
    use tempfile::TempDir;

    fn root() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        dir
    }

    fn desired(root: &TempDir, name: &str, target: TargetPresence) -> DesiredState {
        DesiredState::new(name, target).unwrap().with_locations(LocationHints {
            tool_root: Some(root.path().to_path_buf()),
            ..Default::default()
        })
    }

    fn traditional(root: &TempDir, target: TargetPresence) -> DesiredState {
        desired(root, "server1", target)
            .with_parameters(Parameters::new().with("flavour", "traditional").with("profile", "AppSrv01"))
    }

    #[test]
    fn test_flavour_parse() {
        assert_eq!("liberty".parse::<Flavour>().unwrap(), Flavour::Liberty);
        assert_eq!("Traditional".parse::<Flavour>().unwrap(), Flavour::Traditional);
        assert!("tomcat".parse::<Flavour>().is_err());
    }

    #[test]
    fn test_liberty_status_parsing() {
        let r = root();
        let d = desired(&r, "defaultServer", TargetPresence::Present);

        let running = CommandOutput::new(0, "Server defaultServer is running with process ID 4242.\n", "");
        let observed = ServerProcessDriver.parse_probe(&d, &running).unwrap();
        assert!(observed.present);
        assert_eq!(observed.facts["pid"], "4242");
        assert_eq!(observed.facts["state"], "running");

        let stopped = CommandOutput::new(1, "Server defaultServer is not running.\n", "");
        assert!(!ServerProcessDriver.parse_probe(&d, &stopped).unwrap().present);

        let missing = CommandOutput::new(2, "", "Server defaultServer does not exist.");
        assert!(matches!(
            ServerProcessDriver.parse_probe(&d, &missing),
            Err(Error::Probe { .. })
        ));

        let odd = CommandOutput::new(255, "", "java not found");
        assert!(ServerProcessDriver.parse_probe(&d, &odd).is_err());
    }

    #[test]
    fn test_traditional_status_parsing() {
        let r = root();
        let d = traditional(&r, TargetPresence::Present);

        let started = CommandOutput::new(0, "ADMU0508I: The Application Server \"server1\" is STARTED\n", "");
        assert!(ServerProcessDriver.parse_probe(&d, &started).unwrap().present);

        let stopped = CommandOutput::new(
            0,
            "ADMU0509I: The Application Server \"server1\" cannot be reached. It appears to be stopped.\n",
            "",
        );
        assert!(!ServerProcessDriver.parse_probe(&d, &stopped).unwrap().present);
    }

    #[test]
    fn test_traditional_command_with_credentials() {
        let r = root();
        let d = traditional(&r, TargetPresence::Present)
            .with_credentials(Some(Credentials::new("wasadmin", "s3cret")));
        let cmd = ServerProcessDriver
            .build_mutating_command(&d, &compare(TargetPresence::Present, false))
            .unwrap();

        assert!(cmd.program().ends_with("bin/startServer.sh"));
        assert_eq!(
            cmd.argv(),
            vec!["server1", "-profileName", "AppSrv01", "-username", "wasadmin", "-password", "s3cret"]
        );
        assert!(!cmd.to_string().contains("s3cret"));
    }

    #[test]
    fn test_traditional_profile_defaults_to_name() {
        let r = root();
        let d = desired(&r, "dmgr", TargetPresence::Absent)
            .with_parameters(Parameters::new().with("flavour", "traditional"));
        let cmd = ServerProcessDriver
            .build_mutating_command(&d, &compare(TargetPresence::Absent, true))
            .unwrap();
        assert!(cmd.program().ends_with("bin/stopServer.sh"));
        assert_eq!(cmd.argv(), vec!["dmgr", "-profileName", "dmgr"]);
    }

    #[test]
    fn test_classification_table() {
        let start = compare(TargetPresence::Present, false);
        let stop = compare(TargetPresence::Absent, true);

        let cases = [
            (&start, CommandOutput::new(0, "Server defaultServer started with process ID 1.", ""), "success"),
            (&start, CommandOutput::new(1, "", "Server defaultServer is running with process ID 7."), "satisfied"),
            (&start, CommandOutput::new(255, "ADMU3027E: An instance of the server may already be running: server1", ""), "satisfied"),
            (&start, CommandOutput::new(1, "", "is not running"), "failure"),
            (&stop, CommandOutput::new(1, "", "Server defaultServer is not running."), "satisfied"),
            (&stop, CommandOutput::new(246, "The server appears to be stopped", ""), "satisfied"),
            (&stop, CommandOutput::new(1, "", "is running with process ID 7"), "failure"),
            (&stop, CommandOutput::new(2, "", "timed out waiting"), "failure"),
        ];

        for (plan, output, expected) in cases {
            let got = match ServerProcessDriver.classify(&output, plan) {
                Classification::Success => "success",
                Classification::AlreadySatisfied { .. } => "satisfied",
                Classification::Failure { .. } => "failure",
            };
            assert_eq!(got, expected, "{} {:?}", plan.action(), output);
        }
    }

    #[test]
    fn test_reconcile_start_race_is_satisfied() {
        let r = root();
        let d = desired(&r, "defaultServer", TargetPresence::Present);
        let invoker = ScriptedInvoker::new()
            .reply(1, "Server defaultServer is not running.", "")
            .reply(1, "", "Server defaultServer is running with process ID 99.");

        let outcome = reconcile(&ServerProcessDriver, &d, &invoker).unwrap();
        assert!(outcome.succeeded);
        assert!(!outcome.changed);
        assert_eq!(outcome.exit_code, Some(1));
        assert!(outcome.message.contains("already running"));
    }

    #[test]
    fn test_reconcile_stop_running_server() {
        let r = root();
        let d = desired(&r, "defaultServer", TargetPresence::Absent);
        let invoker = ScriptedInvoker::new()
            .reply(0, "Server defaultServer is running with process ID 99.", "")
            .reply(0, "Server defaultServer stopped.", "")
            .reply(1, "Server defaultServer is not running.", "");

        let outcome = reconcile(&ServerProcessDriver, &d, &invoker).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.message, "server 'defaultServer' stopped");
        assert_eq!(outcome.facts["state"], "stopped");
        assert_eq!(invoker.calls()[1].argv(), vec!["stop", "defaultServer"]);
    }

    #[test]
    fn test_latest_rejected() {
        let r = root();
        let d = desired(&r, "defaultServer", TargetPresence::Latest);
        let invoker = ScriptedInvoker::new().reply(0, "running", "");
        assert!(matches!(
            reconcile(&ServerProcessDriver, &d, &invoker),
            Err(Error::Precondition { .. })
        ));
    }
}
