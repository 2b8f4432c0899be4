//! Installation Manager packages via `imcl`

use crate::common::{noop_error, probe_failed, required, tool_root};
use reconcile::{
    Action, ActionPlan, BenignRule, Classification, CommandOutput, CommandSpec, DesiredState,
    Driver, Error, ObservedState, Result, classify_with_rules,
};
use std::path::{Path, PathBuf};

pub const DEFAULT_ROOT: &str = "/opt/IBM/InstallationManager";

const INSTALL_FIXES: &[&str] = &["none", "recommended", "all"];

const RULES: &[BenignRule] = &[
    BenignRule::when(Action::Create, &["already installed"], "package is already installed"),
    BenignRule::when(Action::Destroy, &["is not installed"], "package is not installed"),
    BenignRule::when(Action::Update, &["No updates"], "no updates available"),
];

/// Installs, removes and updates packages with `imcl`
///
/// Parameters: `repository` (repeatable), `properties` (repeatable `k=v`),
/// `preferences`, `install_fixes`, `connect_passport_advantage`.
#[derive(Debug, Default)]
pub struct ImPackageDriver;

impl ImPackageDriver {
    fn imcl(desired: &DesiredState) -> PathBuf {
        tool_root(desired, DEFAULT_ROOT).join("eclipse/tools/imcl")
    }

    fn repositories(desired: &DesiredState) -> Option<String> {
        desired.parameters().joined("repository", ",")
    }

    fn properties(desired: &DesiredState) -> Option<String> {
        desired.parameters().joined("properties", ",")
    }

    fn install_fixes(desired: &DesiredState) -> Result<Option<&str>> {
        match desired.parameters().get("install_fixes") {
            None => Ok(None),
            Some(value) if INSTALL_FIXES.contains(&value) => Ok(Some(value)),
            Some(value) => Err(Error::precondition(format!(
                "install_fixes must be one of none, recommended, all (got '{value}')"
            ))),
        }
    }
}

/// One `listInstalledPackages -long` line: `path : id : name : version`
fn parse_line(line: &str) -> Option<[&str; 4]> {
    let mut fields = line.split(" : ").map(str::trim);
    let path = fields.next()?;
    let id = fields.next()?;
    let name = fields.next()?;
    let version = fields.next()?;
    Some([path, id, name, version])
}

fn matches_id(listed: &str, wanted: &str) -> bool {
    listed == wanted
        || listed
            .strip_prefix(wanted)
            .is_some_and(|rest| rest.starts_with('_'))
}

impl Driver for ImPackageDriver {
    fn kind(&self) -> &'static str {
        "package"
    }

    fn tool_marker(&self, desired: &DesiredState) -> Option<PathBuf> {
        Some(tool_root(desired, DEFAULT_ROOT).join("eclipse"))
    }

    fn build_probe_command(&self, desired: &DesiredState) -> Result<Option<CommandSpec>> {
        if desired.resource_id().is_empty() {
            return Ok(None);
        }
        if let Some(dest) = &desired.locations().install_dir
            && !dest.exists()
        {
            log::debug!("{} does not exist, package is absent", dest.display());
            return Ok(None);
        }
        Ok(Some(
            CommandSpec::new(Self::imcl(desired))
                .arg("listInstalledPackages")
                .arg("-long"),
        ))
    }

    fn parse_probe(&self, desired: &DesiredState, output: &CommandOutput) -> Result<ObservedState> {
        if !output.success() {
            return Err(probe_failed(
                desired,
                "could not list installed packages",
                output,
            ));
        }

        let found = output
            .stdout
            .lines()
            .filter_map(parse_line)
            .find(|[_, id, _, _]| matches_id(id, desired.resource_id()));

        Ok(match found {
            Some([path, id, name, version]) => ObservedState::present()
                .with_version(version)
                .with_fact("path", path)
                .with_fact("id", id)
                .with_fact("name", name)
                .with_fact("version", version),
            None => ObservedState::absent(),
        })
    }

    fn check_preconditions(&self, desired: &DesiredState, plan: &ActionPlan) -> Result<()> {
        Self::install_fixes(desired)?;
        match plan.action() {
            Action::Create => {
                required(desired, "repository", "installing packages")?;
            }
            Action::Update => {
                required(desired, "repository", "updating packages")?;
            }
            Action::Destroy | Action::Noop => {}
        }
        Ok(())
    }

    fn build_mutating_command(&self, desired: &DesiredState, plan: &ActionPlan) -> Result<CommandSpec> {
        let locations = desired.locations();
        let imcl = CommandSpec::new(Self::imcl(desired));
        let fixes = Self::install_fixes(desired)?;
        let passport = desired.parameters().flag("connect_passport_advantage");

        let command = match plan.action() {
            Action::Create => imcl
                .arg("install")
                .arg(desired.resource_id())
                .opt("-repositories", Self::repositories(desired))
                .arg("-acceptLicense")
                .arg("-stopBlockingProcesses")
                .opt("-installationDirectory", locations.install_dir.as_deref().map(path_str))
                .opt("-sharedResourcesDirectory", locations.shared_dir.as_deref().map(path_str))
                .opt("-properties", Self::properties(desired))
                .opt("-installFixes", fixes)
                .flag_if("-connectPassportAdvantage", passport),
            Action::Destroy => imcl
                .arg("uninstall")
                .arg(desired.resource_id())
                .opt("-installationDirectory", locations.install_dir.as_deref().map(path_str))
                .opt("-properties", Self::properties(desired))
                .opt("-preferences", desired.parameters().joined("preferences", ",")),
            Action::Update => imcl
                .arg("updateAll")
                .opt("-repositories", Self::repositories(desired))
                .opt("-properties", Self::properties(desired))
                .flag_if("-connectPassportAdvantage", passport)
                .opt("-installFixes", fixes),
            Action::Noop => return Err(noop_error(self.kind(), plan)),
        };
        Ok(command)
    }

    fn classify(&self, output: &CommandOutput, plan: &ActionPlan) -> Classification {
        // updateAll exits 0 when nothing applied
        if plan.action() == Action::Update
            && output.success()
            && output.contains_ignore_case("No updates")
        {
            return Classification::AlreadySatisfied {
                reason: "no updates available".into(),
            };
        }
        classify_with_rules(RULES, output, plan)
    }

    fn describe(&self, desired: &DesiredState, action: Action, changed: bool) -> String {
        match (action, changed) {
            (Action::Update, true) => "installed packages updated".to_string(),
            (Action::Update, false) => "installed packages are up to date".to_string(),
            (Action::Create, true) => format!("package '{}' installed", desired.resource_id()),
            (Action::Destroy, true) => format!("package '{}' uninstalled", desired.resource_id()),
            _ => format!("package '{}' is already in the desired state", desired.resource_id()),
        }
    }
}

fn path_str(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::testing::ScriptedInvoker;
    use reconcile::{LocationHints, Parameters, TargetPresence, compare, reconcile};
    use tempfile::TempDir;

    const LISTING: &str = "\
/opt/IBM/WebSphere/Liberty : com.ibm.websphere.liberty.BASE.v85_8.5.5009.20160225_0435 : IBM WebSphere Application Server Liberty : 8.5.5.9
/opt/IBM/HTTPServer : com.ibm.websphere.IHS.v85_8.5.5009.20160225_0435 : IBM HTTP Server for WebSphere Application Server : 8.5.5.9
";

    const LIBERTY: &str = "com.ibm.websphere.liberty.BASE.v85";

    /// Tool root with an `eclipse` directory so the preflight passes
    fn im_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("eclipse/tools")).unwrap();
        dir
    }

    fn desired(root: &TempDir, id: &str, target: TargetPresence) -> DesiredState {
        DesiredState::new(id, target)
            .unwrap()
            .with_locations(LocationHints {
                tool_root: Some(root.path().to_path_buf()),
                ..Default::default()
            })
            .with_parameters(Parameters::new().with("repository", "/var/data/was"))
    }

    #[test]
    fn test_parse_line() {
        let fields = parse_line("/opt/a : pkg.a_1.0 : Package A : 1.0").unwrap();
        assert_eq!(fields, ["/opt/a", "pkg.a_1.0", "Package A", "1.0"]);
        assert!(parse_line("Installed packages:").is_none());
    }

    #[test]
    fn test_matches_id() {
        assert!(matches_id("com.ibm.websphere.liberty.BASE.v85_8.5.5009", LIBERTY));
        assert!(matches_id(LIBERTY, LIBERTY));
        assert!(!matches_id("com.ibm.websphere.liberty.BASE.v855", LIBERTY));
    }

    #[test]
    fn test_probe_reports_facts() {
        let root = im_root();
        let d = desired(&root, LIBERTY, TargetPresence::Present);
        let observed = ImPackageDriver
            .parse_probe(&d, &CommandOutput::new(0, LISTING, ""))
            .unwrap();

        assert!(observed.present);
        assert_eq!(observed.installed_version.as_deref(), Some("8.5.5.9"));
        assert_eq!(observed.facts["path"], "/opt/IBM/WebSphere/Liberty");
        assert_eq!(observed.facts["name"], "IBM WebSphere Application Server Liberty");
    }

    #[test]
    fn test_probe_failure_is_error() {
        let root = im_root();
        let d = desired(&root, LIBERTY, TargetPresence::Present);
        let err = ImPackageDriver
            .parse_probe(&d, &CommandOutput::new(1, "", "bad"))
            .unwrap_err();
        assert!(matches!(err, Error::Probe { .. }));
    }

    #[test]
    fn test_missing_install_dir_skips_probe() {
        let root = im_root();
        let d = desired(&root, LIBERTY, TargetPresence::Present).with_locations(LocationHints {
            tool_root: Some(root.path().to_path_buf()),
            install_dir: Some(root.path().join("nope")),
            ..Default::default()
        });
        assert!(ImPackageDriver.build_probe_command(&d).unwrap().is_none());
    }

    #[test]
    fn test_install_command() {
        let root = im_root();
        let d = desired(&root, LIBERTY, TargetPresence::Present).with_parameters(
            Parameters::new()
                .with("repository", "/var/data/was")
                .with("repository", "http://repo.example.com")
                .with("properties", "user.ihs.httpPort=8080")
                .with("install_fixes", "recommended")
                .with("connect_passport_advantage", "yes"),
        );
        let cmd = ImPackageDriver
            .build_mutating_command(&d, &compare(TargetPresence::Present, false))
            .unwrap();

        assert_eq!(
            cmd.argv(),
            vec![
                "install",
                LIBERTY,
                "-repositories",
                "/var/data/was,http://repo.example.com",
                "-acceptLicense",
                "-stopBlockingProcesses",
                "-properties",
                "user.ihs.httpPort=8080",
                "-installFixes",
                "recommended",
                "-connectPassportAdvantage",
            ]
        );
        assert!(cmd.program().ends_with("eclipse/tools/imcl"));
    }

    #[test]
    fn test_uninstall_command() {
        let root = im_root();
        let d = desired(&root, LIBERTY, TargetPresence::Absent);
        let cmd = ImPackageDriver
            .build_mutating_command(&d, &compare(TargetPresence::Absent, true))
            .unwrap();
        assert_eq!(cmd.argv(), vec!["uninstall", LIBERTY]);
    }

    #[test]
    fn test_repository_required_for_install() {
        let root = im_root();
        let d = desired(&root, LIBERTY, TargetPresence::Present).with_parameters(Parameters::new());
        let err = ImPackageDriver
            .check_preconditions(&d, &compare(TargetPresence::Present, false))
            .unwrap_err();
        assert!(err.to_string().contains("repository"));
    }

    #[test]
    fn test_invalid_install_fixes() {
        let root = im_root();
        let d = desired(&root, LIBERTY, TargetPresence::Present)
            .with_parameters(Parameters::new().with("repository", "/r").with("install_fixes", "some"));
        assert!(
            ImPackageDriver
                .check_preconditions(&d, &compare(TargetPresence::Present, false))
                .is_err()
        );
    }

    #[test]
    fn test_classification_table() {
        let create = compare(TargetPresence::Present, false);
        let destroy = compare(TargetPresence::Absent, true);
        let update = compare(TargetPresence::Latest, true);

        let cases = [
            (&create, CommandOutput::new(0, "Installed", ""), "success"),
            (&create, CommandOutput::new(1, "", "package is already installed"), "satisfied"),
            (&create, CommandOutput::new(1, "", "repository unreachable"), "failure"),
            (&destroy, CommandOutput::new(1, "", "The package is not installed."), "satisfied"),
            (&destroy, CommandOutput::new(1, "", "already installed"), "failure"),
            (&update, CommandOutput::new(0, "No updates found", ""), "satisfied"),
            (&update, CommandOutput::new(0, "Updated to 8.5.5.10", ""), "success"),
        ];

        for (plan, output, expected) in cases {
            let got = match ImPackageDriver.classify(&output, plan) {
                Classification::Success => "success",
                Classification::AlreadySatisfied { .. } => "satisfied",
                Classification::Failure { .. } => "failure",
            };
            assert_eq!(got, expected, "{} {:?}", plan.action(), output);
        }
    }

    #[test]
    fn test_reconcile_install_then_noop() {
        let root = im_root();
        let d = desired(&root, LIBERTY, TargetPresence::Present);

        let invoker = ScriptedInvoker::new()
            .reply(0, "", "")
            .reply(0, "Installed com.ibm.websphere.liberty.BASE.v85", "")
            .reply(0, LISTING, "");
        let outcome = reconcile(&ImPackageDriver, &d, &invoker).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.message, format!("package '{LIBERTY}' installed"));
        assert_eq!(outcome.facts["version"], "8.5.5.9");
        assert_eq!(invoker.call_count(), 3);

        let invoker = ScriptedInvoker::new().reply(0, LISTING, "");
        let outcome = reconcile(&ImPackageDriver, &d, &invoker).unwrap();
        assert!(!outcome.changed);
        assert_eq!(invoker.call_count(), 1);
    }

    #[test]
    fn test_reconcile_update_all_without_id() {
        let root = im_root();
        let d = desired(&root, "", TargetPresence::Latest);
        let invoker = ScriptedInvoker::new().reply(0, "Updated", "");

        let outcome = reconcile(&ImPackageDriver, &d, &invoker).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.action, Action::Update);
        assert_eq!(invoker.calls()[0].argv()[0], "updateAll");
    }

    #[test]
    fn test_missing_tool_root_fails_preflight() {
        let root = TempDir::new().unwrap();
        let d = desired(&root, LIBERTY, TargetPresence::Present);
        let invoker = ScriptedInvoker::new();
        let err = reconcile(&ImPackageDriver, &d, &invoker).unwrap_err();
        assert!(matches!(err, Error::Precondition { .. }));
        assert_eq!(invoker.call_count(), 0);
    }
}
