//! Installation Manager itself, installed from an unpacked agent archive

use crate::common::{noop_error, probe_failed, reject_latest};
use crate::package::DEFAULT_ROOT;
use reconcile::{
    Action, ActionPlan, BenignRule, Classification, CommandOutput, CommandSpec, DesiredState,
    Driver, Error, ObservedState, Result, TargetPresence, classify_with_rules,
};
use regex::Regex;
use std::path::{Path, PathBuf};

pub const DEFAULT_UNINSTALLER: &str = "/var/ibm/InstallationManager/uninstall/uninstallc";
pub const DEFAULT_LOG_DIR: &str = "/tmp";

// The installer and uninstaller have no "already done" exit codes
const RULES: &[BenignRule] = &[];

/// Installs and removes Installation Manager
///
/// The install root is `install_dir`; `source_dir` holds the unpacked
/// installer. Parameter `uninstaller` overrides the uninstall program.
#[derive(Debug, Default)]
pub struct ImInstallerDriver;

impl ImInstallerDriver {
    fn dest(desired: &DesiredState) -> PathBuf {
        desired
            .locations()
            .install_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
    }

    fn uninstaller(desired: &DesiredState) -> PathBuf {
        desired
            .parameters()
            .get("uninstaller")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UNINSTALLER))
    }

    fn source(desired: &DesiredState) -> Result<&Path> {
        desired
            .locations()
            .source_dir
            .as_deref()
            .ok_or_else(|| Error::precondition("source_dir is required when installing Installation Manager"))
    }
}

/// First capture group of `pattern` in `text`
fn capture(pattern: &str, text: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    let caps = re.captures(text)?;
    caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str().trim().to_string())
}

/// Installer log file name: `<host>_ibmim_<YYYYmmdd-HHMMSS>.xml`
pub fn log_file_name(host: &str, now: chrono::DateTime<chrono::Local>) -> String {
    format!("{host}_ibmim_{}.xml", now.format("%Y%m%d-%H%M%S"))
}

fn hostname() -> String {
    whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string())
}

/// `imcl version` header line claims an installation
fn reports_installed(header: &str) -> bool {
    let header = header.to_lowercase();
    header.contains("installed") && !header.contains("not installed")
}

impl Driver for ImInstallerDriver {
    fn kind(&self) -> &'static str {
        "installation manager"
    }

    fn build_probe_command(&self, desired: &DesiredState) -> Result<Option<CommandSpec>> {
        let imcl = Self::dest(desired).join("eclipse/tools/imcl");
        if !imcl.exists() {
            return Ok(None);
        }
        Ok(Some(CommandSpec::new(imcl).arg("version")))
    }

    fn parse_probe(&self, desired: &DesiredState, output: &CommandOutput) -> Result<ObservedState> {
        let text = output.combined();
        let header = capture(r"Installation Manager.*", &text);

        let Some(header) = header.filter(|h| reports_installed(h)) else {
            if !output.success() {
                return Err(probe_failed(desired, "imcl version failed", output));
            }
            return Ok(ObservedState::absent());
        };

        let mut observed = ObservedState::present().with_fact("header", header);
        if let Some(version) = capture(r"(?m)^\s*Version:\s*([0-9].*)$", &text) {
            observed = observed
                .with_version(version.clone())
                .with_fact("version", version);
        }
        if let Some(internal) = capture(r"(?m)^\s*Internal Version:\s*([0-9].*)$", &text) {
            observed = observed.with_fact("internal_version", internal);
        }
        if let Some(arch) = capture(r"Architecture:\s*([0-9]+-bit)", &text) {
            observed = observed.with_fact("architecture", arch);
        }
        Ok(observed)
    }

    fn check_preconditions(&self, desired: &DesiredState, plan: &ActionPlan) -> Result<()> {
        reject_latest(self.kind(), desired)?;
        match plan.action() {
            Action::Create => {
                let install = Self::source(desired)?.join("install");
                if !install.exists() {
                    return Err(Error::precondition(format!("{} not found", install.display())));
                }
            }
            Action::Destroy => {
                let uninstaller = Self::uninstaller(desired);
                if !uninstaller.exists() {
                    return Err(Error::precondition(format!(
                        "{} does not exist",
                        uninstaller.display()
                    )));
                }
            }
            Action::Update | Action::Noop => {}
        }
        Ok(())
    }

    fn build_mutating_command(&self, desired: &DesiredState, plan: &ActionPlan) -> Result<CommandSpec> {
        match plan.action() {
            Action::Create => {
                let source = Self::source(desired)?;
                let log_dir = desired
                    .locations()
                    .log_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));
                std::fs::create_dir_all(&log_dir).map_err(|e| {
                    Error::precondition(format!("cannot create {}: {e}", log_dir.display()))
                })?;
                let log_file = log_dir.join(log_file_name(&hostname(), chrono::Local::now()));

                Ok(CommandSpec::new(source.join("install"))
                    .arg("-acceptLicense")
                    .arg("--launcher.ini")
                    .path_arg(&source.join("silent-install.ini"))
                    .arg("-log")
                    .path_arg(&log_file)
                    .arg("-installationDirectory")
                    .path_arg(&Self::dest(desired)))
            }
            Action::Destroy => Ok(CommandSpec::new(Self::uninstaller(desired))),
            Action::Update | Action::Noop => Err(noop_error(self.kind(), plan)),
        }
    }

    fn classify(&self, output: &CommandOutput, plan: &ActionPlan) -> Classification {
        classify_with_rules(RULES, output, plan)
    }

    fn describe(&self, desired: &DesiredState, action: Action, changed: bool) -> String {
        let dest = Self::dest(desired);
        match (action, changed) {
            (Action::Create, true) => format!("Installation Manager installed at {}", dest.display()),
            (Action::Destroy, true) => "Installation Manager uninstalled".to_string(),
            _ if desired.target() == TargetPresence::Absent => {
                "Installation Manager is not installed".to_string()
            }
            _ => format!("Installation Manager is already installed at {}", dest.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reconcile::testing::ScriptedInvoker;
    use reconcile::{LocationHints, compare, reconcile};
    use tempfile::TempDir;

    const VERSION_OUTPUT: &str = "\
Installation Manager (install) is installed.
Version: 1.8.5000.20160506_1125
Internal Version: 1.8.5000.20160506_1125
Architecture: 64-bit
";

    fn desired(dest: &Path, target: TargetPresence) -> DesiredState {
        DesiredState::new("ibmim", target).unwrap().with_locations(LocationHints {
            install_dir: Some(dest.to_path_buf()),
            ..Default::default()
        })
    }

    #[test]
    fn test_parse_version_output() {
        let dir = TempDir::new().unwrap();
        let d = desired(dir.path(), TargetPresence::Present);
        let observed = ImInstallerDriver
            .parse_probe(&d, &CommandOutput::new(0, VERSION_OUTPUT, ""))
            .unwrap();

        assert!(observed.present);
        assert_eq!(observed.facts["version"], "1.8.5000.20160506_1125");
        assert_eq!(observed.facts["internal_version"], "1.8.5000.20160506_1125");
        assert_eq!(observed.facts["architecture"], "64-bit");
        assert_eq!(observed.facts["header"], "Installation Manager (install) is installed.");
    }

    #[test]
    fn test_header_without_installed_is_absent() {
        let dir = TempDir::new().unwrap();
        let d = desired(dir.path(), TargetPresence::Present);
        let observed = ImInstallerDriver
            .parse_probe(&d, &CommandOutput::new(0, "Installation Manager (install)\n", ""))
            .unwrap();
        assert!(!observed.present);
    }

    #[test]
    fn test_missing_imcl_skips_probe() {
        let dir = TempDir::new().unwrap();
        let d = desired(dir.path(), TargetPresence::Present);
        assert!(ImInstallerDriver.build_probe_command(&d).unwrap().is_none());
    }

    #[test]
    fn test_log_file_name() {
        let at = chrono::Local.with_ymd_and_hms(2016, 5, 6, 11, 25, 3).unwrap();
        assert_eq!(log_file_name("was01", at), "was01_ibmim_20160506-112503.xml");
    }

    #[test]
    fn test_install_command_creates_log_dir() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("agent");
        let logs = dir.path().join("logs/im");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("install"), "").unwrap();

        let d = DesiredState::new("ibmim", TargetPresence::Present)
            .unwrap()
            .with_locations(LocationHints {
                install_dir: Some(dir.path().join("IM")),
                source_dir: Some(src.clone()),
                log_dir: Some(logs.clone()),
                ..Default::default()
            });
        let plan = compare(TargetPresence::Present, false);
        ImInstallerDriver.check_preconditions(&d, &plan).unwrap();
        let cmd = ImInstallerDriver.build_mutating_command(&d, &plan).unwrap();

        assert!(logs.is_dir());
        assert_eq!(cmd.program(), src.join("install"));
        let argv = cmd.argv();
        assert_eq!(argv[0], "-acceptLicense");
        assert_eq!(argv[1], "--launcher.ini");
        assert!(argv[2].ends_with("agent/silent-install.ini"));
        assert_eq!(argv[3], "-log");
        assert!(argv[4].contains("_ibmim_") && argv[4].ends_with(".xml"));
        assert_eq!(argv[5], "-installationDirectory");
        assert!(argv[6].ends_with("IM"));
    }

    #[test]
    fn test_install_requires_source() {
        let dir = TempDir::new().unwrap();
        let d = desired(dir.path(), TargetPresence::Present);
        let err = ImInstallerDriver
            .check_preconditions(&d, &compare(TargetPresence::Present, false))
            .unwrap_err();
        assert!(err.to_string().contains("source_dir"));
    }

    #[test]
    fn test_uninstaller_must_exist() {
        let dir = TempDir::new().unwrap();
        let d = desired(dir.path(), TargetPresence::Absent).with_parameters(
            reconcile::Parameters::new().with("uninstaller", dir.path().join("uninstallc").display().to_string()),
        );
        let plan = compare(TargetPresence::Absent, true);
        assert!(ImInstallerDriver.check_preconditions(&d, &plan).is_err());

        std::fs::write(dir.path().join("uninstallc"), "").unwrap();
        ImInstallerDriver.check_preconditions(&d, &plan).unwrap();
        let cmd = ImInstallerDriver.build_mutating_command(&d, &plan).unwrap();
        assert_eq!(cmd.program(), dir.path().join("uninstallc"));
        assert!(cmd.argv().is_empty());
    }

    #[test]
    fn test_latest_rejected() {
        let dir = TempDir::new().unwrap();
        let d = desired(dir.path(), TargetPresence::Latest);
        let err = reconcile(&ImInstallerDriver, &d, &ScriptedInvoker::new()).unwrap_err();
        assert!(matches!(err, Error::Precondition { .. }));
    }

    #[test]
    fn test_absent_when_not_installed_is_noop() {
        let dir = TempDir::new().unwrap();
        let d = desired(&dir.path().join("missing"), TargetPresence::Absent);
        let invoker = ScriptedInvoker::new();
        let outcome = reconcile(&ImInstallerDriver, &d, &invoker).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.action, Action::Noop);
        assert_eq!(outcome.message, "Installation Manager is not installed");
        assert_eq!(invoker.call_count(), 0);
    }

    #[test]
    fn test_not_installed_header_is_absent() {
        let dir = TempDir::new().unwrap();
        let d = desired(dir.path(), TargetPresence::Present);
        let observed = ImInstallerDriver
            .parse_probe(&d, &CommandOutput::new(0, "Installation Manager is not installed.\n", ""))
            .unwrap();
        assert!(!observed.present);
    }

    #[test]
    fn test_hostname_not_empty() {
        assert!(!hostname().is_empty());
    }

    #[test]
    fn test_classification_table() {
        let create = compare(TargetPresence::Present, false);
        let destroy = compare(TargetPresence::Absent, true);

        let cases = [
            (&create, CommandOutput::new(0, "Installed Installation Manager", ""), "success"),
            (&create, CommandOutput::new(1, "", "CRIMA1217E"), "failure"),
            (&create, CommandOutput::new(1, "", "Installation Manager is already installed"), "failure"),
            (&destroy, CommandOutput::new(0, "Uninstalled Installation Manager", ""), "success"),
            (&destroy, CommandOutput::new(1, "", "Installation Manager is not installed"), "failure"),
        ];

        for (plan, output, expected) in cases {
            let got = match ImInstallerDriver.classify(&output, plan) {
                Classification::Success => "success",
                Classification::AlreadySatisfied { .. } => "satisfied",
                Classification::Failure { .. } => "failure",
            };
            assert_eq!(got, expected, "{} {:?}", plan.action(), output);
        }
    }
}
