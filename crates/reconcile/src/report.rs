//! Result reporter - maps an outcome or error onto the host boundary

use crate::error::Error;
use crate::planner::Action;
use crate::types::ExecutionOutcome;
use serde::Serialize;
use std::collections::BTreeMap;

/// The host-facing result of one invocation
///
/// Pure data: the same outcome always yields the same report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub changed: bool,
    pub failed: bool,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    pub dry_run: bool,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rc: Option<i32>,
    pub facts: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Error category when `failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<&'static str>,
}

impl Report {
    /// Report a completed reconciliation
    pub fn from_outcome(outcome: &ExecutionOutcome) -> Self {
        Self {
            changed: outcome.changed,
            failed: !outcome.succeeded,
            msg: outcome.message.clone(),
            action: Some(outcome.action),
            dry_run: outcome.dry_run,
            stdout: outcome.stdout.clone(),
            stderr: outcome.stderr.clone(),
            rc: outcome.exit_code,
            facts: outcome.facts.clone(),
            warnings: outcome.warnings.clone(),
            error: None,
            advice: None,
        }
    }

    /// Report a fatal error, carrying captured streams verbatim
    pub fn from_error(error: &Error) -> Self {
        let category = error.category();
        let (stdout, stderr, rc) = match error.output() {
            Some(output) => (
                output.stdout.clone(),
                output.stderr.clone(),
                output.exit_code,
            ),
            None => (String::new(), String::new(), None),
        };
        Self {
            changed: false,
            failed: true,
            msg: error.to_string(),
            action: None,
            dry_run: false,
            stdout,
            stderr,
            rc,
            facts: BTreeMap::new(),
            warnings: Vec::new(),
            error: Some(category.as_str()),
            advice: Some(category.advice()),
        }
    }

    /// Report whichever side of a reconciliation result applies
    pub fn from_result(result: &Result<ExecutionOutcome, Error>) -> Self {
        match result {
            Ok(outcome) => Self::from_outcome(outcome),
            Err(error) => Self::from_error(error),
        }
    }

    /// Process exit status the host should surface
    pub fn exit_status(&self) -> i32 {
        if self.failed { 1 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommandOutput;

    fn outcome() -> ExecutionOutcome {
        ExecutionOutcome {
            resource_id: "pkg.a".into(),
            action: Action::Create,
            changed: true,
            succeeded: true,
            dry_run: false,
            message: "package 'pkg.a' created".into(),
            stdout: "Installed pkg.a".into(),
            stderr: String::new(),
            exit_code: Some(0),
            facts: BTreeMap::from([("version".to_string(), "8.5.5".to_string())]),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_from_outcome() {
        let report = Report::from_outcome(&outcome());
        assert!(report.changed);
        assert!(!report.failed);
        assert_eq!(report.exit_status(), 0);
        assert_eq!(report.facts["version"], "8.5.5");
    }

    #[test]
    fn test_from_error_keeps_streams() {
        let err = Error::Execution {
            message: "failed to remove profile 'profileA': exit status 1".into(),
            output: CommandOutput::new(1, "INSTCONFFAILED\n", "see log\n"),
        };
        let report = Report::from_error(&err);

        assert!(report.failed);
        assert!(!report.changed);
        assert_eq!(report.stdout, "INSTCONFFAILED\n");
        assert_eq!(report.stderr, "see log\n");
        assert_eq!(report.rc, Some(1));
        assert_eq!(report.error, Some("execution"));
        assert_eq!(report.exit_status(), 1);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(Report::from_outcome(&outcome())).unwrap();
        assert_eq!(json["changed"], true);
        assert_eq!(json["action"], "create");
        assert_eq!(json["rc"], 0);
        assert!(json.get("warnings").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_deterministic() {
        let result: Result<ExecutionOutcome, Error> = Ok(outcome());
        assert_eq!(Report::from_result(&result), Report::from_result(&result));
    }
}
