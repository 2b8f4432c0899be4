//! Helpers shared by the drivers

use reconcile::{ActionPlan, CommandOutput, Credentials, DesiredState, Error, Result, TargetPresence};
use std::path::PathBuf;

/// Tool root from the location hints, or `default`
pub(crate) fn tool_root(desired: &DesiredState, default: &str) -> PathBuf {
    desired
        .locations()
        .tool_root
        .clone()
        .unwrap_or_else(|| PathBuf::from(default))
}

/// A parameter that must be present for `purpose`
pub(crate) fn required<'a>(desired: &'a DesiredState, key: &str, purpose: &str) -> Result<&'a str> {
    desired
        .parameters()
        .get(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::precondition(format!("parameter '{key}' is required when {purpose}")))
}

/// Credentials that must be present for `purpose`
pub(crate) fn required_credentials<'a>(
    desired: &'a DesiredState,
    purpose: &str,
) -> Result<&'a Credentials> {
    desired
        .credentials()
        .ok_or_else(|| Error::precondition(format!("username and password are required when {purpose}")))
}

/// Drivers without an update operation refuse `latest`
pub(crate) fn reject_latest(kind: &str, desired: &DesiredState) -> Result<()> {
    if desired.target() == TargetPresence::Latest {
        return Err(Error::precondition(format!(
            "{kind} resources do not support the 'latest' state"
        )));
    }
    Ok(())
}

/// A probe error carrying the captured output
pub(crate) fn probe_failed(desired: &DesiredState, message: impl Into<String>, output: &CommandOutput) -> Error {
    Error::Probe {
        resource: desired.resource_id().to_string(),
        message: message.into(),
        output: output.clone(),
    }
}

/// Guard for callers that must never see a noop plan
pub(crate) fn noop_error(kind: &str, plan: &ActionPlan) -> Error {
    Error::precondition(format!(
        "{kind}: no command exists for action '{}'",
        plan.action()
    ))
}

/// Whether `name` is usable as a single path component
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.starts_with('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name() {
        assert!(is_plain_name("defaultServer"));
        assert!(is_plain_name("Dmgr01"));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name("-delete"));
        assert!(!is_plain_name(""));
    }

    #[test]
    fn test_tool_root_default() {
        let desired = DesiredState::new("x", TargetPresence::Present).unwrap();
        assert_eq!(tool_root(&desired, "/opt/IBM/InstallationManager"), PathBuf::from("/opt/IBM/InstallationManager"));
    }

    #[test]
    fn test_required_rejects_blank() {
        let desired = DesiredState::new("x", TargetPresence::Present)
            .unwrap()
            .with_parameters(reconcile::Parameters::new().with("cell_name", " "));
        assert!(required(&desired, "cell_name", "creating a profile").is_err());
    }
}
