//! Core types for reconciliation: desired state, observed state, outcomes

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::planner::Action;

/// Presence the caller wants the managed resource to end up in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPresence {
    /// Resource exists (installed, created, running)
    Present,
    /// Resource does not exist (uninstalled, deleted, stopped)
    Absent,
    /// Bring everything up to the newest level available
    Latest,
}

impl TargetPresence {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Latest => "latest",
        }
    }
}

impl fmt::Display for TargetPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetPresence {
    type Err = Error;

    /// Accepts the host-facing spellings: `started`/`stopped` for
    /// process resources and `update` as an alias of `latest`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" | "started" => Ok(Self::Present),
            "absent" | "stopped" => Ok(Self::Absent),
            "latest" | "update" => Ok(Self::Latest),
            other => Err(Error::InvalidDesiredState(format!(
                "unknown state '{other}' (expected present, absent, latest, update, started or stopped)"
            ))),
        }
    }
}

/// Named filesystem locations handed to a driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationHints {
    /// Root of the external tool's installation
    pub tool_root: Option<PathBuf>,
    /// Destination directory of the managed resource
    pub install_dir: Option<PathBuf>,
    /// Shared resources directory
    pub shared_dir: Option<PathBuf>,
    /// Installation media
    pub source_dir: Option<PathBuf>,
    /// Where the external tool should write its logs
    pub log_dir: Option<PathBuf>,
}

/// Ordered key/value pairs passed through to the external tool
///
/// Keys may repeat. Order is preserved because some tools care about it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters(Vec<(String, String)>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Builder form of [`Parameters::push`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in insertion order
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Values for `key` joined with `separator`, or `None` if there are none
    pub fn joined(&self, key: &str, separator: &str) -> Option<String> {
        let values = self.get_all(key);
        if values.is_empty() {
            None
        } else {
            Some(values.join(separator))
        }
    }

    /// Whether `key` is set to a truthy value (`true`, `yes`, `1`, `on`)
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "1" | "on"
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Username/password pair for tools that need authentication
///
/// The password is never printed: `Debug` redacts it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// What the caller wants: immutable input to one reconciliation
#[derive(Debug, Clone)]
pub struct DesiredState {
    resource_id: String,
    target: TargetPresence,
    locations: LocationHints,
    parameters: Parameters,
    credentials: Option<Credentials>,
    dry_run: bool,
}

impl DesiredState {
    /// Create a desired state
    ///
    /// Fails if `resource_id` is empty and the target is not `latest`:
    /// only an update-all operation may omit its target.
    pub fn new(resource_id: impl Into<String>, target: TargetPresence) -> Result<Self> {
        let resource_id = resource_id.into().trim().to_string();
        if resource_id.is_empty() && target != TargetPresence::Latest {
            return Err(Error::InvalidDesiredState(format!(
                "a resource id is required when the target state is '{target}'"
            )));
        }
        Ok(Self {
            resource_id,
            target,
            locations: LocationHints::default(),
            parameters: Parameters::default(),
            credentials: None,
            dry_run: false,
        })
    }

    pub fn with_locations(mut self, locations: LocationHints) -> Self {
        self.locations = locations;
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn target(&self) -> TargetPresence {
        self.target
    }

    pub fn locations(&self) -> &LocationHints {
        &self.locations
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// What a probe found
///
/// Produced fresh on every reconciliation; never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservedState {
    /// Whether the resource currently exists (or runs)
    pub present: bool,
    /// Installed version, when the probe reports one
    pub installed_version: Option<String>,
    /// Driver-specific fields extracted from the probe output
    pub facts: BTreeMap<String, String>,
    /// Captured probe output, kept for diagnostics only
    #[serde(skip)]
    pub raw_probe_output: String,
}

impl ObservedState {
    /// Resource not present
    pub fn absent() -> Self {
        Self::default()
    }

    /// Resource present
    pub fn present() -> Self {
        Self {
            present: true,
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.installed_version = Some(version.into());
        self
    }

    pub fn with_fact(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.facts.insert(key.into(), value.into());
        self
    }

    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        self.raw_probe_output = raw.into();
        self
    }
}

/// Captured result of one external command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

impl CommandOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Whether either stream contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.stdout.contains(needle) || self.stderr.contains(needle)
    }

    /// Case-insensitive variant of [`CommandOutput::contains`]
    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.stdout.to_lowercase().contains(&needle) || self.stderr.to_lowercase().contains(&needle)
    }

    /// Both streams, stdout first
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Final result of one reconciliation
///
/// Built once by the engine and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub resource_id: String,
    pub action: Action,
    pub changed: bool,
    pub succeeded: bool,
    pub dry_run: bool,
    pub message: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub facts: BTreeMap<String, String>,
    /// Non-fatal problems, e.g. a failed post-action probe
    pub warnings: Vec<String>,
}
