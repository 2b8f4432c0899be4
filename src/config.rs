//! Optional `config.toml`
//!
//! ```toml
//! timeout_secs = 1800
//! output = "text"
//! log_dir = "/var/log/wasprov"
//!
//! [package]
//! tool_root = "/opt/IBM/InstallationManager"
//!
//! [profile]
//! tool_root = "/opt/IBM/WebSphere/AppServer"
//! ```
//!
//! CLI flags override these values; these override built-in defaults.

use crate::cli::OutputFormat;
use crate::paths;
use anyhow::{Context, Result};
use imkit::DriverKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Kill tools that run longer than this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Default report format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputFormat>,

    /// Default directory for tool log files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    #[serde(default)]
    pub package: KindConfig,

    #[serde(default)]
    pub installer: KindConfig,

    #[serde(default)]
    pub profile: KindConfig,

    #[serde(default, rename = "liberty-server")]
    pub liberty_server: KindConfig,

    #[serde(default)]
    pub server: KindConfig,
}

/// Per-kind settings
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_root: Option<String>,
}

impl Config {
    /// Load from `path`, or the default location when `None`
    ///
    /// A missing default file is an empty config; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (paths::expand(p), true),
            None => (paths::config_file()?, false),
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write as TOML, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Could not serialize config")?;
        fs::write(path, content).with_context(|| format!("Could not write {}", path.display()))?;
        Ok(())
    }

    pub fn kind(&self, kind: DriverKind) -> &KindConfig {
        match kind {
            DriverKind::Package => &self.package,
            DriverKind::Installer => &self.installer,
            DriverKind::Profile => &self.profile,
            DriverKind::LibertyServer => &self.liberty_server,
            DriverKind::Server => &self.server,
        }
    }

    /// Configured tool root for `kind`, `~` expanded
    pub fn tool_root(&self, kind: DriverKind) -> Option<PathBuf> {
        self.kind(kind).tool_root.as_deref().map(paths::expand_path)
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir.as_deref().map(paths::expand_path)
    }

    /// Timeout from the flag, falling back to the config
    ///
    /// Zero means no timeout.
    pub fn timeout(&self, flag: Option<u64>) -> Option<Duration> {
        flag.or(self.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn output(&self, flag: Option<OutputFormat>) -> OutputFormat {
        flag.or(self.output).unwrap_or(OutputFormat::Text)
    }

    /// Starter file content
    pub fn starter() -> Self {
        let root = |path: &str| KindConfig {
            tool_root: Some(path.to_string()),
        };
        Self {
            timeout_secs: Some(3600),
            output: Some(OutputFormat::Text),
            log_dir: Some(imkit::installer::DEFAULT_LOG_DIR.to_string()),
            package: root(imkit::package::DEFAULT_ROOT),
            installer: root(imkit::package::DEFAULT_ROOT),
            profile: root(imkit::profile::DEFAULT_ROOT),
            liberty_server: root(imkit::liberty::DEFAULT_ROOT),
            server: root(imkit::liberty::DEFAULT_ROOT),
        }
    }
}
