use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use reconcile::TargetPresence;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wasprov")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Idempotent provisioning for IBM Installation Manager and WebSphere", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/wasprov/config.toml)
    #[arg(long, global = true, env = "WASPROV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Show what would change without running anything that mutates
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Kill the tool after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install, uninstall or update Installation Manager packages (imcl)
    Package(ResourceArgs),

    /// Install or uninstall Installation Manager itself
    Installer(ResourceArgs),

    /// Create or delete a WebSphere profile (manageprofiles.sh)
    Profile(ResourceArgs),

    /// Create or remove a Liberty server definition
    LibertyServer(ResourceArgs),

    /// Start or stop a Liberty or traditional server
    Server(ResourceArgs),

    /// Check that configured tool roots exist
    Doctor,

    /// Show or initialise configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

// ============================================================================
// Resource Arguments
// ============================================================================

/// Arguments shared by every resource kind
#[derive(Args, Debug)]
pub struct ResourceArgs {
    /// Desired state: present|absent|latest (also started|stopped|update)
    #[arg(short, long, default_value = "present", value_parser = parse_state)]
    pub state: TargetPresence,

    /// Resource identifier: package id, profile or server name
    #[arg(short, long, visible_alias = "id", default_value = "")]
    pub name: String,

    /// Tool installation root (imcl, WAS or Liberty directory)
    #[arg(long)]
    pub tool_root: Option<PathBuf>,

    /// Product installation directory
    #[arg(long, visible_alias = "dest")]
    pub install_dir: Option<PathBuf>,

    /// Installation Manager shared resources directory
    #[arg(long)]
    pub shared_dir: Option<PathBuf>,

    /// Installer media directory
    #[arg(long, visible_alias = "src")]
    pub source_dir: Option<PathBuf>,

    /// Directory for tool log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Tool parameter, repeatable (e.g. --param repository=/var/data/was)
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Administrative user
    #[arg(short, long)]
    pub username: Option<String>,

    /// Administrative password
    #[arg(long, env = "WASPROV_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

fn parse_state(s: &str) -> Result<TargetPresence, String> {
    s.parse().map_err(|e: reconcile::Error| e.to_string())
}

/// Parse `key=value`; the value may itself contain `=`
fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
