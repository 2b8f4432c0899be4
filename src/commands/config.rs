use anyhow::{Context as _, Result};

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::Config;
use crate::paths;
use crate::ui;
use imkit::DriverKind;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Path => {
            println!("{}", config_path(ctx)?.display());
            Ok(())
        }
        ConfigCommand::Init { force } => init(ctx, force),
    }
}

fn config_path(ctx: &Context) -> Result<std::path::PathBuf> {
    match &ctx.config_path {
        Some(path) => Ok(paths::expand(path)),
        None => paths::config_file(),
    }
}

fn show(ctx: &Context) -> Result<()> {
    let path = config_path(ctx)?;
    ui::header("Configuration");
    ui::kv(
        "file",
        &format!(
            "{}{}",
            path.display(),
            if path.exists() { "" } else { " (not found, using defaults)" }
        ),
    );
    ui::kv(
        "timeout",
        &ctx.config
            .timeout(ctx.timeout)
            .map_or_else(|| "none".to_string(), |t| format!("{}s", t.as_secs())),
    );
    ui::kv("output", &format!("{:?}", ctx.output).to_lowercase());
    ui::kv(
        "log_dir",
        &ctx.config
            .log_dir()
            .map_or_else(|| imkit::installer::DEFAULT_LOG_DIR.to_string(), |p| p.display().to_string()),
    );

    ui::header("Tool roots");
    for kind in DriverKind::ALL {
        match ctx.config.tool_root(kind) {
            Some(root) => ui::kv(kind.as_str(), &root.display().to_string()),
            None => ui::kv(kind.as_str(), "(driver default)"),
        }
    }
    Ok(())
}

fn init(ctx: &Context, force: bool) -> Result<()> {
    let path = config_path(ctx)?;
    if path.exists() && !force {
        ui::warn(&format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
        return Ok(());
    }
    Config::starter()
        .save_to(&path)
        .with_context(|| format!("Could not initialise {}", path.display()))?;
    ui::success(&format!("Wrote {}", path.display()));
    Ok(())
}
