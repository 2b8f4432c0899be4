mod cli;
mod commands;
mod config;
mod paths;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, OutputFormat};
use config::Config;
use imkit::DriverKind;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub output: OutputFormat,
    pub dry_run: bool,
    pub timeout: Option<u64>,
    pub config_path: Option<PathBuf>,
    pub config: Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        output: config.output(cli.output),
        dry_run: cli.dry_run,
        timeout: cli.timeout,
        config_path: cli.config,
        config,
    };

    let status = match cli.command {
        Command::Package(args) => commands::provision::run(&ctx, DriverKind::Package, args)?,
        Command::Installer(args) => commands::provision::run(&ctx, DriverKind::Installer, args)?,
        Command::Profile(args) => commands::provision::run(&ctx, DriverKind::Profile, args)?,
        Command::LibertyServer(args) => {
            commands::provision::run(&ctx, DriverKind::LibertyServer, args)?
        }
        Command::Server(args) => commands::provision::run(&ctx, DriverKind::Server, args)?,
        Command::Doctor => {
            commands::doctor::run(&ctx)?;
            0
        }
        Command::Config(cmd) => {
            commands::config::run(&ctx, cmd)?;
            0
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "wasprov", &mut io::stdout());
            0
        }
    };

    if status != 0 {
        std::process::exit(status);
    }
    Ok(())
}
