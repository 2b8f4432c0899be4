use anyhow::{Context as _, Result};
use imkit::DriverKind;
use reconcile::{
    Credentials, DesiredState, Error, LocationHints, Parameters, ProcessInvoker, Report,
};

use crate::Context;
use crate::cli::{OutputFormat, ResourceArgs};
use crate::paths;
use crate::ui;

/// Reconcile one resource and render the report
///
/// Returns the process exit status.
pub fn run(ctx: &Context, kind: DriverKind, args: ResourceArgs) -> Result<i32> {
    let driver = kind.driver();
    let invoker = ProcessInvoker::new().with_timeout(ctx.config.timeout(ctx.timeout));
    log::debug!("{kind}: timeout {:?}", invoker.timeout());

    let result = desired_state(ctx, kind, args).and_then(|desired| {
        if ctx.output == OutputFormat::Text {
            let mut observer = ui::ProgressObserver { quiet: ctx.quiet };
            reconcile::reconcile_with(driver.as_ref(), &desired, &invoker, &mut observer)
        } else {
            reconcile::reconcile(driver.as_ref(), &desired, &invoker)
        }
    });
    if let Err(e) = &result {
        log::debug!("{kind} failed: {e:?}");
    }

    let report = Report::from_result(&result);
    match ctx.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Could not serialize report")?;
            println!("{json}");
        }
        OutputFormat::Text => ui::report(&report, ctx.verbose),
    }
    Ok(report.exit_status())
}

/// Merge CLI arguments with config into a desired state
fn desired_state(ctx: &Context, kind: DriverKind, args: ResourceArgs) -> reconcile::Result<DesiredState> {
    let credentials = match (args.username, args.password) {
        (Some(username), Some(password)) => Some(Credentials::new(username, password)),
        (None, None) => None,
        _ => {
            return Err(Error::InvalidDesiredState(
                "username and password must be given together".into(),
            ));
        }
    };

    let mut locations = LocationHints {
        tool_root: args
            .tool_root
            .as_deref()
            .map(paths::expand)
            .or_else(|| ctx.config.tool_root(kind)),
        install_dir: args.install_dir.as_deref().map(paths::expand),
        shared_dir: args.shared_dir.as_deref().map(paths::expand),
        source_dir: args.source_dir.as_deref().map(paths::expand),
        log_dir: args
            .log_dir
            .as_deref()
            .map(paths::expand)
            .or_else(|| ctx.config.log_dir()),
    };
    // Installation Manager's own root is where it gets installed
    if kind == DriverKind::Installer && locations.install_dir.is_none() {
        locations.install_dir = locations.tool_root.take();
    }

    let parameters: Parameters = args.params.into_iter().collect();

    let desired = DesiredState::new(args.name, args.state)?
        .with_locations(locations)
        .with_parameters(parameters)
        .with_credentials(credentials)
        .with_dry_run(ctx.dry_run);
    log::debug!(
        "{kind} '{}': target={} credentials={:?}",
        desired.resource_id(),
        desired.target(),
        desired.credentials()
    );
    Ok(desired)
}
