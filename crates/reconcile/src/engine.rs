//! Reconciliation engine - probe, compare, plan, execute, classify
//!
//! One call reconciles one resource, synchronously. The mutating command runs
//! at most once; nothing is retried here.

use crate::context::{NoObserver, Phase, PhaseObserver};
use crate::driver::{Classification, Driver};
use crate::error::{Error, Result};
use crate::invoker::Invoker;
use crate::planner::{self, Action, ActionPlan};
use crate::types::{DesiredState, ExecutionOutcome, ObservedState};

/// Reconcile one resource with no phase observer
pub fn reconcile(
    driver: &dyn Driver,
    desired: &DesiredState,
    invoker: &dyn Invoker,
) -> Result<ExecutionOutcome> {
    reconcile_with(driver, desired, invoker, &mut NoObserver)
}

/// Reconcile one resource, reporting phase transitions to `observer`
///
/// # Arguments
/// * `driver` - Tool-specific probe/build/classify logic
/// * `desired` - Target state, read-only
/// * `invoker` - Runs the probe and mutating commands
/// * `observer` - Receives every phase transition
///
/// # Returns
/// The outcome, or the first fatal error. An already-satisfied result from
/// the tool is an outcome with `changed = false`, not an error.
pub fn reconcile_with(
    driver: &dyn Driver,
    desired: &DesiredState,
    invoker: &dyn Invoker,
    observer: &mut dyn PhaseObserver,
) -> Result<ExecutionOutcome> {
    observer.on_phase(Phase::NotProbed);
    preflight(driver, desired)?;

    let observed = probe(driver, desired, invoker)?;
    observer.on_phase(Phase::Probed);
    log::debug!(
        "{} '{}' observed present={}",
        driver.kind(),
        desired.resource_id(),
        observed.present
    );

    let plan = planner::plan(desired.target(), &observed);
    observer.on_plan(plan.action());
    observer.on_phase(Phase::PlanDecided);
    log::debug!(
        "{} '{}' target={} plan={}",
        driver.kind(),
        desired.resource_id(),
        desired.target(),
        plan.action()
    );

    if plan.is_noop() {
        observer.on_phase(Phase::Skipped);
        return Ok(skipped(driver, desired, &plan, observed));
    }

    driver.check_preconditions(desired, &plan)?;

    if desired.is_dry_run() {
        log::info!(
            "dry run: would {} {} '{}'",
            plan.action(),
            driver.kind(),
            desired.resource_id()
        );
        observer.on_phase(Phase::Skipped);
        return Ok(skipped(driver, desired, &plan, observed));
    }

    let command = driver.build_mutating_command(desired, &plan)?;
    let shown = command.to_string();
    log::info!("running: {shown}");
    observer.on_execute(&shown);
    let output = invoker.invoke(&command)?;
    observer.on_phase(Phase::Executed);

    let classification = driver.classify(&output, &plan);
    observer.on_phase(Phase::Classified);
    log::debug!("classified as {classification:?}");

    let outcome = match classification {
        Classification::Success => {
            let mut warnings = Vec::new();
            let facts = match probe(driver, desired, invoker) {
                Ok(fresh) => fresh.facts,
                Err(e) => {
                    log::warn!("post-action probe failed: {e}");
                    warnings.push(format!("post-action probe failed: {e}"));
                    observed.facts
                }
            };
            ExecutionOutcome {
                resource_id: desired.resource_id().to_string(),
                action: plan.action(),
                changed: true,
                succeeded: true,
                dry_run: false,
                message: driver.describe(desired, plan.action(), true),
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code: output.exit_code,
                facts,
                warnings,
            }
        }
        Classification::AlreadySatisfied { reason } => {
            log::info!("{} '{}': {reason}", driver.kind(), desired.resource_id());
            ExecutionOutcome {
                resource_id: desired.resource_id().to_string(),
                action: plan.action(),
                changed: false,
                succeeded: true,
                dry_run: false,
                message: format!(
                    "{} ({reason})",
                    driver.describe(desired, plan.action(), false)
                ),
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code: output.exit_code,
                facts: observed.facts,
                warnings: Vec::new(),
            }
        }
        Classification::Failure { reason } => {
            return Err(Error::Execution {
                message: format!(
                    "failed to {} {} '{}': {reason}",
                    verb(plan.action()),
                    driver.kind(),
                    desired.resource_id()
                ),
                output,
            });
        }
    };

    observer.on_phase(Phase::Reported);
    Ok(outcome)
}

/// Verify the tool root exists before anything runs
fn preflight(driver: &dyn Driver, desired: &DesiredState) -> Result<()> {
    if let Some(marker) = driver.tool_marker(desired)
        && !marker.exists()
    {
        return Err(Error::precondition(format!(
            "{} not found; make sure the tool is installed and its root is configured correctly",
            marker.display()
        )));
    }
    Ok(())
}

/// Run the probe (if any) and parse its output
fn probe(
    driver: &dyn Driver,
    desired: &DesiredState,
    invoker: &dyn Invoker,
) -> Result<ObservedState> {
    let Some(command) = driver.build_probe_command(desired)? else {
        log::debug!("probe skipped; {} known absent", driver.kind());
        return Ok(ObservedState::absent());
    };
    log::debug!("probing: {command}");
    let output = invoker.invoke(&command)?;
    let observed = driver.parse_probe(desired, &output)?;
    Ok(ObservedState {
        raw_probe_output: output.combined(),
        ..observed
    })
}

fn skipped(
    driver: &dyn Driver,
    desired: &DesiredState,
    plan: &ActionPlan,
    observed: ObservedState,
) -> ExecutionOutcome {
    let message = if plan.is_noop() {
        driver.describe(desired, Action::Noop, false)
    } else {
        format!(
            "{} '{}' would be {}",
            driver.kind(),
            desired.resource_id(),
            past_tense(plan.action())
        )
    };
    ExecutionOutcome {
        resource_id: desired.resource_id().to_string(),
        action: plan.action(),
        changed: false,
        succeeded: true,
        dry_run: desired.is_dry_run(),
        message,
        stdout: String::new(),
        stderr: String::new(),
        exit_code: None,
        facts: observed.facts,
        warnings: Vec::new(),
    }
}

fn verb(action: Action) -> &'static str {
    match action {
        Action::Noop => "check",
        Action::Create => "create",
        Action::Destroy => "remove",
        Action::Update => "update",
    }
}

fn past_tense(action: Action) -> &'static str {
    match action {
        Action::Noop => "left unchanged",
        Action::Create => "created",
        Action::Destroy => "removed",
        Action::Update => "updated",
    }
}
