//! # Reconcile
//!
//! Idempotent provision-or-remove for one resource managed by an external,
//! imperative command-line tool.
//!
//! ## Core Concepts
//!
//! - **Driver**: Tool-specific probe, command building and output classification
//! - **Invoker**: Runs one command as discrete arguments, with optional timeout
//! - **Comparator**: Decides `noop`, `create`, `destroy` or `update`
//! - **Engine**: probe -> compare -> plan -> execute -> classify
//! - **Report**: Maps the outcome onto what the host prints
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{DesiredState, ProcessInvoker, Report, TargetPresence, reconcile};
//!
//! let desired = DesiredState::new("com.ibm.websphere.liberty.BASE.v85", TargetPresence::Present)?;
//! let invoker = ProcessInvoker::new();
//! let result = reconcile(&my_driver, &desired, &invoker);
//! let report = Report::from_result(&result);
//! std::process::exit(report.exit_status());
//! ```
//!
//! ## Idempotency
//!
//! Many tools exit non-zero when the end state already holds ("already
//! running", "profile does not exist"). Drivers list those cases as
//! [`BenignRule`]s; the engine reports them as success without change.
//! Anything not listed is a failure.

pub mod command;
pub mod context;
pub mod driver;
pub mod engine;
pub mod error;
pub mod invoker;
pub mod planner;
pub mod report;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

// Re-export main types at crate root
pub use command::CommandSpec;
pub use context::{NoObserver, Phase, PhaseLog, PhaseObserver};
pub use driver::{BenignRule, BoxedDriver, Classification, Driver, classify_with_rules};
pub use engine::{reconcile, reconcile_with};
pub use error::{Error, ErrorCategory, Result};
pub use invoker::{CancelToken, Invoker, ProcessInvoker};
pub use planner::{Action, ActionPlan, compare};
pub use report::Report;
pub use types::{
    CommandOutput, Credentials, DesiredState, ExecutionOutcome, LocationHints, ObservedState,
    Parameters, TargetPresence,
};
