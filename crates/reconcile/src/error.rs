//! Error types for reconciliation.
//!
//! Every fatal condition is returned as a value. Each variant that follows
//! an external command carries the captured output verbatim so an operator
//! can diagnose the failure. "Already satisfied" outcomes are not errors and
//! never appear here.

use crate::types::CommandOutput;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Tool root missing, required parameter absent, invalid request
    Precondition,
    /// The probe could not establish the current state
    Probe,
    /// The mutating command failed
    Execution,
    /// The child process exceeded its deadline or was cancelled
    Timeout,
    /// The command could not be started at all
    Spawn,
}

impl ErrorCategory {
    /// Short name used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Precondition => "precondition",
            Self::Probe => "probe",
            Self::Execution => "execution",
            Self::Timeout => "timeout",
            Self::Spawn => "spawn",
        }
    }

    /// Whether the managed system may have been changed before the error.
    ///
    /// Callers that retry must re-probe first when this is true.
    pub fn may_have_mutated(&self) -> bool {
        matches!(self, Self::Execution | Self::Timeout)
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Precondition => "Check the tool location and the required parameters",
            Self::Probe => "Inspect the probe output; the current state could not be trusted",
            Self::Execution => "Inspect stdout/stderr of the failed command",
            Self::Timeout => "Re-run after checking the tool; the action may have partially completed",
            Self::Spawn => "Verify the program path exists and is executable",
        }
    }
}

/// Errors that can occur while reconciling a resource.
#[derive(Debug, Error)]
pub enum Error {
    /// The request itself is malformed
    #[error("invalid desired state: {0}")]
    InvalidDesiredState(String),

    /// A precondition for the requested action does not hold
    #[error("precondition failed: {message}")]
    Precondition {
        /// What is missing
        message: String,
    },

    /// The probe exited abnormally for a reason other than "not found"
    #[error("probe failed for '{resource}': {message}")]
    Probe {
        /// Resource being probed
        resource: String,
        /// Why the probe output could not be trusted
        message: String,
        /// Captured probe output
        output: CommandOutput,
    },

    /// The mutating command failed and no benign pattern matched
    #[error("{message}")]
    Execution {
        /// Human-readable summary
        message: String,
        /// Captured output of the failed command, unmodified
        output: CommandOutput,
    },

    /// The child exceeded its deadline and was terminated
    #[error("command timed out after {}s: {command}", after.as_secs())]
    Timeout {
        /// Redacted command line
        command: String,
        /// Deadline that was exceeded
        after: Duration,
    },

    /// The child was terminated through a cancellation token
    #[error("command cancelled: {command}")]
    Cancelled {
        /// Redacted command line
        command: String,
    },

    /// The command could not be started
    #[error("failed to execute {command}: {source}")]
    Spawn {
        /// Redacted command line
        command: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Shorthand for a precondition failure
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidDesiredState(_) | Error::Precondition { .. } => {
                ErrorCategory::Precondition
            }
            Error::Probe { .. } => ErrorCategory::Probe,
            Error::Execution { .. } => ErrorCategory::Execution,
            Error::Timeout { .. } | Error::Cancelled { .. } => ErrorCategory::Timeout,
            Error::Spawn { .. } => ErrorCategory::Spawn,
        }
    }

    /// Captured output of the command behind this error, if any
    pub fn output(&self) -> Option<&CommandOutput> {
        match self {
            Error::Probe { output, .. } | Error::Execution { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            Error::precondition("missing").category(),
            ErrorCategory::Precondition
        );
        assert_eq!(
            Error::InvalidDesiredState("x".into()).category(),
            ErrorCategory::Precondition
        );
        assert_eq!(
            Error::Cancelled {
                command: "imcl".into()
            }
            .category(),
            ErrorCategory::Timeout
        );
    }

    #[test]
    fn test_may_have_mutated() {
        assert!(ErrorCategory::Execution.may_have_mutated());
        assert!(ErrorCategory::Timeout.may_have_mutated());
        assert!(!ErrorCategory::Precondition.may_have_mutated());
        assert!(!ErrorCategory::Probe.may_have_mutated());
    }

    #[test]
    fn test_execution_error_keeps_output() {
        let err = Error::Execution {
            message: "Failed installing package 'x'".into(),
            output: CommandOutput::new(1, "out", "err"),
        };
        assert_eq!(err.to_string(), "Failed installing package 'x'");
        let output = err.output().unwrap();
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout {
            command: "/opt/imcl version".into(),
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "command timed out after 30s: /opt/imcl version");
    }
}
