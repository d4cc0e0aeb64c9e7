//! Shared error type for misconfiguration caught at construction time.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("step '{step}' has payload kind {kind} but no {field} was set")]
    PayloadMismatch {
        step: String,
        kind: &'static str,
        field: &'static str,
    },

    #[error("step '{step}' declares a script payload but no script path was set")]
    MissingScriptPath { step: String },

    #[error(
        "final step '{step}' is fanned out over {count} global parameter keys; \
         the final step of a MultiStepsFunction must not be fanned out"
    )]
    FinalStepFannedOut { step: String, count: usize },

    #[error(
        "step '{step}' is the parent of a Results-typed dependency but every \
         one of its sub-jobs has return_results = false, so it never produces \
         a result to depend on"
    )]
    RunningNoMonitorResultsDependency { step: String },

    #[error(
        "step '{step}' has inconsistent return_results across its fanned-out \
         sub-jobs; all sub-jobs of a step must agree"
    )]
    MixedReturnResults { step: String },

    #[error("dependency '{dep}' references unknown step '{step}'")]
    UnknownDependency { step: String, dep: String },

    #[error("step '{step}' depends on itself")]
    SelfDependency { step: String },

    #[error("MultiStepsFunction has no steps")]
    EmptyFunction,

    #[error("global parameter '{name}' has no candidate values")]
    EmptyGlobalParameter { name: String },
}

/// Errors a `Runner` backend can raise while submitting, polling, or
/// cancelling a job.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RunnerError {
    #[error("failed to submit job '{job_id}': {message}")]
    Submit { job_id: String, message: String },

    #[error("failed to poll job '{job_id}': {message}")]
    Poll { job_id: String, message: String },

    #[error("failed to cancel job '{job_id}': {message}")]
    Cancel { job_id: String, message: String },

    #[error("job '{job_id}' could not be parsed: {message}")]
    ResultParse { job_id: String, message: String },

    #[error("runner '{runner}' does not support job kind '{kind}'")]
    UnsupportedKind { runner: &'static str, kind: &'static str },
}

/// Errors raised by `Job`'s lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JobError {
    #[error("job '{job_id}' has no runner bound")]
    NoRunner { job_id: String },

    #[error("job '{job_id}' has already been run")]
    AlreadyRun { job_id: String },

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
