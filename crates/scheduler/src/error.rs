//! Error type for the scheduler crate: wraps `ts_core`'s construction-
//! and runtime-error enums and adds the misconfigurations specific to
//! wiring a `MultiStepsFunction` template up to concrete functions and
//! runners.

use thiserror::Error;
use ts_core::{CoreError, JobError};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("step '{step}' references unknown function '{function_name}'")]
    UnknownFunction { step: String, function_name: String },

    #[error("step '{step}' has no runner registered for its runner kind")]
    UnknownRunner { step: String },

    #[error("step '{step}' has no sub-job at key '{key}' for parent step '{parent}'")]
    MissingParentSubJob { step: String, parent: String, key: String },

    #[error("trial {trial_index} not found")]
    UnknownTrial { trial_index: u64 },

    #[error("optimizer produced no further suggestions")]
    NoSuggestion,

    #[error("no objective attached to the scheduler")]
    NoObjective,
}
