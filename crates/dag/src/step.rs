//! Per-step payload and dependency specifications inside a
//! `MultiStepsFunction` template.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Name of a step inside a `MultiStepsFunction`, e.g. `"preprocess"`.
pub type StepName = String;

/// What kind of payload a step's sub-jobs run, and the backend they
/// target, decoupled from `ts-scheduler::Job`'s concrete `JobKind` so
/// this crate has no dependency on the scheduler or runner crates.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadKind {
    Function { function_name: String },
    Script { script_path: PathBuf },
    Container { image: String, command: Vec<String> },
}

impl PayloadKind {
    pub fn label(&self) -> &'static str {
        match self {
            PayloadKind::Function { .. } => "function",
            PayloadKind::Script { .. } => "script",
            PayloadKind::Container { .. } => "container",
        }
    }
}

/// Which backend runs a step's sub-jobs. A bare marker here; the actual
/// `Runner` implementation is wired up by the caller at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerKind {
    WorkerPool,
    HpcBatch,
    Distributed,
}

/// The full specification of one step's sub-jobs.
#[derive(Debug, Clone)]
pub struct StepSpec {
    pub payload: PayloadKind,
    pub runner: RunnerKind,
    /// Whether the backend reports completion/results for this step's
    /// sub-jobs. `false` puts the step straight into
    /// `StepState::RunningNoMonitor` once submitted.
    pub return_results: bool,
    pub parent_result_parameter: Option<String>,
    pub with_output_dataset: bool,
    pub output_dataset: Option<String>,
    pub output_file: Option<String>,
    pub num_events: u32,
    pub num_events_per_job: u32,
    pub with_input_datasets: bool,
    pub input_datasets: Option<BTreeMap<String, String>>,
}

impl StepSpec {
    pub fn new(payload: PayloadKind, runner: RunnerKind) -> Self {
        Self {
            payload,
            runner,
            return_results: true,
            parent_result_parameter: None,
            with_output_dataset: false,
            output_dataset: None,
            output_file: None,
            num_events: 1,
            num_events_per_job: 1,
            with_input_datasets: false,
            input_datasets: None,
        }
    }
}

impl StepSpec {
    ts_core::setters! {
        set {
            return_results: bool,
            with_output_dataset: bool,
            num_events: u32,
            num_events_per_job: u32,
            with_input_datasets: bool,
        }
        option {
            parent_result_parameter: String,
            output_dataset: String,
            output_file: String,
            input_datasets: BTreeMap<String, String>,
        }
    }
}

/// How a step depends on a parent step's sub-jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepType {
    /// Depend on the parent's result values.
    Results,
    /// Depend on the parent's declared output dataset name, threaded
    /// into the child as `parent_internal_id` for distributed backends.
    Datasets,
}

/// How a child's fanned-out sub-jobs map onto a parent's fanned-out
/// sub-jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepMap {
    /// Each child sub-job depends on the parent sub-job at the same
    /// `GlobalKey`.
    OneToOne,
    /// Each child sub-job depends on the aggregate of every parent
    /// sub-job's results, keyed by `GlobalKey`.
    AllToOne,
}

/// One dependency edge: `step -> parent`.
#[derive(Debug, Clone)]
pub struct DepSpec {
    pub parent: StepName,
    pub dep_type: DepType,
    pub dep_map: DepMap,
}

impl DepSpec {
    pub fn one_to_one(parent: impl Into<StepName>) -> Self {
        Self {
            parent: parent.into(),
            dep_type: DepType::Results,
            dep_map: DepMap::OneToOne,
        }
    }

    pub fn datasets(parent: impl Into<StepName>) -> Self {
        Self {
            parent: parent.into(),
            dep_type: DepType::Datasets,
            dep_map: DepMap::OneToOne,
        }
    }

    pub fn all_to_one(parent: impl Into<StepName>) -> Self {
        Self {
            parent: parent.into(),
            dep_type: DepType::Results,
            dep_map: DepMap::AllToOne,
        }
    }
}
