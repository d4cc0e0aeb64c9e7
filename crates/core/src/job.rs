//! The leaf execution unit: a function, script, or container payload
//! bound to a `Runner` and tracked through `JobState`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::JobError;
use crate::ids::JobId;
use crate::job_state::JobState;
use crate::params::{ParamMap, ParamValue};
use crate::runner::Runner;

/// A payload a `Job` can run, and the data each payload kind needs.
///
/// `Function` carries the callable directly (boxed, since a job may be
/// cloned into a sub-job map before it runs); `Script` and `Container`
/// carry only the reference a `Runner` backend needs to spawn the
/// external process.
#[derive(Clone)]
pub enum JobKind {
    Function(JobFunction),
    Script { script_path: PathBuf },
    Container { image: String, command: Vec<String> },
}

/// A function-job payload: takes the job's parameter map, returns a
/// JSON-scalar result map or an error message.
pub type JobFunction =
    Arc<dyn Fn(&ParamMap) -> Result<BTreeMap<String, serde_json::Value>, String> + Send + Sync>;

impl std::fmt::Debug for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Function(_) => write!(f, "JobKind::Function(..)"),
            JobKind::Script { script_path } => {
                f.debug_struct("JobKind::Script").field("script_path", script_path).finish()
            }
            JobKind::Container { image, command } => f
                .debug_struct("JobKind::Container")
                .field("image", image)
                .field("command", command)
                .finish(),
        }
    }
}

impl JobKind {
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Function(_) => "function",
            JobKind::Script { .. } => "script",
            JobKind::Container { .. } => "container",
        }
    }
}

/// A leaf unit of work: one function/script/container invocation bound
/// to a `Runner`.
///
/// Grounded on `job.py::Job`. Unlike the Python original, state
/// transitions (`run`/`mark_completed`/`mark_failed`/`cancel`) take an
/// explicit `&impl Clock` instead of calling `datetime.now()` directly,
/// so callers can drive them deterministically with `FakeClock`.
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub params: ParamMap,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub output_files: Vec<String>,
    pub state: JobState,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    pub results: BTreeMap<String, serde_json::Value>,
    pub error: Option<String>,
    pub parent_result_parameter: Option<String>,
    pub return_results: bool,
    pub with_output_dataset: bool,
    pub output_dataset: Option<String>,
    pub output_file: Option<String>,
    pub num_events: u32,
    pub num_events_per_job: u32,
    pub with_input_datasets: bool,
    pub input_datasets: Option<BTreeMap<String, String>>,
    /// Backend-assigned identifier (e.g. an iDDS work's `internal_id`),
    /// set by the runner once submission succeeds.
    pub internal_id: Option<String>,
    /// A `datasets`-typed dependency's parent `internal_id`, threaded in
    /// before `run` by the owning `MultiStepsJob`.
    pub parent_internal_id: Option<String>,
    runner: Option<Arc<dyn Runner>>,
    ran: bool,
}

impl Job {
    pub fn new(id: JobId, kind: JobKind, clock: &impl Clock) -> Self {
        Self {
            id,
            kind,
            params: ParamMap::new(),
            env: BTreeMap::new(),
            cwd: None,
            output_files: Vec::new(),
            state: JobState::Created,
            created_at_ms: clock.epoch_ms(),
            started_at_ms: None,
            ended_at_ms: None,
            results: BTreeMap::new(),
            error: None,
            parent_result_parameter: None,
            return_results: true,
            with_output_dataset: false,
            output_dataset: None,
            output_file: None,
            num_events: 1,
            num_events_per_job: 1,
            with_input_datasets: false,
            input_datasets: None,
            internal_id: None,
            parent_internal_id: None,
            runner: None,
            ran: false,
        }
    }

    pub fn bind_runner(&mut self, runner: Arc<dyn Runner>) {
        self.runner = Some(runner);
    }

    /// Run this job using its bound runner. Refuses a second call —
    /// a `MultiStepsJob` step is only ever readied once.
    pub async fn run(&mut self, clock: &impl Clock) -> Result<(), JobError> {
        if self.ran {
            return Err(JobError::AlreadyRun { job_id: self.id.to_string() });
        }
        let runner = self
            .runner
            .clone()
            .ok_or_else(|| JobError::NoRunner { job_id: self.id.to_string() })?;

        self.ran = true;
        self.state = JobState::Running;
        self.started_at_ms = Some(clock.epoch_ms());
        tracing::info!(job_id = %self.id, kind = self.kind.label(), "running job");

        runner.submit(self).await?;
        Ok(())
    }

    /// Poll the bound runner for a status update. A no-op for jobs that
    /// don't report results (`return_results = false`) or are already
    /// terminal, matching `Job.check_status`'s guard.
    pub async fn poll_status(&mut self, _clock: &impl Clock) -> Result<(), JobError> {
        if !self.return_results || self.state.is_terminal() {
            return Ok(());
        }
        let runner = self
            .runner
            .clone()
            .ok_or_else(|| JobError::NoRunner { job_id: self.id.to_string() })?;
        runner.poll(self).await?;
        Ok(())
    }

    /// Cancel this job via its bound runner, then mark it cancelled.
    ///
    /// A backend cancel failure is logged, not propagated (spec §5:
    /// "failures during cancel are logged, not propagated") — the job
    /// is marked `Cancelled` locally regardless, so a cascading cancel
    /// of a `MultiStepsJob`'s other sub-jobs can never be aborted partway
    /// through by one backend's cancel error.
    pub async fn cancel(&mut self, clock: &impl Clock) -> Result<(), JobError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        if let Some(runner) = self.runner.clone() {
            if let Err(error) = runner.cancel(self).await {
                tracing::error!(job_id = %self.id, %error, "runner cancel failed; marking job cancelled anyway");
            }
        }
        tracing::info!(job_id = %self.id, "cancelled job");
        self.state = JobState::Cancelled;
        self.ended_at_ms = Some(clock.epoch_ms());
        Ok(())
    }

    pub fn mark_completed(&mut self, results: BTreeMap<String, serde_json::Value>, clock: &impl Clock) {
        tracing::info!(job_id = %self.id, "job completed");
        self.state = JobState::Completed;
        self.ended_at_ms = Some(clock.epoch_ms());
        self.results = results;
    }

    pub fn mark_running_no_monitor(&mut self, clock: &impl Clock) {
        self.state = JobState::RunningNoMonitor;
        self.ended_at_ms = Some(clock.epoch_ms());
    }

    pub fn mark_failed(&mut self, error: Option<String>, clock: &impl Clock) {
        tracing::info!(job_id = %self.id, ?error, "job failed");
        self.state = JobState::Failed;
        self.ended_at_ms = Some(clock.epoch_ms());
        if let Some(error) = error {
            self.results.insert("error".to_string(), serde_json::Value::String(error));
        }
    }

    pub fn get_results(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.results
    }

    /// Copy the parent's result at `parent_result_parameter` into this
    /// job's own parameter map under the same key, per
    /// `Job.set_parent_results`.
    pub fn set_parent_result(&mut self, parent_results: &BTreeMap<String, serde_json::Value>) {
        let Some(key) = self.parent_result_parameter.clone() else {
            return;
        };
        if parent_results.is_empty() {
            return;
        }
        let value = parent_results
            .get(&key)
            .cloned()
            .map(|v| ParamValue::try_from(v).unwrap_or(ParamValue::Null))
            .unwrap_or(ParamValue::Null);
        tracing::info!(job_id = %self.id, param = %key, "set parent result parameter");
        self.params.insert(key, value);
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
