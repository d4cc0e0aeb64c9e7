//! `MultiStepsJob`: the DAG executor built from a `MultiStepsFunction`
//! template — one `ts_core::Job` per step per fanned-out `GlobalKey`.
//!
//! Grounded on `original_source/scheduler/job/multi_steps_job.py`
//! (`MultiStepsJob`): `_initialize` → [`MultiStepsJob::new`],
//! `get_ready_steps` → [`MultiStepsJob::ready_steps`],
//! `get_parent_results`/`set_parent_results` → the parent-resolution
//! step inside [`MultiStepsJob::run_ready_steps`], `run_ready_steps` →
//! same, `check_status` → [`MultiStepsJob::poll`].

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use ts_core::{
    Clock, CoreError, DepState, Job, JobFunction, JobId, JobState, ParamMap, Runner, StepJobId,
    StepState, TrialId,
};
use ts_dag::{cartesian_product, expand_dataset_name, DepMap, DepType, GlobalKey, MultiStepsFunction, PayloadKind, RunnerKind, StepName};

use crate::error::SchedulerError;

/// Name-addressed function-payload callables, resolved by
/// `PayloadKind::Function { function_name }` at construction time.
pub type FunctionRegistry = HashMap<String, JobFunction>;

/// Concrete `Runner` backends, resolved by `StepSpec::runner` at
/// construction time.
pub type RunnerRegistry = HashMap<RunnerKind, Arc<dyn Runner>>;

fn job_kind_for(payload: &PayloadKind, functions: &FunctionRegistry, step: &str) -> Result<ts_core::JobKind, SchedulerError> {
    match payload {
        PayloadKind::Function { function_name } => {
            let f = functions.get(function_name).cloned().ok_or_else(|| SchedulerError::UnknownFunction {
                step: step.to_string(),
                function_name: function_name.clone(),
            })?;
            Ok(ts_core::JobKind::Function(f))
        }
        PayloadKind::Script { script_path } => Ok(ts_core::JobKind::Script { script_path: script_path.clone() }),
        PayloadKind::Container { image, command } => {
            Ok(ts_core::JobKind::Container { image: image.clone(), command: command.clone() })
        }
    }
}

/// A multi-step job: one `ts_core::Job` per step per `GlobalKey`,
/// scheduled according to the template's dependency edges.
///
/// Unlike `job.py::Job`'s single-job model, `MultiStepsJob` doesn't
/// implement `ts_core::Runner` itself — it's driven directly by
/// `Trial`/`TrialScheduler` via `run`/`poll`, mirroring how
/// `multi_steps_job.py::MultiStepsJob` subclasses `Job` but only ever
/// calls its own `run`/`check_status`, never `set_runner`.
pub struct MultiStepsJob {
    pub id: JobId,
    pub trial_id: TrialId,
    pub state: JobState,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    pub results: BTreeMap<String, Value>,
    function: Arc<MultiStepsFunction>,
    step_jobs: IndexMap<StepName, BTreeMap<GlobalKey, Job>>,
    step_states: IndexMap<StepName, StepState>,
    dep_states: HashMap<StepName, DepState>,
    final_step: StepName,
}

impl MultiStepsJob {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: JobId,
        trial_id: TrialId,
        function: Arc<MultiStepsFunction>,
        params: ParamMap,
        env: BTreeMap<String, String>,
        cwd: Option<PathBuf>,
        functions: &FunctionRegistry,
        runners: &RunnerRegistry,
        clock: &impl Clock,
    ) -> Result<Self, SchedulerError> {
        let global_keys = cartesian_product(&function.global_parameters);
        let final_step = function
            .final_step()
            .cloned()
            .ok_or(SchedulerError::Core(CoreError::EmptyFunction))?;

        let mut step_jobs: IndexMap<StepName, BTreeMap<GlobalKey, Job>> = IndexMap::new();
        let mut step_states: IndexMap<StepName, StepState> = IndexMap::new();

        for (step_name, spec) in &function.steps {
            let fan_out = !global_keys.is_empty() && function.global_parameters_steps.contains(step_name);
            let keys: Vec<GlobalKey> = if fan_out { global_keys.clone() } else { vec![GlobalKey::none()] };

            if step_name == &final_step && keys.len() > 1 {
                return Err(SchedulerError::Core(CoreError::FinalStepFannedOut {
                    step: step_name.clone(),
                    count: keys.len(),
                }));
            }

            let mut jobs: BTreeMap<GlobalKey, Job> = BTreeMap::new();
            for key in &keys {
                let step_job_id = StepJobId::new();
                let job_id = JobId::from_string(step_job_id.as_str());
                let kind = job_kind_for(&spec.payload, functions, step_name)?;
                let mut job = Job::new(job_id, kind, clock);

                let mut job_params = params.clone();
                if let GlobalKey::Keyed(pairs) = key {
                    for (k, v) in pairs {
                        job_params.insert(k.clone(), v.clone());
                    }
                }
                job.params = job_params;
                job.env = env.clone();
                job.cwd = cwd.clone();
                job.return_results = spec.return_results;
                job.parent_result_parameter = spec.parent_result_parameter.clone();
                job.with_output_dataset = spec.with_output_dataset;
                job.output_dataset = spec
                    .output_dataset
                    .as_deref()
                    .map(|t| expand_dataset_name(t, key, trial_id.as_str(), job.id.as_str()));
                job.output_file = spec.output_file.clone();
                job.num_events = spec.num_events;
                job.num_events_per_job = spec.num_events_per_job;
                job.with_input_datasets = spec.with_input_datasets;
                job.input_datasets = spec.input_datasets.as_ref().map(|m| {
                    m.iter()
                        .map(|(k, v)| (k.clone(), expand_dataset_name(v, key, trial_id.as_str(), job.id.as_str())))
                        .collect()
                });

                let runner = runners
                    .get(&spec.runner)
                    .cloned()
                    .ok_or_else(|| SchedulerError::UnknownRunner { step: step_name.clone() })?;
                job.bind_runner(runner);

                jobs.insert(key.clone(), job);
            }

            step_jobs.insert(step_name.clone(), jobs);
            step_states.insert(step_name.clone(), StepState::New);
        }

        let dep_states = function.deps.keys().map(|k| (k.clone(), DepState::New)).collect();

        tracing::info!(name = %function.name(), steps = step_jobs.len(), "initialized MultiStepsJob");

        Ok(Self {
            id,
            trial_id,
            state: JobState::Created,
            created_at_ms: clock.epoch_ms(),
            started_at_ms: None,
            ended_at_ms: None,
            results: BTreeMap::new(),
            function,
            step_jobs,
            step_states,
            dep_states,
            final_step,
        })
    }

    /// Steps whose own state is `New` and whose incoming dependency
    /// edge (if any) is `Ready`, in template declaration order.
    pub fn ready_steps(&self) -> Vec<StepName> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        self.step_jobs
            .keys()
            .filter(|name| {
                let is_new = self.step_states.get(*name).copied().unwrap_or(StepState::New) == StepState::New;
                let dep_ready = match self.function.deps.get(*name) {
                    None => true,
                    Some(_) => self.dep_states.get(*name).copied().unwrap_or(DepState::New) == DepState::Ready,
                };
                is_new && dep_ready
            })
            .cloned()
            .collect()
    }

    /// Resolve and apply the parent result (or parent internal id, for
    /// `datasets` dependencies) for one sub-job, mutating it in place.
    /// Grounded on `get_parent_results`/`set_parent_results`.
    fn apply_parent_result(&self, step: &str, key: &GlobalKey, job: &mut Job) -> Result<(), SchedulerError> {
        let Some(dep) = self.function.deps.get(step) else {
            return Ok(());
        };
        let Some(parent_jobs) = self.step_jobs.get(&dep.parent) else {
            return Ok(());
        };

        match dep.dep_type {
            DepType::Datasets => {
                let parent_job = parent_jobs.get(key).ok_or_else(|| SchedulerError::MissingParentSubJob {
                    step: step.to_string(),
                    parent: dep.parent.clone(),
                    key: key.to_string(),
                })?;
                job.parent_internal_id = parent_job.internal_id.clone();
                Ok(())
            }
            DepType::Results => match dep.dep_map {
                DepMap::OneToOne => {
                    let parent_job = parent_jobs.get(key).ok_or_else(|| SchedulerError::MissingParentSubJob {
                        step: step.to_string(),
                        parent: dep.parent.clone(),
                        key: key.to_string(),
                    })?;
                    job.set_parent_result(&parent_job.results);
                    Ok(())
                }
                DepMap::AllToOne => {
                    let mut aggregated = serde_json::Map::new();
                    for (parent_key, parent_job) in parent_jobs {
                        for (metric, value) in &parent_job.results {
                            let entry = aggregated
                                .entry(metric.clone())
                                .or_insert_with(|| Value::Object(serde_json::Map::new()));
                            if let Value::Object(map) = entry {
                                map.insert(parent_key.raw_string(), value.clone());
                            }
                        }
                    }
                    // The whole aggregated `{metric: {parent_key: value}}` mapping is
                    // injected as one value, not looked up by metric name, so wrap it
                    // under the child's own parent_result_parameter key before handing
                    // it to the same lookup-by-name logic OneToOne uses.
                    if let Some(key) = job.parent_result_parameter.clone() {
                        let mut wrapped = BTreeMap::new();
                        wrapped.insert(key, Value::Object(aggregated));
                        job.set_parent_result(&wrapped);
                    }
                    Ok(())
                }
            },
        }
    }

    /// Resolve parent results, run every sub-job of every ready step,
    /// then roll each ready step's state to `Running` or
    /// `RunningNoMonitor` depending on whether its sub-jobs report
    /// results. Grounded on `run_ready_steps`.
    #[allow(clippy::expect_used)]
    pub async fn run_ready_steps(&mut self, clock: &impl Clock) -> Result<(), SchedulerError> {
        let ready = self.ready_steps();
        if !ready.is_empty() {
            tracing::info!(job_id = %self.id, ?ready, "ready to run steps");
        }

        for step in ready {
            let keys: Vec<GlobalKey> = self.step_jobs.get(&step).map(|m| m.keys().cloned().collect()).unwrap_or_default();

            for key in &keys {
                let mut job = self
                    .step_jobs
                    .get_mut(&step)
                    .and_then(|m| m.remove(key))
                    .expect("key was just read from this step's own map");
                let result = self.apply_parent_result(&step, key, &mut job);
                if let Some(m) = self.step_jobs.get_mut(&step) {
                    m.insert(key.clone(), job);
                }
                result?;

                let job = self
                    .step_jobs
                    .get_mut(&step)
                    .and_then(|m| m.get_mut(key))
                    .expect("key was just reinserted");
                tracing::info!(job_id = %job.id, %step, global_key = %key, "readying sub-job");
                job.run(clock).await?;
            }

            let jobs = &self.step_jobs[&step];
            let all_results = jobs.values().all(|j| j.return_results);
            let none_results = jobs.values().all(|j| !j.return_results);
            if !all_results && !none_results {
                return Err(SchedulerError::Core(CoreError::MixedReturnResults { step: step.clone() }));
            }
            self.step_states
                .insert(step.clone(), if all_results { StepState::Running } else { StepState::RunningNoMonitor });
        }
        Ok(())
    }

    /// Run this job: transitions to `Running` and launches its
    /// initially-ready steps. Grounded on `MultiStepsJob.run`.
    pub async fn run(&mut self, clock: &impl Clock) -> Result<(), SchedulerError> {
        self.state = JobState::Running;
        self.started_at_ms = Some(clock.epoch_ms());
        tracing::info!(job_id = %self.id, "running multi-steps job");
        self.run_ready_steps(clock).await
    }

    fn extract_final_results(&mut self, final_state: StepState, clock: &impl Clock) -> Result<(), SchedulerError> {
        let jobs = self.step_jobs.get(&self.final_step).map(|m| m.len()).unwrap_or(0);
        if jobs != 1 {
            return Err(SchedulerError::Core(CoreError::FinalStepFannedOut { step: self.final_step.clone(), count: jobs }));
        }
        let results = self
            .step_jobs
            .get(&self.final_step)
            .and_then(|m| m.values().next())
            .map(|j| j.results.clone())
            .unwrap_or_default();
        tracing::info!(job_id = %self.id, step = %self.final_step, "extracted final results");
        self.results = results;
        self.ended_at_ms = Some(clock.epoch_ms());
        self.state = if final_state == StepState::Completed { JobState::Completed } else { JobState::Failed };
        Ok(())
    }

    /// Poll every non-terminal, `return_results = true` sub-job;
    /// cancel and fail everything on any sub-job failure; roll up
    /// per-step state; extract and terminate on the final step's
    /// completion; advance dependency edges; launch newly-ready steps.
    /// Grounded on `check_status`.
    pub async fn poll(&mut self, clock: &impl Clock) -> Result<(), SchedulerError> {
        if self.state.is_terminal() {
            return Ok(());
        }

        let mut has_failures = false;
        for jobs in self.step_jobs.values_mut() {
            for job in jobs.values_mut() {
                if !job.return_results {
                    continue;
                }
                job.poll_status(clock).await?;
                if job.state == JobState::Failed {
                    has_failures = true;
                }
            }
        }

        if has_failures {
            for jobs in self.step_jobs.values_mut() {
                for job in jobs.values_mut() {
                    if let Err(error) = job.cancel(clock).await {
                        tracing::error!(
                            job_id = %self.id, sub_job_id = %job.id, %error,
                            "failed to cancel sub-job during failure cascade"
                        );
                    }
                }
            }
            tracing::error!(job_id = %self.id, "job has failures, cancelling remaining sub-jobs");
            self.state = JobState::Failed;
            self.ended_at_ms = Some(clock.epoch_ms());
            self.results
                .insert("error".to_string(), Value::String(format!("job {} has failures", self.id)));
            return Ok(());
        }

        for (step, jobs) in self.step_jobs.iter() {
            let all_completed = jobs.values().all(|j| j.state == JobState::Completed);
            let any_failed = jobs.values().any(|j| j.state == JobState::Failed);
            if all_completed {
                self.step_states.insert(step.clone(), StepState::Completed);
            } else if any_failed {
                self.step_states.insert(step.clone(), StepState::Failed);
            }
        }

        let final_state = self.step_states.get(&self.final_step).copied().unwrap_or(StepState::New);
        if matches!(final_state, StepState::Completed | StepState::Failed) {
            return self.extract_final_results(final_state, clock);
        }

        for (step, dep) in self.function.deps.iter() {
            if self.dep_states.get(step).copied().unwrap_or(DepState::New) != DepState::Ready {
                let parent_state = self.step_states.get(&dep.parent).copied().unwrap_or(StepState::New);
                if matches!(parent_state, StepState::Completed | StepState::Failed | StepState::RunningNoMonitor) {
                    self.dep_states.insert(step.clone(), DepState::Ready);
                }
            }
        }

        self.run_ready_steps(clock).await
    }

    pub fn get_results(&self) -> &BTreeMap<String, Value> {
        &self.results
    }

    /// Direct access to every step's sub-job map, for callers (namely
    /// `Trial::cancel`) that need to reach into every sub-job rather
    /// than go through the rolled-up step state.
    pub fn step_jobs_mut(&mut self) -> &mut IndexMap<StepName, BTreeMap<GlobalKey, Job>> {
        &mut self.step_jobs
    }
}

#[cfg(test)]
#[path = "multi_steps_tests.rs"]
mod tests;
