//! `Trial`: one optimizer-suggested parameter combination and the
//! job(s) run to evaluate it.
//!
//! Grounded on `original_source/scheduler/trial/trial.py` (`Trial`):
//! `add_job` → [`Trial::add_job`], `run` → [`Trial::run`],
//! `check_status` → [`Trial::poll`], `get_results` → [`Trial::results`].

use std::collections::BTreeMap;

use serde_json::Value;
use ts_core::{Clock, JobState, ParamMap, TrialId, TrialState};

use crate::error::SchedulerError;
use crate::multi_steps::MultiStepsJob;
use crate::Job;

/// One evaluation unit inside a trial: either a single leaf job or a
/// multi-step DAG job. `Trial` drives both through the same interface
/// without requiring a shared trait object, since `MultiStepsJob`
/// doesn't implement `ts_core::Runner` (it's driven directly, not bound
/// to one).
pub enum TrialJob {
    Single(Job),
    MultiSteps(MultiStepsJob),
}

impl TrialJob {
    async fn run(&mut self, clock: &impl Clock) -> Result<(), SchedulerError> {
        match self {
            TrialJob::Single(job) => Ok(job.run(clock).await?),
            TrialJob::MultiSteps(job) => job.run(clock).await,
        }
    }

    async fn poll(&mut self, clock: &impl Clock) -> Result<(), SchedulerError> {
        match self {
            TrialJob::Single(job) => Ok(job.poll_status(clock).await?),
            TrialJob::MultiSteps(job) => job.poll(clock).await,
        }
    }

    async fn cancel(&mut self, clock: &impl Clock) -> Result<(), SchedulerError> {
        match self {
            TrialJob::Single(job) => Ok(job.cancel(clock).await?),
            TrialJob::MultiSteps(job) => {
                // MultiStepsJob has no single bound runner to cancel
                // through; cancel every non-terminal sub-job directly.
                for jobs in job.step_jobs_mut().values_mut() {
                    for sub_job in jobs.values_mut() {
                        sub_job.cancel(clock).await?;
                    }
                }
                Ok(())
            }
        }
    }

    fn state(&self) -> JobState {
        match self {
            TrialJob::Single(job) => job.state,
            TrialJob::MultiSteps(job) => job.state,
        }
    }

    fn results(&self) -> &BTreeMap<String, Value> {
        match self {
            TrialJob::Single(job) => job.get_results(),
            TrialJob::MultiSteps(job) => job.get_results(),
        }
    }
}

/// One optimizer-suggested parameter combination, tracked through its
/// constituent job(s) to a final result.
///
/// Grounded on `Trial`: `num_trials` index bookkeeping lives in
/// `TrialScheduler` (mirroring `AxScheduler.trials`), not here.
pub struct Trial {
    pub id: TrialId,
    pub params: ParamMap,
    pub state: TrialState,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    jobs: Vec<TrialJob>,
    results: BTreeMap<String, Value>,
}

impl Trial {
    pub fn new(id: TrialId, params: ParamMap, clock: &impl Clock) -> Self {
        Self {
            id,
            params,
            state: TrialState::Created,
            created_at_ms: clock.epoch_ms(),
            started_at_ms: None,
            ended_at_ms: None,
            jobs: Vec::new(),
            results: BTreeMap::new(),
        }
    }

    pub fn add_job(&mut self, job: Job) {
        self.jobs.push(TrialJob::Single(job));
    }

    pub fn add_multi_steps_job(&mut self, job: MultiStepsJob) {
        self.jobs.push(TrialJob::MultiSteps(job));
    }

    /// Run every constituent job and transition to `Running`.
    pub async fn run(&mut self, clock: &impl Clock) -> Result<(), SchedulerError> {
        self.state = TrialState::Running;
        self.started_at_ms = Some(clock.epoch_ms());
        tracing::info!(trial_id = %self.id, jobs = self.jobs.len(), "running trial");
        for job in &mut self.jobs {
            job.run(clock).await?;
        }
        Ok(())
    }

    /// Poll every constituent job, then derive the trial's own state:
    /// `Failed` if any job failed, `Completed` if every job is
    /// terminal-successful, `Running` otherwise.
    pub async fn poll(&mut self, clock: &impl Clock) -> Result<(), SchedulerError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        for job in &mut self.jobs {
            job.poll(clock).await?;
        }

        let any_failed = self.jobs.iter().any(|j| j.state() == JobState::Failed);
        let all_done = self
            .jobs
            .iter()
            .all(|j| matches!(j.state(), JobState::Completed | JobState::RunningNoMonitor));

        if any_failed {
            tracing::warn!(trial_id = %self.id, "trial failed");
            self.state = TrialState::Failed;
            self.ended_at_ms = Some(clock.epoch_ms());
        } else if all_done {
            tracing::info!(trial_id = %self.id, "trial completed");
            self.state = TrialState::Completed;
            self.ended_at_ms = Some(clock.epoch_ms());
            self.merge_results();
        }
        Ok(())
    }

    /// Cancel every constituent job and mark the trial cancelled.
    pub async fn cancel(&mut self, clock: &impl Clock) -> Result<(), SchedulerError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        for job in &mut self.jobs {
            job.cancel(clock).await?;
        }
        self.state = TrialState::Cancelled;
        self.ended_at_ms = Some(clock.epoch_ms());
        Ok(())
    }

    fn merge_results(&mut self) {
        for job in &self.jobs {
            for (key, value) in job.results() {
                self.results.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn results(&self) -> &BTreeMap<String, Value> {
        &self.results
    }
}

#[cfg(test)]
#[path = "trial_tests.rs"]
mod tests;
