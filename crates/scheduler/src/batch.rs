//! `BatchTrialContext`: run several trials as one batch, completing
//! them only once every trial in the batch has finished.
//!
//! Grounded on `original_source/scheduler/ax_scheduler.py`
//! (`AxScheduler.batch_trial_context`, `_TrialBatch`): trials are
//! attached up front via `add_trial`, then `run` launches every one of
//! them, polls the whole batch until each reaches a terminal state,
//! and finally completes them in the order they were added —
//! ascending trial index for trials attached in sequence, per
//! `_TrialBatch.trial_indices`.

use ts_core::{Clock, ParamMap, TrialState};

use crate::error::SchedulerError;
use crate::optimizer::{Optimizer, TrialIndex};
use crate::scheduler::TrialScheduler;

/// Borrows a [`TrialScheduler`] for the duration of one batch of
/// trials. Built via [`TrialScheduler::batch_trial_context`]; consumed
/// by [`BatchTrialContext::run_all`], which performs the `finally`-block
/// run/monitor/complete sequence the Python context manager performs
/// on exit.
pub struct BatchTrialContext<'a, O: Optimizer> {
    scheduler: &'a mut TrialScheduler<O>,
    trial_indices: Vec<TrialIndex>,
}

impl<'a, O: Optimizer> BatchTrialContext<'a, O> {
    pub(crate) fn new(scheduler: &'a mut TrialScheduler<O>) -> Self {
        Self { scheduler, trial_indices: Vec::new() }
    }

    /// Attach one parameter combination's trial to the batch. The
    /// trial is built immediately (so misconfiguration surfaces right
    /// away) but not run until [`BatchTrialContext::run_all`].
    pub fn add_trial(&mut self, params: ParamMap, clock: &impl Clock) -> Result<TrialIndex, SchedulerError> {
        let idx = self.scheduler.optimizer.attach_trial(params.clone());
        let trial = self.scheduler.build_trial(params, clock)?;
        self.scheduler.trials.insert(idx, trial);
        self.trial_indices.push(idx);
        Ok(idx)
    }

    /// Run every trial in the batch, poll the batch until every trial
    /// in it is terminal, then complete each one in the order it was
    /// added to the batch.
    pub async fn run_all(self, clock: &impl Clock) -> Result<(), SchedulerError> {
        for &idx in &self.trial_indices {
            self.scheduler.run_trial(idx, clock).await?;
        }

        loop {
            let all_terminal = self
                .trial_indices
                .iter()
                .all(|idx| self.scheduler.trials.get(idx).map(|t| t.state.is_terminal()).unwrap_or(true));
            if all_terminal {
                break;
            }
            for &idx in &self.trial_indices {
                if let Some(trial) = self.scheduler.trials.get_mut(&idx) {
                    if !trial.state.is_terminal() {
                        trial.poll(clock).await?;
                    }
                }
            }
            tokio::time::sleep(self.scheduler.monitoring_interval).await;
        }

        for idx in &self.trial_indices {
            let failed = matches!(self.scheduler.trials.get(idx).map(|t| t.state), Some(TrialState::Failed));
            if !failed {
                self.scheduler.complete_trial(*idx, None)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
