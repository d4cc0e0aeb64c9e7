//! The seam between `TrialScheduler` and whatever black-box optimizer
//! is suggesting trials — grounded on the `AxClient` surface
//! `ax_scheduler.py::AxScheduler` drives (`get_next_trial`,
//! `attach_trial`, `complete_trial`, `get_best_parameters`), abstracted
//! behind a trait so the scheduler doesn't depend on a particular
//! optimization library.

use std::collections::BTreeMap;

use ts_core::{MetricValue, ParamMap};

/// Index of a trial inside the optimizer's own bookkeeping, matching
/// the role of Ax's integer trial index.
pub type TrialIndex = u64;

/// A black-box optimizer: suggests parameter combinations, accepts
/// externally-attached trials (for batch evaluation), and is told the
/// outcome of each.
///
/// Grounded on `AxScheduler.get_next_trial`/`_create_trial_from_ax`
/// (→ [`Optimizer::next_suggestion`]), `_TrialBatch.add_trial`
/// (→ [`Optimizer::attach_trial`]), `complete_trial`
/// (→ [`Optimizer::report_result`]), and `get_best_parameters`
/// (→ [`Optimizer::best_so_far`]).
pub trait Optimizer: Send {
    /// Ask the optimizer for the next parameter combination to try.
    /// Returns `None` once the optimizer has no further suggestions
    /// (e.g. a generation strategy has been exhausted).
    fn next_suggestion(&mut self) -> Option<(ParamMap, TrialIndex)>;

    /// Register a trial the caller is constructing directly (used by
    /// `batch_trial_context`, where several trials are attached before
    /// any of them runs) and return its index.
    fn attach_trial(&mut self, params: ParamMap) -> TrialIndex;

    /// Report a completed trial's metrics back to the optimizer.
    fn report_result(&mut self, trial_index: TrialIndex, metrics: BTreeMap<String, MetricValue>);

    /// The best parameter combination observed so far, if any trial
    /// has completed.
    fn best_so_far(&self) -> Option<ParamMap>;
}
