//! The `Runner` trait: the seam between a [`crate::job::Job`] and the
//! backend that actually executes it.
//!
//! Lives in `ts-core` (rather than `ts-runners`, which only provides
//! implementations) so that `Job` can hold an `Arc<dyn Runner>` without
//! the crate graph becoming circular — see `DESIGN.md`.

use async_trait::async_trait;

use crate::error::RunnerError;
use crate::job::Job;

/// Submits, polls, and cancels jobs on some execution backend.
///
/// Mirrors `BaseRunner`'s three-method contract from the original
/// scheduler (`run_job`/`check_job_status`/`cancel_job`), renamed to the
/// verbs the rest of this workspace uses.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Submit `job` for execution. Implementations transition
    /// `job.state` to `Running` or `RunningNoMonitor` on success, or
    /// call `job.mark_failed` on a synchronous submission failure.
    async fn submit(&self, job: &mut Job) -> Result<(), RunnerError>;

    /// Check on a previously submitted job, updating its state in
    /// place. A no-op for jobs that are already terminal.
    async fn poll(&self, job: &mut Job) -> Result<(), RunnerError>;

    /// Cancel a previously submitted job.
    async fn cancel(&self, job: &mut Job) -> Result<(), RunnerError>;
}
