use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use ts_core::{FakeClock, JobId, JobKind, JobState};

/// In-memory stand-in for an iDDS/PanDA client: one workflow, work items
/// that finish after a configurable number of polls.
struct FakeClient {
    workflow_calls: AtomicUsize,
    polls_until_done: usize,
    fail: bool,
    poll_counts: Mutex<std::collections::HashMap<WorkId, usize>>,
}

impl FakeClient {
    fn new(polls_until_done: usize, fail: bool) -> Self {
        Self {
            workflow_calls: AtomicUsize::new(0),
            polls_until_done,
            fail,
            poll_counts: Mutex::new(std::collections::HashMap::new()),
        }
    }
}

#[async_trait]
impl DistributedClient for FakeClient {
    async fn create_workflow(&self, _def: &WorkflowDef) -> Result<WorkflowId, String> {
        self.workflow_calls.fetch_add(1, Ordering::SeqCst);
        Ok(WorkflowId::new())
    }

    async fn submit_work(&self, _workflow: &WorkflowId, _work: &WorkDef) -> Result<WorkId, String> {
        Ok(WorkId::new())
    }

    async fn poll_work(&self, work: &WorkId) -> Result<WorkStatus, String> {
        let mut counts = self.poll_counts.lock();
        let count = counts.entry(*work).or_insert(0);
        *count += 1;
        if *count < self.polls_until_done {
            Ok(WorkStatus::Running)
        } else if self.fail {
            Ok(WorkStatus::Failed)
        } else {
            Ok(WorkStatus::Finished)
        }
    }

    async fn fetch_result(&self, _work: &WorkId) -> Result<BTreeMap<String, Value>, String> {
        let mut results = BTreeMap::new();
        results.insert("objective".to_string(), serde_json::json!(42.0));
        Ok(results)
    }

    async fn cancel_work(&self, _work: &WorkId) -> Result<(), String> {
        Ok(())
    }
}

fn noop_job(clock: &FakeClock) -> Job {
    Job::new(JobId::new(), JobKind::Function(Arc::new(|_| Ok(BTreeMap::new()))), clock)
}

#[tokio::test]
async fn submit_then_poll_completes_once_finished() {
    let clock = FakeClock::new();
    let runner = DistributedRunner::with_clock(FakeClient::new(2, false), WorkflowDef::new("exp"), clock.clone());
    let mut job = noop_job(&clock);

    runner.submit(&mut job).await.unwrap();
    assert!(job.internal_id.is_some());

    runner.poll(&mut job).await.unwrap();
    assert_eq!(job.state, JobState::Created);

    runner.poll(&mut job).await.unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.results.get("objective"), Some(&serde_json::json!(42.0)));
}

#[tokio::test]
async fn poll_marks_failed_on_failed_status() {
    let clock = FakeClock::new();
    let runner = DistributedRunner::with_clock(FakeClient::new(1, true), WorkflowDef::new("exp"), clock.clone());
    let mut job = noop_job(&clock);

    runner.submit(&mut job).await.unwrap();
    runner.poll(&mut job).await.unwrap();

    assert_eq!(job.state, JobState::Failed);
}

#[tokio::test]
async fn workflow_is_created_exactly_once_across_concurrent_submits() {
    let clock = FakeClock::new();
    let client = FakeClient::new(1, false);
    let runner = Arc::new(DistributedRunner::with_clock(client, WorkflowDef::new("exp"), clock.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let runner = runner.clone();
        let mut job = noop_job(&clock);
        handles.push(tokio::spawn(async move {
            runner.submit(&mut job).await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(runner.client.workflow_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_removes_the_tracked_work_item() {
    let clock = FakeClock::new();
    let runner = DistributedRunner::with_clock(FakeClient::new(5, false), WorkflowDef::new("exp"), clock.clone());
    let mut job = noop_job(&clock);

    runner.submit(&mut job).await.unwrap();
    runner.cancel(&mut job).await.unwrap();
    assert!(!runner.works.lock().contains_key(&job.id));
}

#[tokio::test]
async fn return_results_false_marks_running_no_monitor_on_submit() {
    let clock = FakeClock::new();
    let runner = DistributedRunner::with_clock(FakeClient::new(1, false), WorkflowDef::new("exp"), clock.clone());
    let mut job = noop_job(&clock);
    job.return_results = false;

    runner.submit(&mut job).await.unwrap();
    assert_eq!(job.state, JobState::RunningNoMonitor);
}
