//! A trial that never completes is left non-terminal once
//! `max_trial_monitoring_time` elapses, and is never reported.

use crate::prelude::*;

#[tokio::test]
async fn a_stuck_trial_times_out_without_completing_or_being_reported() {
    // `wait_for_trial_completion` measures elapsed time against the clock
    // it's given while actually sleeping in real time between polls
    // (`tokio::time::sleep`), so the clock driving the timeout check must
    // advance with the wall clock too — a `FakeClock` never advances on
    // its own and would make this test hang forever instead of timing out.
    let clock = SystemClock;
    let (optimizer, handle) = QueueOptimizer::new("metric", vec![ParamMap::new()]);
    let mut scheduler = TrialScheduler::new(optimizer, std::env::temp_dir());
    scheduler.synchronous = true;
    scheduler.monitoring_interval = std::time::Duration::from_millis(1);
    scheduler.max_trial_monitoring_time = std::time::Duration::from_millis(5);

    scheduler.attach_objective(Objective::Function { function_name: "noop".to_string(), runner: RunnerKind::WorkerPool });
    scheduler.register_function("noop", noop_function());
    scheduler.register_runner(RunnerKind::WorkerPool, Arc::new(StuckRunner));

    scheduler.run_optimization(1, &clock).await.unwrap();

    assert!(handle.reports().is_empty());
    let trial = scheduler.trial(0).unwrap();
    assert!(!trial.state.is_terminal());
    assert_ne!(trial.state, TrialState::Completed);
    assert_ne!(trial.state, TrialState::Failed);
}
