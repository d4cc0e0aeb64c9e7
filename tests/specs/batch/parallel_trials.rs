//! `BatchTrialContext`: several caller-supplied parameter mappings
//! attached and run together, completed only once every trial in the
//! batch is terminal (spec §4.5 batch context, scenario S6).

use crate::prelude::*;

#[tokio::test]
async fn a_batch_of_trials_is_launched_together_and_completed_in_index_order() {
    let clock = FakeClock::new();
    let (optimizer, handle) = QueueOptimizer::new("metric", Vec::new());
    let mut scheduler = TrialScheduler::new(optimizer, std::env::temp_dir());
    scheduler.monitoring_interval = std::time::Duration::from_millis(1);
    scheduler.attach_objective(Objective::Function { function_name: "noop".to_string(), runner: RunnerKind::WorkerPool });
    scheduler.register_function("noop", noop_function());
    scheduler.register_runner(RunnerKind::WorkerPool, Arc::new(ImmediateRunner::new(4.0)));

    let mut batch = scheduler.batch_trial_context();
    let idx_a = batch.add_trial(int_params(&[("x", 1)]), &clock).unwrap();
    let idx_b = batch.add_trial(int_params(&[("x", 2)]), &clock).unwrap();
    let idx_c = batch.add_trial(int_params(&[("x", 3)]), &clock).unwrap();
    batch.run_all(&clock).await.unwrap();

    assert_eq!((idx_a, idx_b, idx_c), (0, 1, 2));
    let reports = handle.reports();
    let reported_indices: Vec<TrialIndex> = reports.iter().map(|(idx, _)| *idx).collect();
    assert_eq!(reported_indices, vec![0, 1, 2]);
    for (_, metrics) in &reports {
        assert_eq!(metrics.get("metric").unwrap().value(), 4.0);
    }
    for idx in [idx_a, idx_b, idx_c] {
        assert_eq!(scheduler.trial(idx).unwrap().state, TrialState::Completed);
    }
}

#[tokio::test]
async fn a_failed_trial_in_the_batch_is_skipped_but_others_still_complete() {
    let clock = FakeClock::new();
    let (optimizer, handle) = QueueOptimizer::new("metric", Vec::new());
    let mut scheduler = TrialScheduler::new(optimizer, std::env::temp_dir());
    scheduler.monitoring_interval = std::time::Duration::from_millis(1);
    scheduler.attach_objective(Objective::Function { function_name: "noop".to_string(), runner: RunnerKind::WorkerPool });
    scheduler.register_function("noop", noop_function());
    scheduler.register_runner(RunnerKind::WorkerPool, Arc::new(FailingRunner { message: "bad input".to_string() }));

    let mut batch = scheduler.batch_trial_context();
    let idx = batch.add_trial(int_params(&[("x", 1)]), &clock).unwrap();
    batch.run_all(&clock).await.unwrap();

    assert!(handle.reports().is_empty());
    assert_eq!(scheduler.trial(idx).unwrap().state, TrialState::Failed);
}
