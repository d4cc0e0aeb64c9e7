//! Single-step function objective, driven synchronously end to end
//! through `TrialScheduler::run_optimization`.

use crate::prelude::*;

#[tokio::test]
async fn synchronous_run_reports_the_exact_objective_value_and_tracks_the_best() {
    let clock = FakeClock::new();
    let (optimizer, handle) = QueueOptimizer::new(
        "metric",
        vec![int_params(&[("x", 1)]), int_params(&[("x", 2)])],
    );
    let mut scheduler = TrialScheduler::new(optimizer, std::env::temp_dir());
    scheduler.synchronous = true;
    scheduler.attach_objective(Objective::Function { function_name: "noop".to_string(), runner: RunnerKind::WorkerPool });
    scheduler.register_function("noop", noop_function());
    scheduler.register_runner(RunnerKind::WorkerPool, Arc::new(ImmediateRunner::new(3.5)));

    scheduler.run_optimization(5, &clock).await.unwrap();

    let reports = handle.reports();
    assert_eq!(reports.len(), 2);
    for (_, metrics) in &reports {
        assert_eq!(metrics.get("metric").unwrap().value(), 3.5);
    }
    for idx in [0u64, 1] {
        assert_eq!(scheduler.trial(idx).unwrap().state, TrialState::Completed);
    }
    assert_eq!(handle.best_params(), Some(int_params(&[("x", 2)])));
}

#[tokio::test]
async fn run_optimization_stops_once_the_optimizer_has_no_more_suggestions() {
    let clock = FakeClock::new();
    let (optimizer, handle) = QueueOptimizer::new("metric", vec![int_params(&[("x", 1)])]);
    let mut scheduler = TrialScheduler::new(optimizer, std::env::temp_dir());
    scheduler.synchronous = true;
    scheduler.attach_objective(Objective::Function { function_name: "noop".to_string(), runner: RunnerKind::WorkerPool });
    scheduler.register_function("noop", noop_function());
    scheduler.register_runner(RunnerKind::WorkerPool, Arc::new(ImmediateRunner::new(1.0)));

    let best = scheduler.run_optimization(10, &clock).await.unwrap();

    assert_eq!(handle.reports().len(), 1);
    assert_eq!(best, Some(int_params(&[("x", 1)])));
}
