//! A failing sub-job anywhere in a `MultiStepsJob` DAG fails the whole
//! job (and trial) without ever reporting a result to the optimizer.

use crate::prelude::*;

fn function_step(name: &str) -> StepSpec {
    StepSpec::new(PayloadKind::Function { function_name: name.to_string() }, RunnerKind::WorkerPool)
}

#[tokio::test]
async fn a_failed_step_fails_the_trial_and_is_never_reported() {
    let clock = FakeClock::new();
    let (optimizer, handle) = QueueOptimizer::new("metric", vec![ParamMap::new()]);
    let mut scheduler = TrialScheduler::new(optimizer, std::env::temp_dir());
    scheduler.synchronous = true;
    scheduler.monitoring_interval = std::time::Duration::from_millis(1);

    let function = Arc::new(
        MultiStepsFunction::builder()
            .step("prepare", function_step("noop"))
            .step("train", function_step("noop"))
            .dep("train", DepSpec::one_to_one("prepare"))
            .final_step("train")
            .build()
            .unwrap(),
    );

    scheduler.attach_objective(Objective::MultiSteps(function));
    scheduler.register_function("noop", noop_function());
    scheduler.register_runner(
        RunnerKind::WorkerPool,
        Arc::new(FailingRunner { message: "prepare step blew up".to_string() }),
    );

    scheduler.run_optimization(1, &clock).await.unwrap();

    assert!(handle.reports().is_empty());
    assert_eq!(scheduler.trial(0).unwrap().state, TrialState::Failed);
}

#[tokio::test]
async fn a_single_step_job_failure_is_never_reported() {
    let clock = FakeClock::new();
    let (optimizer, handle) = QueueOptimizer::new("metric", vec![ParamMap::new(), ParamMap::new()]);
    let mut scheduler = TrialScheduler::new(optimizer, std::env::temp_dir());
    scheduler.synchronous = true;

    scheduler.attach_objective(Objective::Function { function_name: "noop".to_string(), runner: RunnerKind::WorkerPool });
    scheduler.register_function("noop", noop_function());
    scheduler.register_runner(RunnerKind::WorkerPool, Arc::new(FailingRunner { message: "boom".to_string() }));

    scheduler.run_optimization(2, &clock).await.unwrap();

    assert!(handle.reports().is_empty());
    for idx in [0u64, 1] {
        assert_eq!(scheduler.trial(idx).unwrap().state, TrialState::Failed);
    }
}
