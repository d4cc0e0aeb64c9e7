//! Script objective: a shell script invoked with `JOB_PARAMS_FILE` set,
//! writing `result.json` on success or `error.json` plus a non-zero
//! exit on failure (spec §6 script interface, scenario S5).

use crate::prelude::*;
use ts_runners::WorkerPoolRunner;

fn write_script(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[tokio::test]
async fn a_script_that_writes_result_json_reports_its_contents() {
    let scripts_dir = tempfile::tempdir().unwrap();
    let script_path = write_script(
        scripts_dir.path(),
        "succeed.sh",
        "#!/bin/bash\nset -e\ndir=$(dirname \"$JOB_PARAMS_FILE\")\necho '{\"objective\": 0.5}' > \"$dir/result.json\"\n",
    );

    let clock = FakeClock::new();
    let (optimizer, handle) = QueueOptimizer::new("objective", vec![ParamMap::new()]);
    let mut scheduler = TrialScheduler::new(optimizer, std::env::temp_dir());
    scheduler.synchronous = true;
    scheduler.monitoring_interval = std::time::Duration::from_millis(5);

    scheduler.attach_objective(Objective::Script { script_path, runner: RunnerKind::WorkerPool });
    scheduler.register_runner(
        RunnerKind::WorkerPool,
        Arc::new(WorkerPoolRunner::new(2).tmp_dir(scripts_dir.path().join("jobs"))),
    );

    scheduler.run_optimization(1, &clock).await.unwrap();

    let reports = handle.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].1.get("objective").unwrap().value(), 0.5);
    assert_eq!(scheduler.trial(0).unwrap().state, TrialState::Completed);
}

#[tokio::test]
async fn a_script_that_exits_non_zero_with_error_json_fails_with_its_message() {
    let scripts_dir = tempfile::tempdir().unwrap();
    let script_path = write_script(
        scripts_dir.path(),
        "fail.sh",
        "#!/bin/bash\ndir=$(dirname \"$JOB_PARAMS_FILE\")\necho '{\"error\": \"oom\"}' > \"$dir/error.json\"\nexit 1\n",
    );

    let clock = FakeClock::new();
    let (optimizer, handle) = QueueOptimizer::new("objective", vec![ParamMap::new()]);
    let mut scheduler = TrialScheduler::new(optimizer, std::env::temp_dir());
    scheduler.synchronous = true;
    scheduler.monitoring_interval = std::time::Duration::from_millis(5);

    scheduler.attach_objective(Objective::Script { script_path, runner: RunnerKind::WorkerPool });
    scheduler.register_runner(
        RunnerKind::WorkerPool,
        Arc::new(WorkerPoolRunner::new(2).tmp_dir(scripts_dir.path().join("jobs"))),
    );

    scheduler.run_optimization(1, &clock).await.unwrap();

    assert!(handle.reports().is_empty());
    let trial = scheduler.trial(0).unwrap();
    assert_eq!(trial.state, TrialState::Failed);
    assert_eq!(trial.results().get("error"), Some(&Value::String("oom".to_string())));
}
