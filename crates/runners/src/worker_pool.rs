//! Local, in-process worker-pool runner.
//!
//! Grounded on `original_source/scheduler/runners/joblib_runner.py`
//! (`JobLibRunner`): function jobs run on a bounded pool, script/container
//! jobs spawn a child process with a `JOB_PARAMS_FILE` sidecar.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use ts_core::{Clock, Job, JobId, JobKind, ParamMap, Runner, RunnerError, SystemClock};

/// Which container engine a container job is spawned under.
///
/// Grounded on `JobLibRunner.container_engine` (`'docker'`/`'singularity'`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerEngine {
    Docker,
    Singularity,
}

impl ContainerEngine {
    fn program(self) -> &'static str {
        match self {
            ContainerEngine::Docker => "docker",
            ContainerEngine::Singularity => "singularity",
        }
    }
}

type TaskResult = Result<BTreeMap<String, Value>, String>;

/// Bounded-concurrency local runner: functions run via `spawn_blocking`,
/// scripts and containers run as child processes.
///
/// `n_workers` bounds concurrency via a semaphore (`JobLibRunner`'s
/// `ThreadPoolExecutor(max_workers=...)`). `C: Clock` lets tests drive
/// completion timestamps with a `FakeClock` instead of the system clock
/// the runner marks jobs with internally — `Runner::submit`/`poll` don't
/// take a clock argument, so each runner owns one.
pub struct WorkerPoolRunner<C: Clock = SystemClock> {
    semaphore: Arc<Semaphore>,
    handles: Mutex<std::collections::HashMap<JobId, JoinHandle<TaskResult>>>,
    container_engine: ContainerEngine,
    tmp_dir: PathBuf,
    clock: C,
}

impl WorkerPoolRunner<SystemClock> {
    pub fn new(n_workers: usize) -> Self {
        Self::with_clock(n_workers, SystemClock)
    }
}

impl<C: Clock> WorkerPoolRunner<C> {
    pub fn with_clock(n_workers: usize, clock: C) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(n_workers.max(1))),
            handles: Mutex::new(std::collections::HashMap::new()),
            container_engine: ContainerEngine::Docker,
            tmp_dir: std::env::temp_dir(),
            clock,
        }
    }

    ts_core::setters! {
        set {
            container_engine: ContainerEngine,
        }
    }

    pub fn tmp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = dir.into();
        self
    }

    fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.tmp_dir.join(format!("job_{}", job_id.as_str()))
    }
}

#[async_trait]
impl<C: Clock + 'static> Runner for WorkerPoolRunner<C> {
    async fn submit(&self, job: &mut Job) -> Result<(), RunnerError> {
        let permit = self.semaphore.clone().acquire_owned().await.map_err(|e| {
            RunnerError::Submit { job_id: job.id.to_string(), message: e.to_string() }
        })?;

        let handle: JoinHandle<TaskResult> = match &job.kind {
            JobKind::Function(func) => {
                let func = func.clone();
                let params = job.params.clone();
                tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    func(&params)
                })
            }
            JobKind::Script { script_path } => {
                let script_path = script_path.clone();
                let params = job.params.clone();
                let env = job.env.clone();
                let cwd = job.cwd.clone();
                let output_files = job.output_files.clone();
                let job_dir = self.job_dir(&job.id);
                tokio::spawn(async move {
                    let _permit = permit;
                    run_script(script_path, params, env, cwd, job_dir, output_files).await
                })
            }
            JobKind::Container { image, command } => {
                let image = image.clone();
                let command = command.clone();
                let params = job.params.clone();
                let env = job.env.clone();
                let cwd = job.cwd.clone();
                let output_files = job.output_files.clone();
                let job_dir = self.job_dir(&job.id);
                let engine = self.container_engine;
                tokio::spawn(async move {
                    let _permit = permit;
                    run_container(engine, image, command, params, env, cwd, job_dir, output_files)
                        .await
                })
            }
        };

        self.handles.lock().insert(job.id, handle);
        if !job.return_results {
            job.mark_running_no_monitor(&self.clock);
        }
        Ok(())
    }

    async fn poll(&self, job: &mut Job) -> Result<(), RunnerError> {
        if job.state.is_terminal() {
            return Ok(());
        }
        let finished = self.handles.lock().get(&job.id).map(|h| h.is_finished());
        if finished != Some(true) {
            return Ok(());
        }
        let handle = self.handles.lock().remove(&job.id);
        let Some(handle) = handle else {
            return Ok(());
        };
        match handle.await {
            Ok(Ok(results)) => job.mark_completed(results, &self.clock),
            Ok(Err(error)) => job.mark_failed(Some(error), &self.clock),
            Err(join_error) => {
                job.mark_failed(Some(format!("worker task panicked: {join_error}")), &self.clock)
            }
        }
        Ok(())
    }

    async fn cancel(&self, job: &mut Job) -> Result<(), RunnerError> {
        if let Some(handle) = self.handles.lock().remove(&job.id) {
            handle.abort();
        }
        Ok(())
    }
}

/// On a non-zero exit, prefer the job's own `error.json` (the §6 script/
/// container contract) over raw stderr, matching `SlurmRunner`'s
/// `error.json`-first poll order for the same failure shape.
async fn failure_message(job_dir: &Path, label: &str, code: Option<i32>, stderr: &[u8]) -> String {
    let error_file = job_dir.join("error.json");
    if let Ok(body) = tokio::fs::read(&error_file).await {
        if let Ok(parsed) = serde_json::from_slice::<Value>(&body) {
            if let Some(message) = parsed.get("error").and_then(Value::as_str) {
                return message.to_string();
            }
        }
    }
    format!(
        "{label} exited with code {}: {}",
        code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string()),
        String::from_utf8_lossy(stderr)
    )
}

fn collect_output_files(working_dir: &Path, output_files: &[String], results: &mut BTreeMap<String, Value>) {
    if output_files.is_empty() {
        return;
    }
    let mut collected = serde_json::Map::new();
    for file in output_files {
        let full_path = working_dir.join(file);
        let content = std::fs::read_to_string(&full_path)
            .unwrap_or_else(|e| format!("Error reading file: {e}"));
        collected.insert(file.clone(), Value::String(content));
    }
    results.insert("output_files".to_string(), Value::Object(collected));
}

async fn write_params_file(job_dir: &Path, params: &ParamMap) -> Result<PathBuf, String> {
    tokio::fs::create_dir_all(job_dir).await.map_err(|e| e.to_string())?;
    let params_file = job_dir.join("params.json");
    let body = serde_json::to_vec(params).map_err(|e| e.to_string())?;
    tokio::fs::write(&params_file, body).await.map_err(|e| e.to_string())?;
    Ok(params_file)
}

async fn run_script(
    script_path: PathBuf,
    params: ParamMap,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
    job_dir: PathBuf,
    output_files: Vec<String>,
) -> TaskResult {
    let params_file = write_params_file(&job_dir, &params).await?;
    let working_dir = cwd.unwrap_or_else(|| job_dir.clone());

    let mut cmd = if script_path.extension().and_then(|e| e.to_str()) == Some("sh") {
        let mut c = Command::new("bash");
        c.arg(&script_path);
        c
    } else {
        let mut c = Command::new("python3");
        c.arg(&script_path);
        c
    };
    cmd.env("JOB_PARAMS_FILE", &params_file)
        .envs(&env)
        .current_dir(&working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = cmd.output().await.map_err(|e| e.to_string())?;
    if output.status.success() {
        let result_file = job_dir.join("result.json");
        let mut results = if result_file.exists() {
            let body = tokio::fs::read(&result_file).await.map_err(|e| e.to_string())?;
            serde_json::from_slice(&body).map_err(|e| e.to_string())?
        } else {
            let mut m = BTreeMap::new();
            m.insert("stdout".to_string(), Value::String(String::from_utf8_lossy(&output.stdout).into_owned()));
            m
        };
        collect_output_files(&working_dir, &output_files, &mut results);
        Ok(results)
    } else {
        Err(failure_message(&job_dir, "Script", output.status.code(), &output.stderr).await)
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_container(
    engine: ContainerEngine,
    image: String,
    command: Vec<String>,
    params: ParamMap,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
    job_dir: PathBuf,
    output_files: Vec<String>,
) -> TaskResult {
    write_params_file(&job_dir, &params).await?;

    let mut cmd = Command::new(engine.program());
    match engine {
        ContainerEngine::Docker => {
            cmd.arg("run").arg("--rm");
            for (k, v) in &env {
                cmd.arg("-e").arg(format!("{k}={v}"));
            }
            cmd.arg("-v").arg(format!("{}:/job", job_dir.display()));
            if let Some(cwd) = &cwd {
                cmd.arg("-v").arg(format!("{}:/workdir", cwd.display())).arg("-w").arg("/workdir");
            } else {
                cmd.arg("-w").arg("/job");
            }
            cmd.arg(&image);
            cmd.args(&command);
        }
        ContainerEngine::Singularity => {
            cmd.arg("run");
            for (k, v) in &env {
                cmd.arg("--env").arg(format!("{k}={v}"));
            }
            cmd.arg("--bind").arg(format!("{}:/job", job_dir.display()));
            if let Some(cwd) = &cwd {
                cmd.arg("--bind").arg(format!("{}:/workdir", cwd.display())).arg("--pwd").arg("/workdir");
            } else {
                cmd.arg("--pwd").arg("/job");
            }
            cmd.arg(&image);
            cmd.args(&command);
        }
    }
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let output = cmd.output().await.map_err(|e| e.to_string())?;
    let working_dir = cwd.unwrap_or_else(|| job_dir.clone());
    if output.status.success() {
        let result_file = job_dir.join("result.json");
        let mut results = if result_file.exists() {
            let body = tokio::fs::read(&result_file).await.map_err(|e| e.to_string())?;
            serde_json::from_slice(&body).map_err(|e| e.to_string())?
        } else {
            let mut m = BTreeMap::new();
            m.insert("stdout".to_string(), Value::String(String::from_utf8_lossy(&output.stdout).into_owned()));
            m
        };
        collect_output_files(&working_dir, &output_files, &mut results);
        Ok(results)
    } else {
        Err(failure_message(&job_dir, "Container", output.status.code(), &output.stderr).await)
    }
}

#[cfg(test)]
#[path = "worker_pool_tests.rs"]
mod tests;
