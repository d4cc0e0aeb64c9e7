//! Lifecycle state enums shared by `ts-scheduler` and `ts-dag`.

/// Leaf-job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum JobState {
    Created,
    Queued,
    Running,
    /// Submitted to a backend that does not report completion
    /// (`return_results = false`): the job is considered done as soon
    /// as submission succeeds.
    RunningNoMonitor,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::RunningNoMonitor
                | JobState::Completed
                | JobState::Failed
                | JobState::Cancelled
        )
    }
}

crate::simple_display! {
    JobState {
        Created => "created",
        Queued => "queued",
        Running => "running",
        RunningNoMonitor => "running_no_monitor",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Per-step rollup state inside a `MultiStepsJob`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StepState {
    New,
    Running,
    RunningNoMonitor,
    Completed,
    Failed,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepState::RunningNoMonitor | StepState::Completed | StepState::Failed
        )
    }
}

crate::simple_display! {
    StepState {
        New => "new",
        Running => "running",
        RunningNoMonitor => "running_no_monitor",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Dependency-edge readiness state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DepState {
    New,
    Ready,
}

crate::simple_display! {
    DepState {
        New => "new",
        Ready => "ready",
    }
}

/// Trial lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TrialState {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TrialState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TrialState::Completed | TrialState::Failed | TrialState::Cancelled
        )
    }
}

crate::simple_display! {
    TrialState {
        Created => "created",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

#[cfg(test)]
#[path = "job_state_tests.rs"]
mod tests;
