//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

/// Proptest strategies for core value/state types.
pub mod strategies {
    use crate::job_state::{DepState, JobState, StepState, TrialState};
    use crate::params::MetricValue;
    use proptest::prelude::*;

    pub fn arb_metric_value() -> impl Strategy<Value = MetricValue> {
        prop_oneof![
            any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(MetricValue::Scalar),
            (any::<f64>().prop_filter("finite", |f| f.is_finite()), proptest::option::of(any::<f64>().prop_filter("finite", |f| f.is_finite())))
                .prop_map(|(value, sem)| MetricValue::WithSem { value, sem }),
        ]
    }

    pub fn arb_job_state() -> impl Strategy<Value = JobState> {
        prop_oneof![
            Just(JobState::Created),
            Just(JobState::Queued),
            Just(JobState::Running),
            Just(JobState::RunningNoMonitor),
            Just(JobState::Completed),
            Just(JobState::Failed),
            Just(JobState::Cancelled),
        ]
    }

    pub fn arb_step_state() -> impl Strategy<Value = StepState> {
        prop_oneof![
            Just(StepState::New),
            Just(StepState::Running),
            Just(StepState::RunningNoMonitor),
            Just(StepState::Completed),
            Just(StepState::Failed),
        ]
    }

    pub fn arb_dep_state() -> impl Strategy<Value = DepState> {
        prop_oneof![Just(DepState::New), Just(DepState::Ready)]
    }

    pub fn arb_trial_state() -> impl Strategy<Value = TrialState> {
        prop_oneof![
            Just(TrialState::Created),
            Just(TrialState::Running),
            Just(TrialState::Completed),
            Just(TrialState::Failed),
            Just(TrialState::Cancelled),
        ]
    }
}
