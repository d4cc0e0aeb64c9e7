//! Typed ids for the workspace's domain objects.

crate::define_id! {
    /// Identifies a single leaf job (a [`Function`]/[`Script`]/[`Container`]
    /// payload run by a [`Runner`]).
    pub struct JobId("job-");
}

crate::define_id! {
    /// Identifies one optimizer-suggested trial.
    pub struct TrialId("trl-");
}

crate::define_id! {
    /// Identifies a single fanned-out sub-job of a `MultiStepsJob` step.
    pub struct StepJobId("sjb-");
}

crate::define_id! {
    /// Identifies a distributed-backend workflow handle.
    pub struct WorkflowId("wfl-");
}

crate::define_id! {
    /// Identifies a single unit of work registered against a `WorkflowId`.
    pub struct WorkId("wrk-");
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
