//! `MultiStepsFunction`: the declarative template a `MultiStepsJob` is
//! built from.

use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::IndexMap;
use ts_core::{CoreError, ParamValue};

use crate::step::{DepSpec, DepType, StepName, StepSpec};

/// A reusable specification of a multi-step job: its steps, the
/// dependency edges between them, and the global parameters that fan
/// selected steps out into one sub-job per parameter combination.
///
/// Grounded on `MultiStepsFunction` in `multi_steps_job.py`; `steps` is
/// an `IndexMap` (rather than the Python dict, which is
/// insertion-ordered too) so declaration order survives for the
/// ready-step tie-break rule.
#[derive(Debug, Clone)]
pub struct MultiStepsFunction {
    pub steps: IndexMap<StepName, StepSpec>,
    pub deps: HashMap<StepName, DepSpec>,
    pub final_step: Option<StepName>,
    pub global_parameters: BTreeMap<String, Vec<ParamValue>>,
    pub global_parameters_steps: HashSet<StepName>,
}

impl MultiStepsFunction {
    pub fn builder() -> MultiStepsFunctionBuilder {
        MultiStepsFunctionBuilder::default()
    }

    /// Derived display name, e.g. `"mul_func.preprocess_train_evaluate"`,
    /// used in log messages the way the teacher's domain types expose a
    /// human-readable name for tracing.
    pub fn name(&self) -> String {
        format!("mul_func.{}", self.steps.keys().cloned().collect::<Vec<_>>().join("_"))
    }

    /// The step whose results become the job's own results: `final_step`
    /// if set, otherwise the last declared step.
    pub fn final_step(&self) -> Option<&StepName> {
        self.final_step.as_ref().or_else(|| self.steps.keys().last())
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.steps.is_empty() {
            return Err(CoreError::EmptyFunction);
        }

        for (name, dep) in &self.deps {
            if !self.steps.contains_key(&dep.parent) {
                return Err(CoreError::UnknownDependency {
                    step: name.clone(),
                    dep: dep.parent.clone(),
                });
            }
            if &dep.parent == name {
                return Err(CoreError::SelfDependency { step: name.clone() });
            }
            if dep.dep_type == DepType::Results {
                if let Some(parent_spec) = self.steps.get(&dep.parent) {
                    if !parent_spec.return_results {
                        return Err(CoreError::RunningNoMonitorResultsDependency {
                            step: dep.parent.clone(),
                        });
                    }
                }
            }
        }

        for (name, values) in &self.global_parameters {
            if values.is_empty() {
                return Err(CoreError::EmptyGlobalParameter { name: name.clone() });
            }
        }

        Ok(())
    }
}

/// Builder for [`MultiStepsFunction`], validating on [`build`](Self::build).
#[derive(Default)]
pub struct MultiStepsFunctionBuilder {
    steps: IndexMap<StepName, StepSpec>,
    deps: HashMap<StepName, DepSpec>,
    final_step: Option<StepName>,
    global_parameters: BTreeMap<String, Vec<ParamValue>>,
    global_parameters_steps: HashSet<StepName>,
}

impl MultiStepsFunctionBuilder {
    pub fn step(mut self, name: impl Into<StepName>, spec: StepSpec) -> Self {
        self.steps.insert(name.into(), spec);
        self
    }

    pub fn dep(mut self, name: impl Into<StepName>, dep: DepSpec) -> Self {
        self.deps.insert(name.into(), dep);
        self
    }

    pub fn final_step(mut self, name: impl Into<StepName>) -> Self {
        self.final_step = Some(name.into());
        self
    }

    pub fn global_parameter(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.global_parameters.insert(name.into(), values);
        self
    }

    pub fn global_parameter_step(mut self, name: impl Into<StepName>) -> Self {
        self.global_parameters_steps.insert(name.into());
        self
    }

    pub fn build(self) -> Result<MultiStepsFunction, CoreError> {
        let func = MultiStepsFunction {
            steps: self.steps,
            deps: self.deps,
            final_step: self.final_step,
            global_parameters: self.global_parameters,
            global_parameters_steps: self.global_parameters_steps,
        };
        func.validate()?;
        tracing::info!(
            name = %func.name(),
            steps = func.steps.len(),
            deps = func.deps.len(),
            "built MultiStepsFunction"
        );
        Ok(func)
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
