use super::*;
use crate::step::{DepSpec, PayloadKind, RunnerKind, StepSpec};

fn function_step() -> StepSpec {
    StepSpec::new(
        PayloadKind::Function { function_name: "noop".into() },
        RunnerKind::WorkerPool,
    )
}

#[test]
fn empty_function_is_rejected() {
    let err = MultiStepsFunction::builder().build().unwrap_err();
    assert_eq!(err, CoreError::EmptyFunction);
}

#[test]
fn unknown_dependency_parent_is_rejected() {
    let err = MultiStepsFunction::builder()
        .step("train", function_step())
        .dep("train", DepSpec::one_to_one("preprocess"))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::UnknownDependency {
            step: "train".into(),
            dep: "preprocess".into(),
        }
    );
}

#[test]
fn self_dependency_is_rejected() {
    let err = MultiStepsFunction::builder()
        .step("train", function_step())
        .dep("train", DepSpec::one_to_one("train"))
        .build()
        .unwrap_err();
    assert_eq!(err, CoreError::SelfDependency { step: "train".into() });
}

#[test]
fn results_dependency_on_a_no_monitor_parent_is_rejected() {
    let mut no_monitor_parent = function_step();
    no_monitor_parent.return_results = false;

    let err = MultiStepsFunction::builder()
        .step("submit", no_monitor_parent)
        .step("train", function_step())
        .dep("train", DepSpec::one_to_one("submit"))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::RunningNoMonitorResultsDependency { step: "submit".into() }
    );
}

#[test]
fn datasets_dependency_on_a_no_monitor_parent_is_allowed() {
    let mut no_monitor_parent = function_step();
    no_monitor_parent.return_results = false;

    let func = MultiStepsFunction::builder()
        .step("submit", no_monitor_parent)
        .step("train", function_step())
        .dep("train", DepSpec::datasets("submit"))
        .build()
        .unwrap();
    assert_eq!(func.steps.len(), 2);
}

#[test]
fn empty_global_parameter_values_are_rejected() {
    let err = MultiStepsFunction::builder()
        .step("train", function_step())
        .global_parameter("lr", vec![])
        .build()
        .unwrap_err();
    assert_eq!(err, CoreError::EmptyGlobalParameter { name: "lr".into() });
}

#[test]
fn final_step_defaults_to_last_declared_step() {
    let func = MultiStepsFunction::builder()
        .step("preprocess", function_step())
        .step("train", function_step())
        .build()
        .unwrap();
    assert_eq!(func.final_step(), Some(&"train".to_string()));
}

#[test]
fn explicit_final_step_overrides_the_default() {
    let func = MultiStepsFunction::builder()
        .step("preprocess", function_step())
        .step("train", function_step())
        .final_step("preprocess")
        .build()
        .unwrap();
    assert_eq!(func.final_step(), Some(&"preprocess".to_string()));
}

#[test]
fn name_joins_step_names_in_declaration_order() {
    let func = MultiStepsFunction::builder()
        .step("preprocess", function_step())
        .step("train", function_step())
        .build()
        .unwrap();
    assert_eq!(func.name(), "mul_func.preprocess_train");
}
