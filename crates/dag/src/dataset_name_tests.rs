use super::*;
use crate::global_key::GlobalKey;
use std::collections::BTreeMap;
use ts_core::ParamValue;

#[test]
fn none_sentinel_expands_literally() {
    let out = expand_dataset_name(
        "ds.#global_parameter_key.#trial_id.#job_id",
        &GlobalKey::none(),
        "trl-1",
        "job-1",
    );
    assert_eq!(out, "ds.None.trl-1.job-1");
}

#[test]
fn keyed_global_parameter_sanitises_plus_and_minus() {
    let mut params = BTreeMap::new();
    params.insert("lr".to_string(), ParamValue::Number(-0.5));
    let key = GlobalKey::from_params(&params);

    let out = expand_dataset_name("ds.#global_parameter_key", &key, "trl-1", "job-1");
    assert_eq!(out, "ds.lr_minus0.5");
}

#[test]
fn multiple_global_parameters_join_with_plus_then_sanitise() {
    let mut params = BTreeMap::new();
    params.insert("a".to_string(), ParamValue::Str("x".into()));
    params.insert("b".to_string(), ParamValue::Integer(1));
    let key = GlobalKey::from_params(&params);

    let out = expand_dataset_name("#global_parameter_key", &key, "t", "j");
    assert_eq!(out, "a_xplusb_1");
}

#[test]
fn placeholders_not_present_are_left_untouched() {
    let out = expand_dataset_name("fixed_name", &GlobalKey::none(), "t", "j");
    assert_eq!(out, "fixed_name");
}
