use super::*;

#[test]
fn each_id_type_carries_its_own_prefix() {
    assert!(JobId::new().as_str().starts_with("job-"));
    assert!(TrialId::new().as_str().starts_with("trl-"));
    assert!(StepJobId::new().as_str().starts_with("sjb-"));
    assert!(WorkflowId::new().as_str().starts_with("wfl-"));
    assert!(WorkId::new().as_str().starts_with("wrk-"));
}

#[test]
fn ids_fit_the_inline_buffer() {
    assert!(JobId::new().as_str().len() <= crate::id::ID_MAX_LEN);
}

#[test]
fn ids_are_copy_and_usable_as_map_keys() {
    let mut seen = std::collections::BTreeMap::new();
    let id = TrialId::new();
    seen.insert(id, "first");
    assert_eq!(seen.get(&id), Some(&"first"));
}
