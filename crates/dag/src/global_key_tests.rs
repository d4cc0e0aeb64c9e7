use super::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn params(pairs: &[(&str, ParamValue)]) -> BTreeMap<String, ParamValue> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn empty_params_yields_none_sentinel() {
    let key = GlobalKey::from_params(&BTreeMap::new());
    assert_eq!(key, GlobalKey::None);
    assert_eq!(key.raw_string(), "None");
}

#[test]
fn keyed_raw_string_matches_join_convention() {
    let key = GlobalKey::from_params(&params(&[
        ("param1", ParamValue::Str("a".into())),
        ("param2", ParamValue::Integer(1)),
    ]));
    assert_eq!(key.raw_string(), "param1_a+param2_1");
}

#[test]
fn equality_ignores_insertion_order() {
    let a = GlobalKey::from_params(&params(&[
        ("b", ParamValue::Integer(2)),
        ("a", ParamValue::Integer(1)),
    ]));
    let b = GlobalKey::from_params(&params(&[
        ("a", ParamValue::Integer(1)),
        ("b", ParamValue::Integer(2)),
    ]));
    assert_eq!(a, b);
}

#[test]
fn cartesian_product_covers_every_combination_in_sorted_key_order() {
    let mut global = BTreeMap::new();
    global.insert(
        "param1".to_string(),
        vec![ParamValue::Str("a".into()), ParamValue::Str("b".into())],
    );
    global.insert(
        "param2".to_string(),
        vec![ParamValue::Integer(1), ParamValue::Integer(2)],
    );

    let keys = cartesian_product(&global);
    assert_eq!(keys.len(), 4);

    let raw: Vec<String> = keys.iter().map(GlobalKey::raw_string).collect();
    assert!(raw.contains(&"param1_a+param2_1".to_string()));
    assert!(raw.contains(&"param1_a+param2_2".to_string()));
    assert!(raw.contains(&"param1_b+param2_1".to_string()));
    assert!(raw.contains(&"param1_b+param2_2".to_string()));
}

#[test]
fn cartesian_product_of_empty_map_is_empty() {
    assert!(cartesian_product(&BTreeMap::new()).is_empty());
}

#[test]
fn global_keys_are_usable_as_btreemap_keys() {
    let mut map = std::collections::BTreeMap::new();
    map.insert(GlobalKey::none(), "job-a");
    assert_eq!(map.get(&GlobalKey::none()), Some(&"job-a"));
}

proptest! {
    /// Spec §8: `|step_jobs[s]| = |G|` where `G` is the cartesian product
    /// of the step's global parameters, so `|G|` itself must equal the
    /// product of each parameter's candidate-value count.
    #[test]
    fn cartesian_product_size_is_product_of_value_counts(
        counts in prop::collection::vec(1usize..4, 1..4),
    ) {
        let mut global = BTreeMap::new();
        for (i, count) in counts.iter().enumerate() {
            let values = (0..*count).map(|v| ParamValue::Integer(v as i64)).collect();
            global.insert(format!("param{i}"), values);
        }
        let expected: usize = counts.iter().product();
        prop_assert_eq!(cartesian_product(&global).len(), expected);
    }

    /// Spec §8: "repeated initialisation yields the same ordering".
    #[test]
    fn cartesian_product_is_deterministic_across_repeated_calls(
        counts in prop::collection::vec(1usize..3, 1..3),
    ) {
        let mut global = BTreeMap::new();
        for (i, count) in counts.iter().enumerate() {
            let values = (0..*count).map(|v| ParamValue::Integer(v as i64)).collect();
            global.insert(format!("param{i}"), values);
        }
        let first: Vec<String> = cartesian_product(&global).iter().map(GlobalKey::raw_string).collect();
        let second: Vec<String> = cartesian_product(&global).iter().map(GlobalKey::raw_string).collect();
        prop_assert_eq!(first, second);
    }
}
