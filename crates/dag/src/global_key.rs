//! Canonical key identifying one fanned-out sub-job's global-parameter
//! assignment.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use ts_core::ParamValue;

/// Canonical, sortable identity for a combination of global-parameter
/// values (or the `"None"` sentinel for steps that aren't fanned out).
///
/// Grounded on `MultiStepsJob.get_key_from_dict`, which returns either
/// the literal string `"None"` or `tuple(sorted(key.items()))`.
#[derive(Debug, Clone)]
pub enum GlobalKey {
    None,
    Keyed(Vec<(String, ParamValue)>),
}

impl GlobalKey {
    pub fn none() -> Self {
        GlobalKey::None
    }

    pub fn from_params(params: &BTreeMap<String, ParamValue>) -> Self {
        if params.is_empty() {
            return GlobalKey::None;
        }
        GlobalKey::Keyed(params.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// The `"None"` sentinel, or the raw `k_v+k_v+...` join used before
    /// `+`/`-` sanitisation for dataset name expansion.
    pub fn raw_string(&self) -> String {
        match self {
            GlobalKey::None => "None".to_string(),
            GlobalKey::Keyed(pairs) => pairs
                .iter()
                .map(|(k, v)| format!("{k}_{v}"))
                .collect::<Vec<_>>()
                .join("+"),
        }
    }

    fn canonical(&self) -> Vec<(String, String)> {
        match self {
            GlobalKey::None => Vec::new(),
            GlobalKey::Keyed(pairs) => {
                let mut sorted: Vec<(String, String)> =
                    pairs.iter().map(|(k, v)| (k.clone(), v.to_string())).collect();
                sorted.sort_by(|a, b| a.0.cmp(&b.0));
                sorted
            }
        }
    }
}

impl PartialEq for GlobalKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for GlobalKey {}

impl PartialOrd for GlobalKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GlobalKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.canonical().cmp(&other.canonical())
    }
}

impl Hash for GlobalKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl std::fmt::Display for GlobalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw_string())
    }
}

/// Cartesian product of a step's global-parameter candidate values, one
/// `GlobalKey` per combination, iterated in lexicographic key order
/// (`BTreeMap` already sorts the parameter names; `product` walks them
/// in that order, matching `sorted(g_parameters.keys())` in the source).
pub fn cartesian_product(global_parameters: &BTreeMap<String, Vec<ParamValue>>) -> Vec<GlobalKey> {
    if global_parameters.is_empty() {
        return Vec::new();
    }
    let names: Vec<&String> = global_parameters.keys().collect();
    let mut combinations: Vec<BTreeMap<String, ParamValue>> = vec![BTreeMap::new()];
    for name in &names {
        let values = &global_parameters[*name];
        let mut next = Vec::with_capacity(combinations.len() * values.len());
        for combo in &combinations {
            for value in values {
                let mut extended = combo.clone();
                extended.insert((*name).clone(), value.clone());
                next.push(extended);
            }
        }
        combinations = next;
    }
    combinations.iter().map(GlobalKey::from_params).collect()
}

#[cfg(test)]
#[path = "global_key_tests.rs"]
mod tests;
