//! Placeholder substitution for dataset name / input-dataset templates.
//!
//! Grounded on `MultiStepsJob._initialize`'s `output_dataset`/
//! `input_datasets` expansion: `#global_parameter_key`, `#trial_id`, and
//! `#job_id` are replaced, then `+`/`-` in the serialised global-key
//! string are sanitised to `plus`/`minus` (dataset names commonly flow
//! into systems, e.g. Rucio, that reserve those characters).

use crate::global_key::GlobalKey;

fn sanitize_global_key_str(raw: &str) -> String {
    raw.replace('+', "plus").replace('-', "minus")
}

/// Expand `#global_parameter_key`, `#trial_id`, and `#job_id` in `template`.
pub fn expand_dataset_name(template: &str, global_key: &GlobalKey, trial_id: &str, job_id: &str) -> String {
    let key_str = sanitize_global_key_str(&global_key.raw_string());
    template
        .replace("#global_parameter_key", &key_str)
        .replace("#trial_id", trial_id)
        .replace("#job_id", job_id)
}

#[cfg(test)]
#[path = "dataset_name_tests.rs"]
mod tests;
