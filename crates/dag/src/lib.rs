#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ts-dag: the `MultiStepsFunction` template — step specs, dependency
//! edges, global-parameter fan-out, and dataset-name placeholder
//! expansion that `ts-scheduler::multi_steps` executes.

pub mod dataset_name;
pub mod global_key;
pub mod step;
pub mod template;

pub use dataset_name::expand_dataset_name;
pub use global_key::{cartesian_product, GlobalKey};
pub use step::{DepMap, DepSpec, DepType, PayloadKind, RunnerKind, StepName, StepSpec};
pub use template::{MultiStepsFunction, MultiStepsFunctionBuilder};
