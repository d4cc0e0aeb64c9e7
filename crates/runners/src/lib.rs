#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ts-runners: the three concrete `Runner` backends — a local worker
//! pool, an HPC batch adapter (Slurm-style), and a distributed-async
//! adapter (iDDS/PanDA-style) — behind the `ts_core::Runner` trait.

pub mod distributed;
pub mod hpc_batch;
pub mod worker_pool;

pub use distributed::{
    DistributedClient, DistributedRunner, WorkDef, WorkStatus, WorkflowDef,
};
pub use hpc_batch::HpcBatchRunner;
pub use worker_pool::{ContainerEngine, WorkerPoolRunner};
