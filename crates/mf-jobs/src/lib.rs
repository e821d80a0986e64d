//! # mf-jobs
//!
//! Tasks and how they get run.
//!
//! - [`Task`] with a monotonic [`TaskStatus`] and a tagged [`Operation`]
//!   describing what to produce.
//! - [`ExecutionLayer`]: the submit / status / cancel seam. Callers only ever
//!   hold [`mf_core::TaskId`] handles.
//! - [`LocalExecutionLayer`]: an in-process layer that runs a [`TaskWorker`]
//!   per task on the tokio runtime with bounded concurrency.
//! - [`CompletionBarrier`]: polls a set of handles until they settle.

pub mod barrier;
pub mod layer;
pub mod local;
pub mod task;

pub use barrier::{BarrierState, CompletionBarrier, Outcome, TaskGroup, WaitMode, WaitOptions};
pub use layer::{ExecutionLayer, TaskWorker};
pub use local::LocalExecutionLayer;
pub use task::{Operation, PlacedMedia, Task, TaskDescriptor, TaskKind, TaskStatus};
