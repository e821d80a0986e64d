//! Execution layer and worker seams.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mf_core::{MediaReference, Result, TaskId};

use crate::task::{Task, TaskDescriptor};

/// Runs tasks somewhere and reports on them by handle.
///
/// `submit` returns as soon as the task is enqueued. Statuses only move
/// forward; once a task is terminal it stays that way.
#[async_trait]
pub trait ExecutionLayer: Send + Sync {
    async fn submit(&self, descriptor: TaskDescriptor) -> Result<TaskId>;

    /// Snapshot of the task. Unknown handles are [`mf_core::Error::NotFound`].
    async fn status(&self, id: TaskId) -> Result<Task>;

    /// Cancel a task. A no-op for tasks that already settled.
    async fn cancel(&self, id: TaskId) -> Result<()>;
}

/// Does the actual media work for one task.
#[async_trait]
pub trait TaskWorker: Send + Sync {
    /// Produce the outputs of `task`. Long-running work should stop early
    /// once `cancel` fires.
    async fn run(&self, task: &Task, cancel: CancellationToken) -> Result<Vec<MediaReference>>;
}
