//! In-process execution layer.
//!
//! Every submitted task gets its own tokio task, gated by a semaphore so at
//! most `max_concurrent` workers run at once. Status changes go through
//! [`Task`]'s transition methods under the table lock, so a worker that
//! finishes after its task was canceled cannot overwrite the cancel.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use mf_core::events::{EventBus, EventPayload};
use mf_core::{Error, MediaReference, Result, TaskId};

use crate::layer::{ExecutionLayer, TaskWorker};
use crate::task::{Task, TaskDescriptor, TaskStatus};

struct Entry {
    task: Task,
    cancel: CancellationToken,
}

struct Inner {
    tasks: RwLock<HashMap<TaskId, Entry>>,
    worker: Arc<dyn TaskWorker>,
    permits: Semaphore,
    events: Arc<EventBus>,
}

#[derive(Clone)]
pub struct LocalExecutionLayer {
    inner: Arc<Inner>,
}

impl LocalExecutionLayer {
    pub fn new(worker: Arc<dyn TaskWorker>, max_concurrent: usize, events: Arc<EventBus>) -> Self {
        Self {
            inner: Arc::new(Inner {
                tasks: RwLock::new(HashMap::new()),
                worker,
                permits: Semaphore::new(max_concurrent.max(1)),
                events,
            }),
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.inner.events
    }

    /// Snapshot of every known task, oldest first.
    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .inner
            .tasks
            .read()
            .values()
            .map(|e| e.task.clone())
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    pub fn task_count(&self) -> usize {
        self.inner.tasks.read().len()
    }

    /// Drop settled tasks from the table. Returns how many were removed.
    pub fn purge_terminal(&self) -> usize {
        let mut tasks = self.inner.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, e| !e.task.is_terminal());
        before - tasks.len()
    }
}

impl Inner {
    /// Apply `f` to the task; returns the updated snapshot if `f` moved it.
    fn update(&self, id: TaskId, f: impl FnOnce(&mut Task) -> bool) -> Option<Task> {
        let mut tasks = self.tasks.write();
        let entry = tasks.get_mut(&id)?;
        f(&mut entry.task).then(|| entry.task.clone())
    }

    async fn drive(self: Arc<Self>, id: TaskId, cancel: CancellationToken) {
        let _permit = tokio::select! {
            permit = self.permits.acquire() => match permit {
                Ok(p) => p,
                Err(_) => {
                    self.settle(id, Err(Error::Internal("execution layer closed".into())));
                    return;
                }
            },
            _ = cancel.cancelled() => return,
        };

        let Some(task) = self.update(id, Task::start) else {
            // Canceled while waiting for a permit.
            return;
        };
        tracing::info!(task_id = %id, kind = %task.kind(), "Task started");
        self.events.broadcast(EventPayload::TaskStarted { task_id: id });

        let run = AssertUnwindSafe(self.worker.run(&task, cancel.clone())).catch_unwind();
        let result = tokio::select! {
            r = run => match r {
                Ok(r) => r,
                Err(_) => Err(Error::Internal("worker panicked".into())),
            },
            _ = cancel.cancelled() => return,
        };
        self.settle(id, result);
    }

    fn settle(&self, id: TaskId, result: Result<Vec<MediaReference>>) {
        match result {
            Ok(produced) => {
                let count = produced.len();
                if self.update(id, |t| t.finish(produced)).is_some() {
                    tracing::info!(task_id = %id, outputs = count, "Task finished");
                    self.events.broadcast(EventPayload::TaskFinished { task_id: id });
                } else {
                    tracing::debug!(task_id = %id, "Discarding result of settled task");
                }
            }
            Err(e) => {
                let message = e.to_string();
                if self.update(id, |t| t.fail(&message)).is_some() {
                    tracing::error!(task_id = %id, error = %message, "Task failed");
                    self.events.broadcast(EventPayload::TaskFailed {
                        task_id: id,
                        error: message,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl ExecutionLayer for LocalExecutionLayer {
    async fn submit(&self, descriptor: TaskDescriptor) -> Result<TaskId> {
        let task = Task::new(descriptor);
        let id = task.id;
        let kind = task.kind();
        let cancel = CancellationToken::new();

        self.inner.tasks.write().insert(
            id,
            Entry {
                task,
                cancel: cancel.clone(),
            },
        );
        tracing::debug!(task_id = %id, kind = %kind, "Task queued");
        self.inner.events.broadcast(EventPayload::TaskQueued {
            task_id: id,
            kind: kind.to_string(),
        });

        tokio::spawn(Arc::clone(&self.inner).drive(id, cancel));
        Ok(id)
    }

    async fn status(&self, id: TaskId) -> Result<Task> {
        self.inner
            .tasks
            .read()
            .get(&id)
            .map(|e| e.task.clone())
            .ok_or_else(|| Error::not_found("task", id))
    }

    async fn cancel(&self, id: TaskId) -> Result<()> {
        let canceled = {
            let mut tasks = self.inner.tasks.write();
            let entry = tasks.get_mut(&id).ok_or_else(|| Error::not_found("task", id))?;
            let moved = entry.task.cancel();
            if moved {
                entry.cancel.cancel();
            }
            moved
        };

        if canceled {
            tracing::info!(task_id = %id, "Task canceled");
            self.inner
                .events
                .broadcast(EventPayload::TaskCanceled { task_id: id });
        }
        Ok(())
    }
}

impl std::fmt::Debug for LocalExecutionLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tasks = self.inner.tasks.read();
        let running = tasks
            .values()
            .filter(|e| e.task.status == TaskStatus::Running)
            .count();
        f.debug_struct("LocalExecutionLayer")
            .field("tasks", &tasks.len())
            .field("running", &running)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Operation;
    use assert_matches::assert_matches;
    use mf_core::MediaKind;
    use mf_profile::EncodingProfile;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps, then succeeds unless the source id is "bad".
    struct SleepyWorker {
        delay: Duration,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SleepyWorker {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TaskWorker for SleepyWorker {
        async fn run(&self, task: &Task, _cancel: CancellationToken) -> Result<Vec<MediaReference>> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            let source = task.descriptor.operation.inputs()[0].clone();
            if source.id == "bad" {
                return Err(Error::tool("ffmpeg", "exited with status 1"));
            }
            Ok(vec![MediaReference::new(
                format!("{}-out", task.id),
                format!("file:///out/{}.mp4", task.id),
                MediaKind::Video,
            )])
        }
    }

    fn encode(source_id: &str) -> TaskDescriptor {
        TaskDescriptor::new(
            Operation::Encode {
                source: MediaReference::new(source_id, "file:///in.mp4", MediaKind::Video),
            },
            EncodingProfile::new("work", MediaKind::Video, "-work.mp4", ""),
            "composer",
        )
    }

    async fn settle(layer: &LocalExecutionLayer, id: TaskId) -> Task {
        for _ in 0..200 {
            let task = layer.status(id).await.unwrap();
            if task.is_terminal() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {id} did not settle");
    }

    #[tokio::test]
    async fn submit_runs_to_finished() {
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let layer = LocalExecutionLayer::new(SleepyWorker::new(Duration::from_millis(5)), 2, events);

        let id = layer.submit(encode("good")).await.unwrap();
        let task = settle(&layer, id).await;
        assert_eq!(task.status, TaskStatus::Finished);
        assert_eq!(task.result.len(), 1);

        let queued = rx.recv().await.unwrap();
        assert_matches!(queued.payload, EventPayload::TaskQueued { task_id, .. } if task_id == id);
    }

    #[tokio::test]
    async fn worker_error_fails_task() {
        let layer = LocalExecutionLayer::new(
            SleepyWorker::new(Duration::from_millis(5)),
            2,
            Arc::new(EventBus::default()),
        );
        let id = layer.submit(encode("bad")).await.unwrap();
        let task = settle(&layer, id).await;
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("ffmpeg"));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let worker = SleepyWorker::new(Duration::from_millis(30));
        let layer = LocalExecutionLayer::new(worker.clone(), 2, Arc::new(EventBus::default()));
        let mut ids = Vec::new();
        for _ in 0..6 {
            ids.push(layer.submit(encode("good")).await.unwrap());
        }
        for id in ids {
            assert_eq!(settle(&layer, id).await.status, TaskStatus::Finished);
        }
        assert!(worker.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancel_is_final() {
        let layer = LocalExecutionLayer::new(
            SleepyWorker::new(Duration::from_millis(200)),
            1,
            Arc::new(EventBus::default()),
        );
        let id = layer.submit(encode("good")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        layer.cancel(id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        let task = layer.status(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Canceled);
        assert!(task.result.is_empty());

        // Canceling again is a no-op.
        layer.cancel(id).await.unwrap();
    }

    #[tokio::test]
    async fn queued_task_can_be_canceled_before_start() {
        let layer = LocalExecutionLayer::new(
            SleepyWorker::new(Duration::from_millis(100)),
            1,
            Arc::new(EventBus::default()),
        );
        let first = layer.submit(encode("good")).await.unwrap();
        let second = layer.submit(encode("good")).await.unwrap();
        layer.cancel(second).await.unwrap();

        assert_eq!(settle(&layer, first).await.status, TaskStatus::Finished);
        let task = layer.status(second).await.unwrap();
        assert_eq!(task.status, TaskStatus::Canceled);
        assert!(task.started_at.is_none());
    }

    #[tokio::test]
    async fn unknown_handle() {
        let layer = LocalExecutionLayer::new(
            SleepyWorker::new(Duration::ZERO),
            1,
            Arc::new(EventBus::default()),
        );
        assert_matches!(layer.status(TaskId::new()).await, Err(Error::NotFound { .. }));
        assert_matches!(layer.cancel(TaskId::new()).await, Err(Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn purge_keeps_active_tasks() {
        let layer = LocalExecutionLayer::new(
            SleepyWorker::new(Duration::from_millis(5)),
            4,
            Arc::new(EventBus::default()),
        );
        let id = layer.submit(encode("good")).await.unwrap();
        settle(&layer, id).await;
        assert_eq!(layer.purge_terminal(), 1);
        assert_eq!(layer.task_count(), 0);
    }
}
