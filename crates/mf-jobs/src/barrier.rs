//! Completion barrier.
//!
//! A wait polls every handle once per `poll_interval` until one of:
//!
//! - every task is terminal (`AllSucceeded` if all finished, else
//!   `SomeFailed`),
//! - in [`WaitMode::StopAtFirstFailure`], any task failed or was canceled,
//! - the timeout elapsed (`TimedOut`),
//! - the caller's token fired (`Canceled`).
//!
//! Timing out or canceling a wait never touches the tasks themselves; they
//! stay on the execution layer and can be awaited again or canceled
//! explicitly.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use mf_core::config::ExecutionConfig;
use mf_core::{Error, GroupId, MediaReference, Result, TaskId};

use crate::layer::ExecutionLayer;
use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitMode {
    /// Wait until every task is terminal.
    #[default]
    All,
    /// Return as soon as any task failed or was canceled.
    StopAtFirstFailure,
}

#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub mode: WaitMode,
    pub cancel: Option<CancellationToken>,
}

impl WaitOptions {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            timeout: None,
            mode: WaitMode::All,
            cancel: None,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            timeout: config.wait_timeout(),
            ..Self::new(config.poll_interval())
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_mode(mut self, mode: WaitMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarrierState {
    AllSucceeded,
    SomeFailed,
    TimedOut,
    Canceled,
}

/// Result of a wait: the final state plus the last observed snapshot of
/// every task, in handle order.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub state: BarrierState,
    pub tasks: Vec<Task>,
}

impl Outcome {
    /// True iff every handle reached FINISHED.
    pub fn is_success(&self) -> bool {
        self.state == BarrierState::AllSucceeded
    }

    /// Tasks that failed or were canceled.
    pub fn failed(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Failed | TaskStatus::Canceled))
            .collect()
    }

    /// Handles not yet terminal at the end of the wait.
    pub fn outstanding(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| !t.is_terminal())
            .map(|t| t.id)
            .collect()
    }

    /// Produced media of finished tasks, in handle order.
    pub fn produced(&self) -> Vec<&MediaReference> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Finished)
            .flat_map(|t| t.result.iter())
            .collect()
    }

    /// Turn a non-successful outcome into an error attributed to the first
    /// failed handle. An expired wait maps to [`Error::Timeout`] and an
    /// interrupted one to [`Error::Canceled`].
    pub fn into_result(self) -> Result<Vec<Task>> {
        match self.state {
            BarrierState::AllSucceeded => Ok(self.tasks),
            BarrierState::SomeFailed => {
                let failed = self
                    .failed()
                    .into_iter()
                    .next()
                    .map(|t| (t.id, t.error.clone().unwrap_or_else(|| t.status.to_string())));
                match failed {
                    Some((id, message)) => Err(Error::execution_failed(id, message)),
                    None => Err(Error::Internal("barrier reported failure without a failed task".into())),
                }
            }
            BarrierState::TimedOut => Err(Error::Timeout(format!(
                "{} task(s) still outstanding",
                self.outstanding().len()
            ))),
            BarrierState::Canceled => Err(Error::Canceled(format!(
                "{} task(s) still outstanding",
                self.outstanding().len()
            ))),
        }
    }
}

/// Handles submitted together for one logical operation.
#[derive(Debug, Clone)]
pub struct TaskGroup {
    pub id: GroupId,
    pub handles: Vec<TaskId>,
}

impl TaskGroup {
    pub fn new(handles: Vec<TaskId>) -> Self {
        Self {
            id: GroupId::new(),
            handles,
        }
    }
}

#[derive(Clone)]
pub struct CompletionBarrier {
    layer: Arc<dyn ExecutionLayer>,
}

impl CompletionBarrier {
    pub fn new(layer: Arc<dyn ExecutionLayer>) -> Self {
        Self { layer }
    }

    pub async fn wait_for_group(&self, group: &TaskGroup, options: &WaitOptions) -> Result<Outcome> {
        tracing::debug!(group_id = %group.id, tasks = group.handles.len(), "Waiting for task group");
        let outcome = self.wait_for(&group.handles, options).await?;
        tracing::info!(group_id = %group.id, state = ?outcome.state, "Task group settled");
        Ok(outcome)
    }

    /// Block until the handles settle per `options`.
    ///
    /// # Errors
    ///
    /// Only a failed status query (e.g. an unknown handle) is an error;
    /// task failures, timeouts and cancellation are reported in the
    /// [`Outcome`].
    pub async fn wait_for(&self, handles: &[TaskId], options: &WaitOptions) -> Result<Outcome> {
        let deadline = options.timeout.map(|t| Instant::now() + t);
        let mut ticker = tokio::time::interval(options.poll_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let cancelled = async {
            match &options.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(cancelled);

        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);

        // Poll before the first tick so an early timeout or cancel still
        // reports every handle.
        ticker.reset();
        let mut tasks = self.poll(handles).await?;
        loop {
            if let Some(state) = settled(&tasks, options.mode) {
                return Ok(Outcome { state, tasks });
            }

            tokio::select! {
                biased;
                _ = &mut cancelled => {
                    return Ok(Outcome { state: BarrierState::Canceled, tasks });
                }
                _ = &mut expired => {
                    return Ok(Outcome { state: BarrierState::TimedOut, tasks });
                }
                _ = ticker.tick() => {}
            }

            tasks = self.poll(handles).await?;
        }
    }

    async fn poll(&self, handles: &[TaskId]) -> Result<Vec<Task>> {
        let mut tasks = Vec::with_capacity(handles.len());
        for &id in handles {
            tasks.push(self.layer.status(id).await?);
        }
        Ok(tasks)
    }
}

fn settled(tasks: &[Task], mode: WaitMode) -> Option<BarrierState> {
    let failed = |t: &Task| matches!(t.status, TaskStatus::Failed | TaskStatus::Canceled);
    if mode == WaitMode::StopAtFirstFailure && tasks.iter().any(failed) {
        return Some(BarrierState::SomeFailed);
    }
    if !tasks.iter().all(Task::is_terminal) {
        return None;
    }
    if tasks.iter().all(|t| t.status == TaskStatus::Finished) {
        Some(BarrierState::AllSucceeded)
    } else {
        Some(BarrierState::SomeFailed)
    }
}

impl std::fmt::Debug for CompletionBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionBarrier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::TaskWorker;
    use crate::local::LocalExecutionLayer;
    use crate::task::{Operation, TaskDescriptor};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use mf_core::events::EventBus;
    use mf_core::MediaKind;
    use mf_profile::EncodingProfile;

    /// Source id encodes the script: "ok:<ms>" or "fail:<ms>".
    struct ScriptedWorker;

    #[async_trait]
    impl TaskWorker for ScriptedWorker {
        async fn run(&self, task: &Task, _cancel: CancellationToken) -> Result<Vec<MediaReference>> {
            let id = task.descriptor.operation.inputs()[0].id.clone();
            let (verdict, ms) = id.split_once(':').unwrap_or(("ok", "0"));
            let ms: u64 = ms.parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            match verdict {
                "fail" => Err(Error::tool("ffmpeg", "boom")),
                _ => Ok(vec![MediaReference::new(
                    task.id.to_string(),
                    format!("file:///out/{}.mp4", task.id),
                    MediaKind::Video,
                )]),
            }
        }
    }

    fn setup() -> (Arc<LocalExecutionLayer>, CompletionBarrier) {
        let layer = Arc::new(LocalExecutionLayer::new(
            Arc::new(ScriptedWorker),
            8,
            Arc::new(EventBus::default()),
        ));
        let barrier = CompletionBarrier::new(layer.clone());
        (layer, barrier)
    }

    async fn submit(layer: &LocalExecutionLayer, script: &str) -> TaskId {
        layer
            .submit(TaskDescriptor::new(
                Operation::Encode {
                    source: MediaReference::new(script, "file:///in.mp4", MediaKind::Video),
                },
                EncodingProfile::new("work", MediaKind::Video, ".mp4", ""),
                "composer",
            ))
            .await
            .unwrap()
    }

    fn fast() -> WaitOptions {
        WaitOptions::new(Duration::from_millis(10)).with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn all_finished() {
        let (layer, barrier) = setup();
        let mut handles = Vec::new();
        for ms in [5, 20, 40] {
            handles.push(submit(&layer, &format!("ok:{ms}")).await);
        }
        let outcome = barrier.wait_for(&handles, &fast()).await.unwrap();
        assert_eq!(outcome.state, BarrierState::AllSucceeded);
        assert!(outcome.is_success());
        assert_eq!(outcome.produced().len(), 3);
        let ids: Vec<_> = outcome.tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, handles);
    }

    #[tokio::test]
    async fn one_failure_spoils_the_group() {
        let (layer, barrier) = setup();
        let handles = vec![
            submit(&layer, "ok:5").await,
            submit(&layer, "fail:5").await,
            submit(&layer, "ok:30").await,
        ];
        let outcome = barrier.wait_for(&handles, &fast()).await.unwrap();
        assert_eq!(outcome.state, BarrierState::SomeFailed);
        assert!(!outcome.is_success());
        assert_eq!(outcome.failed().len(), 1);
        // Siblings are left intact.
        assert_eq!(outcome.produced().len(), 2);
        assert_matches!(outcome.into_result(), Err(Error::ExecutionFailed { task, .. }) if task == handles[1]);
    }

    #[tokio::test]
    async fn stop_at_first_failure_returns_early() {
        let (layer, barrier) = setup();
        let handles = vec![submit(&layer, "fail:5").await, submit(&layer, "ok:2000").await];
        let started = std::time::Instant::now();
        let outcome = barrier
            .wait_for(&handles, &fast().with_mode(WaitMode::StopAtFirstFailure))
            .await
            .unwrap();
        assert_eq!(outcome.state, BarrierState::SomeFailed);
        assert!(started.elapsed() < Duration::from_millis(1500));
        assert_eq!(outcome.outstanding(), vec![handles[1]]);
    }

    #[tokio::test]
    async fn timeout_leaves_tasks_outstanding() {
        let (layer, barrier) = setup();
        let handle = submit(&layer, "ok:300").await;
        let options = WaitOptions::new(Duration::from_millis(10)).with_timeout(Duration::from_millis(50));
        let outcome = barrier.wait_for(&[handle], &options).await.unwrap();
        assert_eq!(outcome.state, BarrierState::TimedOut);
        assert_matches!(outcome.into_result(), Err(Error::Timeout(_)));

        // Still valid and re-pollable.
        let outcome = barrier.wait_for(&[handle], &fast()).await.unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn canceling_the_wait_does_not_cancel_tasks() {
        let (layer, barrier) = setup();
        let handle = submit(&layer, "ok:100").await;
        let token = CancellationToken::new();
        token.cancel();
        let outcome = barrier
            .wait_for(&[handle], &fast().with_cancel(token))
            .await
            .unwrap();
        assert_eq!(outcome.state, BarrierState::Canceled);
        assert_eq!(outcome.outstanding(), vec![handle]);
        assert_matches!(outcome.into_result(), Err(Error::Canceled(msg)) if msg.starts_with("1 task"));

        let outcome = barrier.wait_for(&[handle], &fast()).await.unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn immediate_timeout_still_reports_outstanding() {
        let (layer, barrier) = setup();
        let handle = submit(&layer, "ok:300").await;
        let options = WaitOptions::new(Duration::from_millis(10)).with_timeout(Duration::ZERO);
        let outcome = barrier.wait_for(&[handle], &options).await.unwrap();
        assert_eq!(outcome.state, BarrierState::TimedOut);
        assert_eq!(outcome.tasks.len(), 1);
        assert_eq!(outcome.outstanding(), vec![handle]);
        assert_matches!(outcome.into_result(), Err(Error::Timeout(msg)) if msg.starts_with("1 task"));
    }

    #[tokio::test]
    async fn canceled_task_counts_as_failure() {
        let (layer, barrier) = setup();
        let handle = submit(&layer, "ok:500").await;
        layer.cancel(handle).await.unwrap();
        let outcome = barrier.wait_for(&[handle], &fast()).await.unwrap();
        assert_eq!(outcome.state, BarrierState::SomeFailed);
    }

    #[tokio::test]
    async fn unknown_handle_is_an_error() {
        let (_layer, barrier) = setup();
        assert_matches!(
            barrier.wait_for(&[TaskId::new()], &fast()).await,
            Err(Error::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn empty_group_succeeds() {
        let (_layer, barrier) = setup();
        let outcome = barrier
            .wait_for_group(&TaskGroup::new(vec![]), &fast())
            .await
            .unwrap();
        assert!(outcome.is_success());
    }
}
