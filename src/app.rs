//! Application wiring.
//!
//! Builds the whole stack from a [`Config`]: profile registry, tool
//! registry, asset store, ffmpeg worker, in-process execution layer,
//! orchestrator and completion barrier.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use mf_av::{FfprobeInspector, Inspector, ToolRegistry};
use mf_composer::{Composer, FfmpegWorker, FsAssetStore};
use mf_core::config::Config;
use mf_core::events::EventBus;
use mf_core::{Dimension, Error, MediaReference, Result, TaskId};
use mf_layout::{LayoutSpec, MultiShapeLayout};
use mf_jobs::{CompletionBarrier, LocalExecutionLayer, Outcome, TaskWorker, WaitOptions};
use mf_profile::{ProfileRegistry, TomlProfileSource};

pub struct App {
    config: Config,
    events: Arc<EventBus>,
    profiles: Arc<ProfileRegistry>,
    layer: LocalExecutionLayer,
    composer: Composer,
    barrier: CompletionBarrier,
    inspector: Arc<dyn Inspector>,
}

impl App {
    /// Assemble the stack around an arbitrary worker and inspector.
    pub fn new(
        config: Config,
        profiles: Arc<ProfileRegistry>,
        worker: Arc<dyn TaskWorker>,
        inspector: Arc<dyn Inspector>,
    ) -> Self {
        let events = Arc::new(EventBus::default());
        let layer = LocalExecutionLayer::new(
            worker,
            config.execution.max_concurrent_tasks,
            events.clone(),
        );
        let shared: Arc<dyn mf_jobs::ExecutionLayer> = Arc::new(layer.clone());
        let composer = Composer::new(
            profiles.clone(),
            shared.clone(),
            config.storage.default_collection.clone(),
        );
        Self {
            barrier: CompletionBarrier::new(shared),
            config,
            events,
            profiles,
            layer,
            composer,
            inspector,
        }
    }

    /// Full production stack: ffmpeg worker, ffprobe inspection and the
    /// filesystem asset store under `storage.root`.
    pub fn from_config(config: Config) -> Result<Self> {
        let profiles = Arc::new(load_profiles(&config)?);
        let tools = Arc::new(ToolRegistry::discover(
            &config.tools,
            config.execution.tool_timeout(),
        ));
        let inspector: Arc<dyn Inspector> = Arc::new(FfprobeInspector::from_registry(&tools)?);
        let store = Arc::new(FsAssetStore::new(config.storage.root.clone()));
        let worker = Arc::new(FfmpegWorker::new(tools, store, inspector.clone()));
        Ok(Self::new(config, profiles, worker, inspector))
    }

    /// Send outputs of subsequently submitted tasks to `collection`.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.composer = self.composer.in_collection(collection);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn profiles(&self) -> &Arc<ProfileRegistry> {
        &self.profiles
    }

    pub fn layer(&self) -> &LocalExecutionLayer {
        &self.layer
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn barrier(&self) -> &CompletionBarrier {
        &self.barrier
    }

    /// Barrier options from `execution`.
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::from_config(&self.config.execution)
    }

    /// Inspect a local file into a media reference.
    pub async fn inspect(&self, path: &Path) -> Result<MediaReference> {
        let path = absolute(path)?;
        self.inspector
            .inspect(&format!("file://{}", path.display()))
            .await
    }

    /// Wait for `handles` and return everything they produced, failing if
    /// any task failed or the wait ran out.
    pub async fn run_to_completion(
        &self,
        handles: &[TaskId],
        options: &WaitOptions,
    ) -> Result<Vec<MediaReference>> {
        let outcome: Outcome = self.barrier.wait_for(handles, options).await?;
        let tasks = outcome.into_result()?;
        Ok(tasks.into_iter().flat_map(|t| t.result).collect())
    }
}

/// Body of a `layout` request file.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutRequest {
    pub canvas: Dimension,
    pub elements: Vec<LayoutElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayoutElement {
    pub dimension: Dimension,
    pub layout: LayoutSpec,
}

impl LayoutRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::invalid_layout(format!("malformed layout request: {e}")))
    }

    pub fn solve(&self) -> Result<MultiShapeLayout> {
        let elements: Vec<(Dimension, LayoutSpec)> = self
            .elements
            .iter()
            .map(|e| (e.dimension, e.layout))
            .collect();
        mf_layout::layout(self.canvas, &elements)
    }
}

/// Load every configured descriptor into a registry. An empty configuration
/// yields an empty registry.
pub fn load_profiles(config: &Config) -> Result<ProfileRegistry> {
    let paths = config.profiles.paths.iter().map(|p| expand(p));
    let registry = ProfileRegistry::load(&TomlProfileSource::new(paths))?;
    tracing::info!(profiles = registry.len(), "Profiles loaded");
    Ok(registry)
}

/// Expand a leading `~` in a configured path.
pub fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    let path = expand(path);
    if !path.exists() {
        return Err(Error::not_found("file", path.display()));
    }
    Ok(std::fs::canonicalize(path)?)
}
