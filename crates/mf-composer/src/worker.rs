//! ffmpeg-backed task worker.
//!
//! Fetches the task's inputs from the asset store, renders every output in a
//! private workspace, stores the results and inspects them so the task
//! result carries real media references.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mf_av::ffmpeg::{self, ConcatInput, OverlayLayer};
use mf_av::tools::FFMPEG;
use mf_av::{FfmpegArgs, Inspector, TemplateContext, ToolRegistry, Workspace};
use mf_core::{Error, MediaKind, MediaReference, Result};
use mf_jobs::{Operation, Task, TaskWorker};
use mf_profile::EncodingProfile;

use crate::store::AssetStore;

pub struct FfmpegWorker {
    tools: Arc<ToolRegistry>,
    store: Arc<dyn AssetStore>,
    inspector: Arc<dyn Inspector>,
    scratch: Option<PathBuf>,
}

impl FfmpegWorker {
    pub fn new(
        tools: Arc<ToolRegistry>,
        store: Arc<dyn AssetStore>,
        inspector: Arc<dyn Inspector>,
    ) -> Self {
        Self {
            tools,
            store,
            inspector,
            scratch: None,
        }
    }

    /// Create workspaces under `dir` instead of the system temp dir.
    pub fn with_scratch(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch = Some(dir.into());
        self
    }

    fn workspace(&self) -> Result<Workspace> {
        match &self.scratch {
            Some(dir) => Workspace::new_in(dir),
            None => Workspace::new(),
        }
    }

    async fn render(
        &self,
        task: &Task,
        args: FfmpegArgs,
        cancel: &CancellationToken,
    ) -> Result<MediaReference> {
        let output = args.output().to_path_buf();
        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::Internal(format!("output {} has no file name", output.display())))?;

        let mut cmd = self.tools.command(FFMPEG)?;
        cmd.args(args.into_args());
        cmd.execute_cancellable(cancel)
            .await
            .map_err(|e| Error::execution_failed(task.id, e.to_string()))?;

        let uri = self
            .store
            .store_file(&output, &task.descriptor.collection, &name)
            .await?;
        let mut reference = self.inspector.inspect(&uri).await?;
        if let Some(mime) = &task.descriptor.profile.mime_type {
            reference.mime_type = Some(mime.clone());
        }
        tracing::debug!(task_id = %task.id, uri = %reference.uri, "Output stored");
        Ok(reference)
    }
}

#[async_trait]
impl TaskWorker for FfmpegWorker {
    async fn run(&self, task: &Task, cancel: CancellationToken) -> Result<Vec<MediaReference>> {
        let mut inputs = Vec::new();
        for media in task.descriptor.operation.inputs() {
            inputs.push(self.store.fetch(&media.uri).await?);
        }

        let workspace = self.workspace()?;
        let renders = plan(task, &inputs, workspace.path())?;
        tracing::info!(
            task_id = %task.id,
            kind = %task.kind(),
            outputs = renders.len(),
            "Rendering"
        );

        let parallel = matches!(task.descriptor.operation, Operation::ParallelEncode { .. });
        if parallel {
            let jobs = renders
                .into_iter()
                .map(|args| self.render(task, args, &cancel));
            futures::future::try_join_all(jobs).await
        } else {
            let mut produced = Vec::with_capacity(renders.len());
            for args in renders {
                produced.push(self.render(task, args, &cancel).await?);
            }
            Ok(produced)
        }
    }
}

/// Build the ffmpeg invocations for `task`. `inputs` holds the local path of
/// every [`Operation::inputs`] entry, in the same order.
pub fn plan(task: &Task, inputs: &[PathBuf], workspace: &Path) -> Result<Vec<FfmpegArgs>> {
    let operation = &task.descriptor.operation;
    let expected = operation.inputs().len();
    if inputs.len() != expected {
        return Err(Error::Internal(format!(
            "expected {expected} input paths, got {}",
            inputs.len()
        )));
    }
    if inputs.is_empty() {
        return Err(Error::illegal_input("task has no inputs"));
    }

    let profile = &task.descriptor.profile;
    let stem = task.id.to_string();
    let out = |stem: &str, suffix: &str| workspace.join(format!("{stem}{suffix}"));
    let context = |input: &Path, output: &Path, media: &MediaReference| {
        base_context(profile, input, output, workspace, media)
    };

    let renders = match operation {
        Operation::Encode { source } => {
            let output = out(&stem, &profile.suffix);
            let opts = context(&inputs[0], &output, source).substitute_args(&profile.command)?;
            vec![ffmpeg::encode(&inputs[0], &output, opts)]
        }
        Operation::Mux { video, options, .. } => {
            let output = out(&stem, &profile.suffix);
            let opts = context(&inputs[0], &output, video)
                .with_vars(options)
                .substitute_args(&profile.command)?;
            vec![ffmpeg::mux(&inputs[0], &inputs[1], &output, opts)]
        }
        Operation::ParallelEncode { source } => {
            let variants: Vec<(&str, &str)> = if profile.variants.is_empty() {
                vec![(profile.suffix.as_str(), profile.command.as_str())]
            } else {
                profile
                    .variants
                    .iter()
                    .map(|v| (v.suffix.as_str(), v.command.as_str()))
                    .collect()
            };
            let mut renders = Vec::with_capacity(variants.len());
            for (suffix, command) in variants {
                let output = out(&stem, suffix);
                let opts = context(&inputs[0], &output, source).substitute_args(command)?;
                renders.push(ffmpeg::encode(&inputs[0], &output, opts));
            }
            renders
        }
        Operation::Composite {
            canvas,
            background,
            layers,
        } => {
            let output = out(&stem, &profile.suffix);
            let overlays: Vec<OverlayLayer> = layers
                .iter()
                .zip(inputs)
                .map(|(layer, path)| OverlayLayer {
                    path: path.clone(),
                    shape: layer.shape,
                    still: layer.media.kind == MediaKind::Image,
                    has_audio: layer.media.kind.has_audio(),
                })
                .collect();
            let opts = context(&inputs[0], &output, &layers[0].media)
                .with_var("width", canvas.width)
                .with_var("height", canvas.height)
                .substitute_args(&profile.command)?;
            vec![ffmpeg::composite(*canvas, background, &overlays, &output, opts)?]
        }
        Operation::Concat {
            canvas,
            frame_rate,
            sources,
        } => {
            let output = out(&stem, &profile.suffix);
            let segments: Vec<ConcatInput> = sources
                .iter()
                .zip(inputs)
                .map(|(media, path)| ConcatInput {
                    path: path.clone(),
                    has_audio: media.kind.has_audio(),
                })
                .collect();
            let mut ctx = context(&inputs[0], &output, &sources[0])
                .with_var("width", canvas.width)
                .with_var("height", canvas.height);
            if let Some(rate) = frame_rate {
                ctx.set("frame_rate", rate);
            }
            let opts = ctx.substitute_args(&profile.command)?;
            vec![ffmpeg::concat(*canvas, *frame_rate, &segments, &output, opts)?]
        }
        Operation::ImageToVideo {
            image,
            duration_secs,
        } => {
            let output = out(&stem, &profile.suffix);
            let opts = context(&inputs[0], &output, image)
                .with_var("duration", ffmpeg::format_secs(*duration_secs))
                .substitute_args(&profile.command)?;
            vec![ffmpeg::image_to_video(&inputs[0], *duration_secs, &output, opts)]
        }
        Operation::Still { source, times } => {
            let mut renders = Vec::with_capacity(times.len());
            for (i, &time) in times.iter().enumerate() {
                let output = out(&format!("{stem}-{i}"), &profile.suffix);
                let opts = context(&inputs[0], &output, source)
                    .with_var("time", ffmpeg::format_secs(time))
                    .substitute_args(&profile.command)?;
                renders.push(ffmpeg::still(&inputs[0], time, &output, opts));
            }
            renders
        }
    };
    Ok(renders)
}

/// Paths, profile params and whatever is known about the primary input.
fn base_context(
    profile: &EncodingProfile,
    input: &Path,
    output: &Path,
    workspace: &Path,
    media: &MediaReference,
) -> TemplateContext {
    let mut ctx = TemplateContext::new()
        .with_paths(input, output, workspace)
        .with_vars(&profile.params);
    if let Some(dim) = media.dimension {
        ctx.set("width", dim.width);
        ctx.set("height", dim.height);
    }
    if let Some(duration) = media.duration_secs {
        ctx.set("duration", ffmpeg::format_secs(duration));
    }
    ctx
}
