//! Task orchestrator.
//!
//! Every operation is split into `prepare_*`, which validates the request
//! and builds a [`TaskDescriptor`] without side effects, and a submitting
//! wrapper. Anything rejected here never reaches the execution layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use mf_core::{Dimension, Error, MediaKind, MediaReference, Result, TaskId};
use mf_jobs::{ExecutionLayer, Operation, PlacedMedia, TaskDescriptor};
use mf_layout::LayoutSpec;
use mf_profile::{EncodingProfile, ProfileRegistry};

/// A media reference plus the rule placing it on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeElement {
    pub media: MediaReference,
    pub layout: LayoutSpec,
}

impl CompositeElement {
    pub fn new(media: MediaReference, layout: impl Into<LayoutSpec>) -> Self {
        Self {
            media,
            layout: layout.into(),
        }
    }
}

#[derive(Clone)]
pub struct Composer {
    profiles: Arc<ProfileRegistry>,
    layer: Arc<dyn ExecutionLayer>,
    collection: String,
}

impl Composer {
    pub fn new(
        profiles: Arc<ProfileRegistry>,
        layer: Arc<dyn ExecutionLayer>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            profiles,
            layer,
            collection: collection.into(),
        }
    }

    /// Same registry and layer, outputs going to `collection`.
    pub fn in_collection(&self, collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..self.clone()
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn resolve(&self, profile_id: &str, kind: MediaKind) -> Result<EncodingProfile> {
        Ok(self.profiles.resolve(profile_id, kind)?.as_ref().clone())
    }

    fn descriptor(&self, operation: Operation, profile: EncodingProfile) -> TaskDescriptor {
        TaskDescriptor::new(operation, profile, self.collection.clone())
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Enqueue a prepared task and return its handle.
    pub async fn submit(&self, descriptor: TaskDescriptor) -> Result<TaskId> {
        let kind = descriptor.kind();
        let profile = descriptor.profile.identifier.clone();
        let id = self.layer.submit(descriptor).await?;
        tracing::info!(
            task_id = %id,
            kind = %kind,
            profile = %profile,
            collection = %self.collection,
            "Task submitted"
        );
        Ok(id)
    }

    /// Submit the same descriptor `n` times. Each submission stands alone;
    /// one failing does not affect the others.
    pub async fn submit_many(&self, n: usize, descriptor: &TaskDescriptor) -> Vec<Result<TaskId>> {
        let mut handles = Vec::with_capacity(n);
        for _ in 0..n {
            handles.push(self.submit(descriptor.clone()).await);
        }
        handles
    }

    /// Cancel a task on the execution layer.
    pub async fn cancel(&self, id: TaskId) -> Result<()> {
        self.layer.cancel(id).await
    }

    // -----------------------------------------------------------------------
    // Encode
    // -----------------------------------------------------------------------

    pub fn prepare_encode(
        &self,
        source: Option<&MediaReference>,
        profile_id: &str,
    ) -> Result<TaskDescriptor> {
        let source = required(source, "source track")?;
        let profile = self.resolve(profile_id, source.kind)?;
        Ok(self.descriptor(
            Operation::Encode {
                source: source.clone(),
            },
            profile,
        ))
    }

    /// Encode one track with one profile.
    pub async fn encode(&self, source: Option<&MediaReference>, profile_id: &str) -> Result<TaskId> {
        let descriptor = self.prepare_encode(source, profile_id)?;
        self.submit(descriptor).await
    }

    /// Mux needs both tracks; the profile is resolved for audio+video input.
    pub fn prepare_mux(
        &self,
        audio: Option<&MediaReference>,
        video: Option<&MediaReference>,
        profile_id: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<TaskDescriptor> {
        let audio = required(audio, "audio track")?;
        let video = required(video, "video track")?;
        if !audio.kind.has_audio() {
            return Err(Error::illegal_input(format!(
                "audio track {} carries no audio ({})",
                audio.id, audio.kind
            )));
        }
        if !video.kind.has_video() {
            return Err(Error::illegal_input(format!(
                "video track {} carries no video ({})",
                video.id, video.kind
            )));
        }
        let profile = self.resolve(profile_id, MediaKind::AudioVideo)?;
        Ok(self.descriptor(
            Operation::Mux {
                audio: audio.clone(),
                video: video.clone(),
                options: options.clone(),
            },
            profile,
        ))
    }

    /// Combine the sound of `audio` with the picture of `video`.
    pub async fn mux(
        &self,
        audio: Option<&MediaReference>,
        video: Option<&MediaReference>,
        profile_id: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<TaskId> {
        let descriptor = self.prepare_mux(audio, video, profile_id, options)?;
        self.submit(descriptor).await
    }

    pub fn prepare_parallel_encode(
        &self,
        source: Option<&MediaReference>,
        profile_id: &str,
    ) -> Result<TaskDescriptor> {
        let source = required(source, "source track")?;
        let profile = self.resolve(profile_id, source.kind)?;
        Ok(self.descriptor(
            Operation::ParallelEncode {
                source: source.clone(),
            },
            profile,
        ))
    }

    /// One task producing every variant of the profile.
    pub async fn parallel_encode(
        &self,
        source: Option<&MediaReference>,
        profile_id: &str,
    ) -> Result<TaskId> {
        let descriptor = self.prepare_parallel_encode(source, profile_id)?;
        self.submit(descriptor).await
    }

    // -----------------------------------------------------------------------
    // Composite
    // -----------------------------------------------------------------------

    /// Lay out `lower` (optional), `upper` and `watermark` (optional, must be
    /// an image) on `canvas`, bottom to top.
    pub fn prepare_composite(
        &self,
        canvas: Dimension,
        lower: Option<&CompositeElement>,
        upper: Option<&CompositeElement>,
        watermark: Option<&CompositeElement>,
        profile_id: &str,
        background: &str,
    ) -> Result<TaskDescriptor> {
        let upper = required(upper, "upper element")?;
        if let Some(mark) = watermark {
            if mark.media.kind != MediaKind::Image {
                return Err(Error::illegal_input(format!(
                    "watermark {} must be an image, got {}",
                    mark.media.id, mark.media.kind
                )));
            }
        }
        mf_av::ffmpeg::validate_color(background)?;

        let elements: Vec<&CompositeElement> =
            lower.into_iter().chain([upper]).chain(watermark).collect();
        let mut shapes = Vec::with_capacity(elements.len());
        for element in &elements {
            let media = &element.media;
            if !media.kind.is_visual() {
                return Err(Error::illegal_input(format!(
                    "composite element {} has no picture ({})",
                    media.id, media.kind
                )));
            }
            let dim = media.dimension.ok_or_else(|| {
                Error::illegal_input(format!("composite element {} has no known dimension", media.id))
            })?;
            shapes.push((dim, element.layout));
        }

        let layout = mf_layout::layout(canvas, &shapes)?;
        let profile = self.resolve(profile_id, composite_kind(&elements))?;
        let layers = elements
            .iter()
            .zip(layout.shapes)
            .map(|(e, shape)| PlacedMedia {
                media: e.media.clone(),
                shape,
            })
            .collect();

        tracing::debug!(canvas = %canvas, layers = elements.len(), "Composite layout solved");
        Ok(self.descriptor(
            Operation::Composite {
                canvas,
                background: background.to_string(),
                layers,
            },
            profile,
        ))
    }

    pub async fn composite_overlay(
        &self,
        canvas: Dimension,
        lower: Option<&CompositeElement>,
        upper: Option<&CompositeElement>,
        watermark: Option<&CompositeElement>,
        profile_id: &str,
        background: &str,
    ) -> Result<TaskId> {
        let descriptor =
            self.prepare_composite(canvas, lower, upper, watermark, profile_id, background)?;
        self.submit(descriptor).await
    }

    // -----------------------------------------------------------------------
    // Concat / image-to-video / stills
    // -----------------------------------------------------------------------

    pub fn prepare_concat(
        &self,
        profile_id: &str,
        canvas: Dimension,
        frame_rate: Option<f32>,
        sources: &[MediaReference],
    ) -> Result<TaskDescriptor> {
        if sources.is_empty() {
            return Err(Error::illegal_input("concat needs at least one track"));
        }
        if canvas.is_empty() {
            return Err(Error::illegal_input(format!("canvas {canvas} has zero area")));
        }
        if let Some(rate) = frame_rate {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(Error::illegal_input(format!("frame rate {rate} must be positive")));
            }
        }
        let mut profile = None;
        for source in sources {
            if !source.kind.has_video() {
                return Err(Error::illegal_input(format!(
                    "concat track {} has no video ({})",
                    source.id, source.kind
                )));
            }
            profile = Some(self.resolve(profile_id, source.kind)?);
        }
        let profile = profile.ok_or_else(|| Error::Internal("no profile resolved".into()))?;
        Ok(self.descriptor(
            Operation::Concat {
                canvas,
                frame_rate,
                sources: sources.to_vec(),
            },
            profile,
        ))
    }

    /// Join `sources` in order, each scaled to `canvas`.
    pub async fn concatenate(
        &self,
        profile_id: &str,
        canvas: Dimension,
        frame_rate: Option<f32>,
        sources: &[MediaReference],
    ) -> Result<TaskId> {
        let descriptor = self.prepare_concat(profile_id, canvas, frame_rate, sources)?;
        self.submit(descriptor).await
    }

    pub fn prepare_image_to_video(
        &self,
        image: Option<&MediaReference>,
        profile_id: &str,
        duration_secs: f64,
    ) -> Result<TaskDescriptor> {
        let image = required(image, "image attachment")?;
        let profile = self.resolve(profile_id, MediaKind::Image)?;
        if image.kind != MediaKind::Image {
            return Err(Error::illegal_input(format!(
                "{} is not an image ({})",
                image.id, image.kind
            )));
        }
        if !(duration_secs.is_finite() && duration_secs > 0.0) {
            return Err(Error::illegal_input(format!(
                "duration {duration_secs}s must be positive"
            )));
        }
        Ok(self.descriptor(
            Operation::ImageToVideo {
                image: image.clone(),
                duration_secs,
            },
            profile,
        ))
    }

    /// Turn a still image into a clip of `duration_secs`.
    pub async fn image_to_video(
        &self,
        image: Option<&MediaReference>,
        profile_id: &str,
        duration_secs: f64,
    ) -> Result<TaskId> {
        let descriptor = self.prepare_image_to_video(image, profile_id, duration_secs)?;
        self.submit(descriptor).await
    }

    pub fn prepare_image(
        &self,
        source: Option<&MediaReference>,
        profile_id: &str,
        times: &[f64],
    ) -> Result<TaskDescriptor> {
        let source = required(source, "source track")?;
        if !source.kind.has_video() {
            return Err(Error::illegal_input(format!(
                "cannot extract stills from {} ({})",
                source.id, source.kind
            )));
        }
        if times.is_empty() {
            return Err(Error::illegal_input("at least one time is required"));
        }
        for &t in times {
            if !(t.is_finite() && t >= 0.0) {
                return Err(Error::illegal_input(format!("time {t}s must be >= 0")));
            }
            if let Some(duration) = source.duration_secs {
                if t > duration {
                    return Err(Error::illegal_input(format!(
                        "time {t}s is past the end of {} ({duration}s)",
                        source.id
                    )));
                }
            }
        }
        let profile = self.resolve(profile_id, source.kind)?;
        Ok(self.descriptor(
            Operation::Still {
                source: source.clone(),
                times: times.to_vec(),
            },
            profile,
        ))
    }

    /// Extract one still per entry of `times` (seconds).
    pub async fn image(
        &self,
        source: Option<&MediaReference>,
        profile_id: &str,
        times: &[f64],
    ) -> Result<TaskId> {
        let descriptor = self.prepare_image(source, profile_id, times)?;
        self.submit(descriptor).await
    }
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("collection", &self.collection)
            .field("profiles", &self.profiles.len())
            .finish_non_exhaustive()
    }
}

fn required<'a, T>(value: Option<&'a T>, what: &str) -> Result<&'a T> {
    value.ok_or_else(|| Error::illegal_input(format!("{what} must not be missing")))
}

/// The kind a composite's profile must accept: audio+video if any layer
/// brings sound, video if any layer moves, otherwise image.
fn composite_kind(elements: &[&CompositeElement]) -> MediaKind {
    let kinds = || elements.iter().map(|e| e.media.kind);
    if kinds().any(|k| k == MediaKind::AudioVideo) {
        MediaKind::AudioVideo
    } else if kinds().any(MediaKind::has_video) {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}
