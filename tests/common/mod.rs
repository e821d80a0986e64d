//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], a full [`App`] whose worker and inspector are
//! scripted fakes, so every flow runs without ffmpeg. A source id of the form
//! `fail:<ms>` or `ok:<ms>` scripts how the worker treats tasks reading it.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use mediaforge::App;
use mf_av::Inspector;
use mf_core::config::Config;
use mf_core::{Dimension, Error, MediaKind, MediaReference, Result, TaskId};
use mf_jobs::{Operation, Task, TaskWorker, WaitOptions};
use mf_profile::{EncodingProfile, ProfileRegistry};

/// Fake worker: sleeps as scripted, then produces one output per expected
/// result (one per still time, one per variant, otherwise one).
#[derive(Default)]
pub struct ScriptedWorker {
    pub runs: AtomicUsize,
    pub seen: Mutex<Vec<TaskId>>,
}

#[async_trait]
impl TaskWorker for ScriptedWorker {
    async fn run(&self, task: &Task, cancel: CancellationToken) -> Result<Vec<MediaReference>> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(task.id);

        let script = task.descriptor.operation.inputs()[0].id.clone();
        let (verdict, ms) = script.split_once(':').unwrap_or(("ok", "5"));
        let delay = Duration::from_millis(ms.parse().unwrap_or(5));
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return Err(Error::tool("ffmpeg", "canceled")),
        }
        if verdict == "fail" {
            return Err(Error::tool("ffmpeg", "exited with status 1: scripted failure"));
        }

        let profile = &task.descriptor.profile;
        let names: Vec<String> = match &task.descriptor.operation {
            Operation::Still { times, .. } => (0..times.len())
                .map(|i| format!("{}-{i}{}", task.id, profile.suffix))
                .collect(),
            Operation::ParallelEncode { .. } if !profile.variants.is_empty() => profile
                .variants
                .iter()
                .map(|v| format!("{}{}", task.id, v.suffix))
                .collect(),
            _ => vec![format!("{}{}", task.id, profile.suffix)],
        };
        Ok(names
            .into_iter()
            .map(|name| {
                MediaReference::new(
                    name.clone(),
                    format!("file:///assets/{}/{name}", task.descriptor.collection),
                    profile.output,
                )
            })
            .collect())
    }
}

/// Fake inspector: derives the kind from the file extension.
pub struct ExtensionInspector;

#[async_trait]
impl Inspector for ExtensionInspector {
    async fn inspect(&self, uri: &str) -> Result<MediaReference> {
        let path = mf_av::probe::local_path(uri);
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let kind = match ext {
            "png" | "jpg" => MediaKind::Image,
            "m4a" | "mp3" => MediaKind::Audio,
            "mov" => MediaKind::AudioVideo,
            "mp4" => MediaKind::Video,
            other => return Err(Error::InspectionFailed(format!("unsupported extension '{other}'"))),
        };
        let id = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let mut media = MediaReference::new(id, uri, kind).with_dimension(Dimension::new(640, 360));
        if kind != MediaKind::Image {
            media = media.with_duration(30.0);
        }
        Ok(media)
    }
}

/// The profile set the integration tests run against.
pub fn standard_profiles() -> Vec<EncodingProfile> {
    vec![
        EncodingProfile::new("av.work", MediaKind::AudioVideo, "-work.mp4", "-c copy"),
        EncodingProfile::new("composite.work", MediaKind::AudioVideo, "-composite.mp4", "-c:v libx264")
            .accepting([MediaKind::Video, MediaKind::AudioVideo, MediaKind::Image]),
        EncodingProfile::new("concat.work", MediaKind::AudioVideo, "-concat.mp4", "-c:v libx264")
            .accepting([MediaKind::Video, MediaKind::AudioVideo]),
        EncodingProfile::new("image-movie.work", MediaKind::Video, "-movie.mp4", "-c:v libx264")
            .accepting([MediaKind::Image]),
        EncodingProfile::new("player-preview.http", MediaKind::Image, "-preview.jpg", "-q:v 2")
            .accepting([MediaKind::Video, MediaKind::AudioVideo])
            .with_mime_type("image/jpeg"),
        EncodingProfile::new("multi.http", MediaKind::Video, "-multi.mp4", "")
            .accepting([MediaKind::Video, MediaKind::AudioVideo])
            .with_variant("-hi.mp4", "-b:v 4M")
            .with_variant("-lo.mp4", "-b:v 1M"),
    ]
}

pub struct TestHarness {
    pub app: App,
    pub worker: Arc<ScriptedWorker>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let profiles = Arc::new(
            ProfileRegistry::from_profiles(standard_profiles()).expect("standard profiles are valid"),
        );
        let worker = Arc::new(ScriptedWorker::default());
        let app = App::new(config, profiles, worker.clone(), Arc::new(ExtensionInspector));
        Self { app, worker }
    }

    pub fn runs(&self) -> usize {
        self.worker.runs.load(Ordering::SeqCst)
    }
}

/// Short poll interval and a generous timeout.
pub fn fast_wait() -> WaitOptions {
    WaitOptions::new(Duration::from_millis(10)).with_timeout(Duration::from_secs(5))
}

pub fn media(id: &str, kind: MediaKind) -> MediaReference {
    MediaReference::new(id, format!("file:///media/{id}"), kind)
        .with_dimension(Dimension::new(300, 300))
        .with_duration(30.0)
}

/// Write an empty file named `name` under `dir` and return its path.
pub fn touch(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").expect("write fixture");
    path
}
