//! Media inspection.
//!
//! [`FfprobeInspector`] shells out to
//! `ffprobe -v quiet -print_format json -show_format -show_streams` and maps
//! the result onto a [`MediaReference`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use mf_core::{Dimension, Error, MediaKind, MediaReference, Result};

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, FFPROBE};

/// Reads an asset and describes it.
#[async_trait]
pub trait Inspector: Send + Sync {
    /// # Errors
    ///
    /// [`Error::InspectionFailed`] when the media is missing, malformed or
    /// has no usable stream.
    async fn inspect(&self, uri: &str) -> Result<MediaReference>;
}

#[derive(Debug, Clone)]
pub struct FfprobeInspector {
    command: ToolCommand,
}

impl FfprobeInspector {
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self {
            command: ToolCommand::new(ffprobe_path),
        }
    }

    pub fn from_registry(tools: &ToolRegistry) -> Result<Self> {
        Ok(Self {
            command: tools.command(FFPROBE)?,
        })
    }
}

#[async_trait]
impl Inspector for FfprobeInspector {
    async fn inspect(&self, uri: &str) -> Result<MediaReference> {
        let path = local_path(uri);
        let mut cmd = self.command.clone();
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"]);
        cmd.arg(path.to_string_lossy());

        let output = cmd
            .execute()
            .await
            .map_err(|e| Error::InspectionFailed(format!("{uri}: {e}")))?;
        let ff: FfprobeOutput = serde_json::from_str(&output.stdout)
            .map_err(|e| Error::InspectionFailed(format!("{uri}: ffprobe JSON parse error: {e}")))?;

        let reference = describe(uri, &path, ff)?;
        tracing::debug!(uri, kind = %reference.kind, "Inspected media");
        Ok(reference)
    }
}

/// `file://` URIs and plain paths both map to a local path.
pub fn local_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    disposition: FfprobeDisposition,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

fn describe(uri: &str, path: &Path, output: FfprobeOutput) -> Result<MediaReference> {
    let format_name = output
        .format
        .as_ref()
        .and_then(|f| f.format_name.as_deref())
        .unwrap_or("");

    // Cover art is a video stream too; it does not make the file a video.
    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video") && s.disposition.attached_pic == 0);
    let has_audio = output
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let kind = match (video, has_audio) {
        (Some(_), _) if is_image_format(format_name) => MediaKind::Image,
        (Some(_), true) => MediaKind::AudioVideo,
        (Some(_), false) => MediaKind::Video,
        (None, true) => MediaKind::Audio,
        (None, false) => {
            return Err(Error::InspectionFailed(format!(
                "{uri}: no audio or video stream"
            )))
        }
    };

    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| uri.to_string());
    let mut reference = MediaReference::new(id, uri, kind);

    if let Some(dim) = video
        .and_then(|v| Some(Dimension::new(v.width?, v.height?)))
        .filter(|d| !d.is_empty())
    {
        reference = reference.with_dimension(dim);
    }
    if kind != MediaKind::Image {
        if let Some(secs) = output
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok())
        {
            reference = reference.with_duration(secs);
        }
    }
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_ascii_lowercase();
        let mime = mime_for(&ext, kind);
        reference = reference.with_container(ext, mime);
    }
    Ok(reference)
}

fn is_image_format(format_name: &str) -> bool {
    format_name == "image2" || format_name.ends_with("_pipe")
}

/// MIME type for a container extension.
pub fn mime_for(ext: &str, kind: MediaKind) -> String {
    let known = match ext {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "ts" => "video/mp2t",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "",
    };
    if !known.is_empty() {
        return known.to_string();
    }
    let top = match kind {
        MediaKind::Audio => "audio",
        MediaKind::Image => "image",
        MediaKind::Video | MediaKind::AudioVideo => "video",
    };
    format!("{top}/{ext}")
}
