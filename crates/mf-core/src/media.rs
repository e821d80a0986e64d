//! Media model: kinds, references, and pixel dimensions.
//!
//! Enums serialize in lowercase and implement `Display` manually for a
//! consistent string representation in logs and command templates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// What kind of content a media reference carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio only.
    Audio,
    /// Video only.
    Video,
    /// Audio and video.
    #[serde(rename = "audiovisual")]
    AudioVideo,
    /// Still image.
    Image,
}

impl MediaKind {
    /// All kinds, in declaration order.
    pub const ALL: [MediaKind; 4] = [
        MediaKind::Audio,
        MediaKind::Video,
        MediaKind::AudioVideo,
        MediaKind::Image,
    ];

    /// Whether the media carries a moving picture.
    pub fn has_video(self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::AudioVideo)
    }

    /// Whether the media carries sound.
    pub fn has_audio(self) -> bool {
        matches!(self, MediaKind::Audio | MediaKind::AudioVideo)
    }

    /// Whether the media has a visual plane (video or still).
    pub fn is_visual(self) -> bool {
        self.has_video() || self == MediaKind::Image
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
            Self::AudioVideo => write!(f, "audiovisual"),
            Self::Image => write!(f, "image"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "audiovisual" | "audio-video" | "av" => Ok(Self::AudioVideo),
            "image" => Ok(Self::Image),
            other => Err(Error::Config(format!("unknown media kind '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Dimension
// ---------------------------------------------------------------------------

/// Pixel size of a canvas or element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    /// Create a dimension without validation.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Create a dimension, rejecting a zero width or height.
    pub fn try_new(width: u32, height: u32) -> Result<Self> {
        let dim = Self::new(width, height);
        if dim.is_empty() {
            return Err(Error::illegal_input(format!(
                "dimension {dim} must have a positive width and height"
            )));
        }
        Ok(dim)
    }

    /// Whether either side is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Dimension {
    type Err = Error;

    /// Parse `WIDTHxHEIGHT`, e.g. `1920x1080`.
    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::illegal_input(format!("expected WIDTHxHEIGHT, got '{s}'")))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::illegal_input(format!("bad width '{w}': {e}")))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|e| Error::illegal_input(format!("bad height '{h}': {e}")))?;
        Self::try_new(width, height)
    }
}

// ---------------------------------------------------------------------------
// MediaReference
// ---------------------------------------------------------------------------

/// Immutable descriptor of an audio/video/image asset.
///
/// Produced by inspection and consumed by the orchestrator. Task result
/// payloads are serialized `MediaReference`s of the produced asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaReference {
    /// Opaque identifier.
    pub id: String,
    /// Location understood by the asset store.
    pub uri: String,
    /// Content kind.
    pub kind: MediaKind,
    /// Container format / extension (e.g. "mp4").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// MIME type (e.g. "video/mp4").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Frame size for visual media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Dimension>,
    /// Duration in seconds for time-based media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl MediaReference {
    /// Create a reference with only the mandatory fields.
    pub fn new(id: impl Into<String>, uri: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            kind,
            container: None,
            mime_type: None,
            dimension: None,
            duration_secs: None,
        }
    }

    /// Builder: set the frame size.
    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Builder: set container and MIME type.
    pub fn with_container(mut self, container: impl Into<String>, mime_type: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Builder: set the duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_serde() {
        let json = serde_json::to_string(&MediaKind::AudioVideo).unwrap();
        assert_eq!(json, "\"audiovisual\"");
        let back: MediaKind = serde_json::from_str("\"image\"").unwrap();
        assert_eq!(back, MediaKind::Image);
    }

    #[test]
    fn media_kind_capabilities() {
        assert!(MediaKind::AudioVideo.has_audio());
        assert!(MediaKind::AudioVideo.has_video());
        assert!(!MediaKind::Audio.is_visual());
        assert!(MediaKind::Image.is_visual());
        assert!(!MediaKind::Image.has_video());
    }

    #[test]
    fn media_kind_from_str_aliases() {
        assert_eq!("audio-video".parse::<MediaKind>().unwrap(), MediaKind::AudioVideo);
        assert_eq!(" Video ".parse::<MediaKind>().unwrap(), MediaKind::Video);
        assert!("subtitle".parse::<MediaKind>().is_err());
    }

    #[test]
    fn dimension_parse() {
        let dim: Dimension = "1920x1080".parse().unwrap();
        assert_eq!(dim, Dimension::new(1920, 1080));
        assert_eq!(dim.to_string(), "1920x1080");
        assert!("0x10".parse::<Dimension>().is_err());
        assert!("wide".parse::<Dimension>().is_err());
    }

    #[test]
    fn dimension_try_new_rejects_empty() {
        assert!(Dimension::try_new(10, 0).is_err());
        assert!(Dimension::try_new(10, 10).is_ok());
    }

    #[test]
    fn reference_serialization_skips_unset_fields() {
        let r = MediaReference::new("track-1", "file:///media/a.mp4", MediaKind::Video);
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("dimension"));

        let r = r
            .with_dimension(Dimension::new(640, 480))
            .with_container("mp4", "video/mp4");
        let back: MediaReference = serde_json::from_str(&serde_json::to_string(&r).unwrap()).unwrap();
        assert_eq!(back, r);
    }
}
