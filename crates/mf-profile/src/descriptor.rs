//! Profile sources.
//!
//! The on-disk format is TOML, one or more `[[profile]]` tables per file:
//!
//! ```toml
//! [[profile]]
//! id = "feed-image.http"
//! name = "Feed image"
//! input = ["visual"]
//! output = "image"
//! suffix = "-feed.jpg"
//! mime_type = "image/jpeg"
//! command = "-q:v 2"
//!
//! [[profile.variants]]
//! suffix = "-feed-small.jpg"
//! command = "-q:v 4 -vf scale=320:-2"
//! ```
//!
//! `command` holds ffmpeg output options; inputs, filters and stream maps
//! are supplied per operation.
//!
//! `input` accepts media kinds plus the aliases `stream` (audio, video and
//! audiovisual) and `visual` (video and audiovisual). Leaving it out accepts
//! every kind.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use mf_core::{Error, MediaKind, Result};

use crate::profile::{EncodingProfile, ProfileVariant};

/// Bulk provider of profiles.
pub trait ProfileSource: Send + Sync {
    fn load(&self) -> Result<Vec<EncodingProfile>>;
}

/// In-memory source.
#[derive(Debug, Clone, Default)]
pub struct StaticProfileSource(pub Vec<EncodingProfile>);

impl ProfileSource for StaticProfileSource {
    fn load(&self) -> Result<Vec<EncodingProfile>> {
        Ok(self.0.clone())
    }
}

/// Reads `*.toml` descriptors from files and directories (recursively).
#[derive(Debug, Clone, Default)]
pub struct TomlProfileSource {
    paths: Vec<PathBuf>,
}

impl TomlProfileSource {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    fn descriptor_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for root in &self.paths {
            if root.is_file() {
                files.push(root.clone());
                continue;
            }
            if !root.exists() {
                tracing::warn!(path = %root.display(), "Profile path does not exist, skipping");
                continue;
            }
            let walker = walkdir::WalkDir::new(root)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| match e {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        tracing::warn!(error = %err, "Error walking profile directory");
                        None
                    }
                });
            for entry in walker {
                let path = entry.path();
                if entry.file_type().is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some("toml")
                {
                    files.push(path.to_path_buf());
                }
            }
        }
        files
    }
}

impl ProfileSource for TomlProfileSource {
    fn load(&self) -> Result<Vec<EncodingProfile>> {
        let mut profiles = Vec::new();
        for file in self.descriptor_files() {
            let loaded = parse_file(&file)?;
            tracing::debug!(path = %file.display(), count = loaded.len(), "Loaded profile descriptors");
            profiles.extend(loaded);
        }
        Ok(profiles)
    }
}

fn parse_file(path: &Path) -> Result<Vec<EncodingProfile>> {
    let content = std::fs::read_to_string(path)?;
    parse_descriptors(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), config_message(e))))
}

fn config_message(err: Error) -> String {
    match err {
        Error::Config(msg) => msg,
        other => other.to_string(),
    }
}

/// Parse a TOML document holding `[[profile]]` tables.
pub fn parse_descriptors(content: &str) -> Result<Vec<EncodingProfile>> {
    let file: DescriptorFile =
        toml::from_str(content).map_err(|e| Error::Config(format!("profile parse error: {e}")))?;
    file.profile.into_iter().map(Descriptor::into_profile).collect()
}

#[derive(Debug, Deserialize)]
struct DescriptorFile {
    #[serde(default)]
    profile: Vec<Descriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Descriptor {
    id: String,
    name: Option<String>,
    input: Option<Vec<String>>,
    output: String,
    suffix: String,
    mime_type: Option<String>,
    command: String,
    #[serde(default)]
    variants: Vec<ProfileVariant>,
    #[serde(default)]
    params: BTreeMap<String, String>,
}

impl Descriptor {
    fn into_profile(self) -> Result<EncodingProfile> {
        if self.id.trim().is_empty() {
            return Err(Error::Config("profile id must not be empty".into()));
        }
        let applicable = match &self.input {
            None => MediaKind::ALL.into_iter().collect(),
            Some(tags) => expand_input_tags(tags)?,
        };
        if applicable.is_empty() {
            return Err(Error::Config(format!("profile {} accepts no input", self.id)));
        }
        let output = self
            .output
            .parse::<MediaKind>()
            .map_err(|e| Error::Config(format!("profile {}: {}", self.id, config_message(e))))?;

        Ok(EncodingProfile {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            identifier: self.id,
            applicable,
            output,
            suffix: self.suffix,
            mime_type: self.mime_type,
            command: self.command,
            variants: self.variants,
            params: self.params,
        })
    }
}

fn expand_input_tags(tags: &[String]) -> Result<BTreeSet<MediaKind>> {
    let mut kinds = BTreeSet::new();
    for tag in tags {
        match tag.trim().to_ascii_lowercase().as_str() {
            "stream" => kinds.extend([MediaKind::Audio, MediaKind::Video, MediaKind::AudioVideo]),
            "visual" => kinds.extend([MediaKind::Video, MediaKind::AudioVideo]),
            other => {
                kinds.insert(other.parse::<MediaKind>()?);
            }
        }
    }
    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const FEED: &str = r#"
[[profile]]
id = "feed-image.http"
name = "Feed image"
input = ["visual"]
output = "image"
suffix = "-feed.jpg"
mime_type = "image/jpeg"
command = "-q:v 2"

[[profile.variants]]
suffix = "-feed-small.jpg"
command = "-q:v 4 -vf scale=320:-2"

[[profile]]
id = "audio-only.work"
input = ["audio"]
output = "audio"
suffix = "-work.m4a"
command = "-vn -c:a aac -b:a {bitrate}"
params = { bitrate = "128k" }
"#;

    #[test]
    fn parses_multiple_profiles() {
        let profiles = parse_descriptors(FEED).unwrap();
        assert_eq!(profiles.len(), 2);

        let feed = &profiles[0];
        assert_eq!(feed.identifier, "feed-image.http");
        assert_eq!(feed.output, MediaKind::Image);
        assert!(feed.accepts(MediaKind::Video));
        assert!(feed.accepts(MediaKind::AudioVideo));
        assert!(!feed.accepts(MediaKind::Audio));
        assert_eq!(feed.variants.len(), 1);

        let audio = &profiles[1];
        assert_eq!(audio.name, "audio-only.work");
        assert_eq!(audio.mime_type, None);
    }

    #[test]
    fn stream_alias_and_missing_input() {
        let profiles = parse_descriptors(
            r#"
[[profile]]
id = "s"
input = ["stream"]
output = "video"
suffix = ".mp4"
command = ""

[[profile]]
id = "any"
output = "video"
suffix = ".mp4"
command = ""
"#,
        )
        .unwrap();
        assert!(profiles[0].accepts(MediaKind::Audio));
        assert!(!profiles[0].accepts(MediaKind::Image));
        for kind in MediaKind::ALL {
            assert!(profiles[1].accepts(kind));
        }
    }

    #[test]
    fn unknown_tag_is_config_error() {
        let err = parse_descriptors(
            r#"
[[profile]]
id = "bad"
input = ["hologram"]
output = "video"
suffix = ".mp4"
command = ""
"#,
        )
        .unwrap_err();
        assert_matches!(err, Error::Config(_));
    }

    #[test]
    fn empty_input_list_rejected() {
        let err = parse_descriptors(
            r#"
[[profile]]
id = "none"
input = []
output = "video"
suffix = ".mp4"
command = ""
"#,
        )
        .unwrap_err();
        assert_matches!(err, Error::Config(msg) if msg.contains("accepts no input"));
    }

    #[test]
    fn loads_directory_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("feed.toml"), FEED).unwrap();
        std::fs::write(
            nested.join("mp4.toml"),
            "[[profile]]\nid = \"mp4\"\noutput = \"video\"\nsuffix = \".mp4\"\ncommand = \"\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let source = TomlProfileSource::new([dir.path().to_path_buf()]);
        let profiles = source.load().unwrap();
        let mut ids: Vec<_> = profiles.iter().map(|p| p.identifier.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, ["audio-only.work", "feed-image.http", "mp4"]);
    }

    #[test]
    fn file_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[[profile]]\nid = 3\n").unwrap();
        let err = TomlProfileSource::new([path]).load().unwrap_err();
        assert_matches!(err, Error::Config(msg) if msg.contains("broken.toml"));
    }
}
