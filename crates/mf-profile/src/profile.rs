//! Profile model.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use mf_core::MediaKind;

/// One extra output produced by a parallel encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileVariant {
    /// Suffix appended to the output name, including the extension.
    pub suffix: String,
    /// Command template for this variant.
    pub command: String,
}

/// Named descriptor of a target output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingProfile {
    pub identifier: String,
    pub name: String,
    /// Media kinds this profile accepts as input.
    pub applicable: BTreeSet<MediaKind>,
    /// Kind of the produced media.
    pub output: MediaKind,
    /// Output name suffix, e.g. `-work.mp4`.
    pub suffix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// ffmpeg argument template with `{var}` placeholders.
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<ProfileVariant>,
    /// Extra template variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl EncodingProfile {
    /// Profile accepting every media kind.
    pub fn new(
        identifier: impl Into<String>,
        output: MediaKind,
        suffix: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        let identifier = identifier.into();
        Self {
            name: identifier.clone(),
            identifier,
            applicable: MediaKind::ALL.into_iter().collect(),
            output,
            suffix: suffix.into(),
            mime_type: None,
            command: command.into(),
            variants: Vec::new(),
            params: BTreeMap::new(),
        }
    }

    /// Restrict the accepted input kinds.
    pub fn accepting(mut self, kinds: impl IntoIterator<Item = MediaKind>) -> Self {
        self.applicable = kinds.into_iter().collect();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_variant(mut self, suffix: impl Into<String>, command: impl Into<String>) -> Self {
        self.variants.push(ProfileVariant {
            suffix: suffix.into(),
            command: command.into(),
        });
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn accepts(&self, kind: MediaKind) -> bool {
        self.applicable.contains(&kind)
    }

    /// Container extension derived from the suffix (`-work.mp4` -> `mp4`).
    pub fn container(&self) -> Option<&str> {
        let (_, ext) = self.suffix.rsplit_once('.')?;
        (!ext.is_empty()).then_some(ext)
    }

    /// Whether a parallel encode of this profile fans out to several outputs.
    pub fn is_parallel(&self) -> bool {
        !self.variants.is_empty()
    }
}
