//! Task model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use mf_core::{Dimension, MediaReference, Result, TaskId};
use mf_layout::PlacedShape;
use mf_profile::EncodingProfile;

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Canceled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Canceled)
    }

    /// Allowed moves: queued -> running -> terminal, or queued straight to a
    /// terminal state. Nothing leaves a terminal state.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        match self {
            Self::Queued => next != Self::Queued,
            Self::Running => next.is_terminal(),
            Self::Finished | Self::Failed | Self::Canceled => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
            Self::Failed => write!(f, "failed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation / TaskDescriptor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Encode,
    Mux,
    ParallelEncode,
    Composite,
    Concat,
    ImageToVideo,
    Still,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Encode => "encode",
            Self::Mux => "mux",
            Self::ParallelEncode => "parallel_encode",
            Self::Composite => "composite",
            Self::Concat => "concat",
            Self::ImageToVideo => "image_to_video",
            Self::Still => "still",
        };
        f.write_str(s)
    }
}

/// A composite layer with its resolved placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedMedia {
    pub media: MediaReference,
    pub shape: PlacedShape,
}

/// What a task produces, with all inputs resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    Encode {
        source: MediaReference,
    },
    Mux {
        audio: MediaReference,
        video: MediaReference,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        options: BTreeMap<String, String>,
    },
    /// One output per profile variant, collapsed into one task.
    ParallelEncode {
        source: MediaReference,
    },
    /// Layers bottom to top.
    Composite {
        canvas: Dimension,
        background: String,
        layers: Vec<PlacedMedia>,
    },
    Concat {
        canvas: Dimension,
        /// `None` leaves the rate to the worker.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_rate: Option<f32>,
        sources: Vec<MediaReference>,
    },
    ImageToVideo {
        image: MediaReference,
        duration_secs: f64,
    },
    /// One still per time offset.
    Still {
        source: MediaReference,
        times: Vec<f64>,
    },
}

impl Operation {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Encode { .. } => TaskKind::Encode,
            Self::Mux { .. } => TaskKind::Mux,
            Self::ParallelEncode { .. } => TaskKind::ParallelEncode,
            Self::Composite { .. } => TaskKind::Composite,
            Self::Concat { .. } => TaskKind::Concat,
            Self::ImageToVideo { .. } => TaskKind::ImageToVideo,
            Self::Still { .. } => TaskKind::Still,
        }
    }

    /// Input references in processing order.
    pub fn inputs(&self) -> Vec<&MediaReference> {
        match self {
            Self::Encode { source } | Self::ParallelEncode { source } | Self::Still { source, .. } => {
                vec![source]
            }
            Self::Mux { audio, video, .. } => vec![video, audio],
            Self::Composite { layers, .. } => layers.iter().map(|l| &l.media).collect(),
            Self::Concat { sources, .. } => sources.iter().collect(),
            Self::ImageToVideo { image, .. } => vec![image],
        }
    }
}

/// Everything the execution layer needs to run one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub operation: Operation,
    pub profile: EncodingProfile,
    /// Asset store collection receiving the outputs.
    pub collection: String,
}

impl TaskDescriptor {
    pub fn new(operation: Operation, profile: EncodingProfile, collection: impl Into<String>) -> Self {
        Self {
            operation,
            profile,
            collection: collection.into(),
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.operation.kind()
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A unit of work as seen by the execution layer.
///
/// The transition methods return `false` and leave the task untouched when
/// the move is not allowed, so a terminal task is never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub descriptor: TaskDescriptor,
    pub status: TaskStatus,
    /// Produced media, filled on success.
    #[serde(default)]
    pub result: Vec<MediaReference>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(descriptor: TaskDescriptor) -> Self {
        Self {
            id: TaskId::new(),
            descriptor,
            status: TaskStatus::Queued,
            result: Vec::new(),
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.descriptor.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        true
    }

    pub fn start(&mut self) -> bool {
        let moved = self.transition(TaskStatus::Running);
        if moved {
            self.started_at = Some(Utc::now());
        }
        moved
    }

    pub fn finish(&mut self, result: Vec<MediaReference>) -> bool {
        let moved = self.transition(TaskStatus::Finished);
        if moved {
            self.result = result;
        }
        moved
    }

    pub fn fail(&mut self, error: &str) -> bool {
        let moved = self.transition(TaskStatus::Failed);
        if moved {
            self.error = Some(error.to_string());
        }
        moved
    }

    pub fn cancel(&mut self) -> bool {
        self.transition(TaskStatus::Canceled)
    }

    /// Serialized descriptor of the produced media: a single object for one
    /// output, an array for several, `None` until the task finished.
    pub fn payload_json(&self) -> Result<Option<String>> {
        if self.status != TaskStatus::Finished {
            return Ok(None);
        }
        let json = match self.result.as_slice() {
            [single] => serde_json::to_string(single)?,
            many => serde_json::to_string(many)?,
        };
        Ok(Some(json))
    }
}
