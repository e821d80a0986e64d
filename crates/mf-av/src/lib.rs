//! # mf-av
//!
//! The native tool step behind the execution layer.
//!
//! - **Tool discovery** ([`ToolRegistry`]) finds ffmpeg and ffprobe.
//! - **Command execution** ([`ToolCommand`]) runs a process with a timeout
//!   and optional cancellation.
//! - **Templates** ([`TemplateContext`]) expand profile option templates.
//! - **Argument builders** ([`ffmpeg`]) for encode, mux, still extraction,
//!   image-to-video, composite overlay and concatenation.
//! - **Inspection** ([`FfprobeInspector`]) turns a file into a
//!   [`mf_core::MediaReference`].
//! - **Workspace** ([`Workspace`]) scratch directory per task.

pub mod command;
pub mod ffmpeg;
pub mod probe;
pub mod template;
pub mod tools;
pub mod workspace;

pub use command::{ToolCommand, ToolOutput};
pub use ffmpeg::FfmpegArgs;
pub use probe::{FfprobeInspector, Inspector};
pub use template::TemplateContext;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::Workspace;
