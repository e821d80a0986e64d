//! External tool detection.
//!
//! The [`ToolRegistry`] finds ffmpeg and ffprobe once at startup (config
//! override first, then `PATH`) and hands out ready-to-run commands.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mf_core::config::ToolsConfig;
use mf_core::{Error, Result};

use crate::command::ToolCommand;

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";

const KNOWN_TOOLS: &[&str] = &[FFMPEG, FFPROBE];

/// Resolved location of one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    pub path: PathBuf,
}

/// Availability report returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `-version` output.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Discover tools. A configured path is used when it exists; otherwise
    /// the tool is looked up on `PATH`. Missing tools are simply absent.
    pub fn discover(tools_config: &ToolsConfig, timeout: Duration) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                FFMPEG => tools_config.ffmpeg_path.as_deref(),
                FFPROBE => tools_config.ffprobe_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(tool = name, path = %p.display(), "Configured tool path missing, searching PATH");
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            match resolved {
                Some(path) => {
                    tracing::debug!(tool = name, path = %path.display(), "Tool found");
                    tools.insert(
                        name.to_string(),
                        ToolConfig {
                            name: name.to_string(),
                            path,
                        },
                    );
                }
                None => tracing::warn!(tool = name, "Tool not found"),
            }
        }

        Self { tools, timeout }
    }

    /// Registry with explicit tool paths, no discovery.
    pub fn with_tools(
        tools: impl IntoIterator<Item = (&'static str, PathBuf)>,
        timeout: Duration,
    ) -> Self {
        let tools = tools
            .into_iter()
            .map(|(name, path)| {
                (
                    name.to_string(),
                    ToolConfig {
                        name: name.to_string(),
                        path,
                    },
                )
            })
            .collect();
        Self { tools, timeout }
    }

    /// The tool's config, or [`Error::Tool`] if it was not found.
    pub fn require(&self, name: &str) -> Result<&ToolConfig> {
        self.tools
            .get(name)
            .ok_or_else(|| Error::tool(name, format!("{name} not found; is it installed and in PATH?")))
    }

    /// A command for `name` carrying the registry's timeout.
    pub fn command(&self, name: &str) -> Result<ToolCommand> {
        let tool = self.require(name)?;
        let mut cmd = ToolCommand::new(tool.path.clone());
        cmd.timeout(self.timeout);
        Ok(cmd)
    }

    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(&cfg.path),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// `<tool> -version`, first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
