//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub execution: ExecutionConfig,
    pub profiles: ProfilesConfig,
    pub storage: StorageConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.execution.max_concurrent_tasks == 0 {
            warnings.push("execution.max_concurrent_tasks is 0; no task would ever run".into());
        }
        if self.execution.poll_interval_ms == 0 {
            warnings.push("execution.poll_interval_ms is 0; barrier waits will spin".into());
        }
        if self.execution.wait_timeout_secs == Some(0) {
            warnings.push("execution.wait_timeout_secs is 0; every wait times out immediately".into());
        }
        if self.profiles.paths.is_empty() {
            warnings.push("profiles.paths is empty; no encoding profiles will be loaded".into());
        }
        for (i, path) in self.profiles.paths.iter().enumerate() {
            if !path.exists() {
                warnings.push(format!("profiles.paths[{i}] does not exist: {}", path.display()));
            }
        }
        if self.storage.default_collection.trim().is_empty() {
            warnings.push("storage.default_collection is empty".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Execution layer and barrier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum number of tasks the in-process execution layer runs at once.
    pub max_concurrent_tasks: usize,
    /// Barrier poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Optional barrier timeout in seconds (`None` waits indefinitely).
    pub wait_timeout_secs: Option<u64>,
    /// Per-invocation timeout for external tools, in seconds.
    pub tool_timeout_secs: u64,
}

impl ExecutionConfig {
    /// Barrier poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Barrier timeout as a [`Duration`], if set.
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }

    /// External tool timeout as a [`Duration`].
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            poll_interval_ms: 500,
            wait_timeout_secs: None,
            tool_timeout_secs: 3600,
        }
    }
}

/// Where encoding profile descriptors are loaded from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilesConfig {
    /// Profile files or directories containing `*.toml` descriptors.
    pub paths: Vec<PathBuf>,
}

/// Filesystem asset store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for stored task outputs.
    pub root: PathBuf,
    /// Collection used when a call does not name one.
    pub default_collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/assets"),
            default_collection: "composer".into(),
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.execution.max_concurrent_tasks, 4);
        assert_eq!(cfg.execution.poll_interval(), Duration::from_millis(500));
        assert!(cfg.execution.wait_timeout().is_none());
        assert_eq!(cfg.storage.default_collection, "composer");
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg = Config::from_json(
            r#"{"execution": {"poll_interval_ms": 50, "wait_timeout_secs": 30}}"#,
        )
        .unwrap();
        assert_eq!(cfg.execution.poll_interval_ms, 50);
        assert_eq!(cfg.execution.wait_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.execution.tool_timeout_secs, 3600);
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_missing_file_falls_back() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/mediaforge.json")));
        assert_eq!(cfg.execution.max_concurrent_tasks, 4);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"execution": {"max_concurrent_tasks": 9}}"#).unwrap();
        let cfg = Config::load_or_default(Some(&path));
        assert_eq!(cfg.execution.max_concurrent_tasks, 9);
    }

    #[test]
    fn validate_flags_problems() {
        let mut cfg = Config::default();
        cfg.execution.max_concurrent_tasks = 0;
        cfg.profiles.paths.push(PathBuf::from("/nonexistent/profiles"));
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("max_concurrent_tasks")));
        assert!(warnings.iter().any(|w| w.contains("profiles.paths[0]")));
    }
}
