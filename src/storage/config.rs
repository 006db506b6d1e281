//! Configuration handling for todo-md
//!
//! Configuration is stored in `.todo-md/config.yaml` next to the document
//! (project) and `config.yaml` in the platform config directory (global).
//! Project values override global ones key by key.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

/// Directory holding project state, next to the document
pub const STATE_DIR: &str = ".todo-md";

/// Config file name inside the state and global config directories
pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// How long deleted tasks are kept
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetentionConfig {
    /// Days before a deleted task expires
    pub deleted_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { deleted_days: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ParserConfig {
    /// Warn about lines that look like tasks but are kept as plain text
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Refuse to read documents changed outside todo-md
    pub enabled: bool,
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    pub retention: RetentionConfig,
    pub parser: ParserConfig,
    pub integrity: IntegrityConfig,
}

impl ProjectConfig {
    /// Retention window handed to delete operations
    pub fn retention(&self) -> Duration {
        Duration::days(i64::from(self.retention.deleted_days))
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.retention.deleted_days == 0 {
            return Err(ConfigError::Invalid(
                "retention.deleted_days must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration for the project rooted at `project_root`
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::read_yaml(Self::global_config_dir().map(|d| d.join(CONFIG_FILE)))?;
        let project = Self::read_yaml(Some(Self::project_config_path(project_root)))?;

        let mut config = Self::from_values(global, project)?;
        config.project_root = Some(project_root.to_path_buf());
        Ok(config)
    }

    /// Builds configuration from already-read YAML documents
    pub fn from_yaml(global: Option<&str>, project: Option<&str>) -> Result<Self, ConfigError> {
        let parse = |text: Option<&str>| -> Result<Value, ConfigError> {
            match text {
                Some(t) if !t.trim().is_empty() => {
                    serde_yaml::from_str(t).map_err(|e| ConfigError::Parse(e.to_string()))
                }
                _ => Ok(Value::Null),
            }
        };
        Self::from_values(parse(global)?, parse(project)?)
    }

    fn from_values(global: Value, project: Value) -> Result<Self, ConfigError> {
        let global_config: GlobalConfig = from_value(global.clone())?;
        let project_config: ProjectConfig = from_value(merge(global, project))?;

        Ok(Self {
            project: project_config.validate()?,
            global: global_config,
            project_root: None,
        })
    }

    fn read_yaml(path: Option<PathBuf>) -> Result<Value> {
        let Some(path) = path.filter(|p| p.exists()) else {
            return Ok(Value::Null);
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Loads only the global configuration, for commands run outside a project
    pub fn global() -> Result<GlobalConfig> {
        let value = Self::read_yaml(Self::global_config_dir().map(|d| d.join(CONFIG_FILE)))?;
        Ok(from_value(value)?)
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "todo-md", "todo-md").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn project_config_path(project_root: &Path) -> PathBuf {
        project_root.join(STATE_DIR).join(CONFIG_FILE)
    }

    /// Finds the project root by looking for `.todo-md/` from `start` upwards
    pub fn find_project_root(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(STATE_DIR).is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }
}

fn from_value<T: serde::de::DeserializeOwned + Default>(value: Value) -> Result<T, ConfigError> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_yaml::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Overlays `overlay` onto `base`, merging mappings recursively
fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Mapping(base)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}
