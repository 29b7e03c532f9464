//! Per-tool pattern files.
//!
//! A tool config lists the regexes that mark a CLI as waiting for input or thinking, and
//! how long the output must stay quiet before the tool counts as idle. Files are looked up
//! as `<dir>/<tool>.yaml`, then `<dir>/default.yaml`, then built-in defaults.

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const DEFAULT_IDLE_THRESHOLD_MS: u64 = 500;
const DEFAULT_CONFIG_NAME: &str = "default";

/// Regex sources grouped by the state they signal. Order matters within each list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternLists {
    #[serde(default)]
    pub waiting: Vec<String>,
    #[serde(default)]
    pub thinking: Vec<String>,
}

/// Where a [`ToolConfig`] was loaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    Tool(PathBuf),
    Default(PathBuf),
    #[default]
    BuiltIn,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Tool(path) => write!(f, "tool file {}", path.display()),
            ConfigSource::Default(path) => write!(f, "default file {}", path.display()),
            ConfigSource::BuiltIn => write!(f, "built-in defaults"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub patterns: PatternLists,
    #[serde(default = "default_idle_threshold_ms")]
    pub idle_threshold_ms: u64,
    /// Strip terminal escape sequences before matching.
    #[serde(default)]
    pub strip_ansi: bool,
    #[serde(skip)]
    pub source: ConfigSource,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            patterns: PatternLists::default(),
            idle_threshold_ms: DEFAULT_IDLE_THRESHOLD_MS,
            strip_ansi: false,
            source: ConfigSource::BuiltIn,
        }
    }
}

fn default_idle_threshold_ms() -> u64 {
    DEFAULT_IDLE_THRESHOLD_MS
}

impl ToolConfig {
    pub fn parse(raw: &str) -> Result<Self> {
        if is_blank_yaml(raw) {
            return Ok(Self::default());
        }
        let config: ToolConfig = serde_yaml::from_str(raw)?;
        Ok(config)
    }
}

/// Resolve the config for `tool_name`, falling back to `default.yaml` and then to the
/// built-in defaults. Only "not found" falls through; anything else is an error.
pub fn load_config(config_dir: &Path, tool_name: &str) -> Result<ToolConfig> {
    let tool_path = config_dir.join(format!("{tool_name}.yaml"));
    if let Some(mut config) = read_config_file(&tool_path)? {
        config.source = ConfigSource::Tool(tool_path);
        return Ok(config);
    }

    let default_path = config_dir.join(format!("{DEFAULT_CONFIG_NAME}.yaml"));
    if let Some(mut config) = read_config_file(&default_path)? {
        config.source = ConfigSource::Default(default_path);
        return Ok(config);
    }

    Ok(ToolConfig::default())
}

fn read_config_file(path: &Path) -> Result<Option<ToolConfig>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read config {}", path.display()))
        }
    };
    let config = ToolConfig::parse(&raw)
        .with_context(|| format!("malformed config {}", path.display()))?;
    Ok(Some(config))
}

fn is_blank_yaml(raw: &str) -> bool {
    raw.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---"
    })
}
