//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./testlane.yaml",
    "./testlane.yml",
    "./.testlane.yaml",
    "~/.config/testlane/config.yaml",
];

const SUPPORTED_VERSIONS: &[&str] = &["1"];

/// Test command as written in a config file: a shell line or an argv list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandTemplate {
    Shell(String),
    Argv(Vec<String>),
}

impl CommandTemplate {
    /// Argument vector; a shell line runs through `/bin/sh -c`.
    pub fn into_argv(self) -> Vec<String> {
        match self {
            CommandTemplate::Shell(line) => vec!["/bin/sh".to_string(), "-c".to_string(), line],
            CommandTemplate::Argv(argv) => argv,
        }
    }
}

/// Settings read from a configuration file. Absent keys defer to defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    pub workers: Option<usize>,
    pub formatter: Option<String>,
    pub stop_on_error: Option<bool>,
    pub memory_tracking: Option<bool>,

    /// Launcher prefix for each worker, e.g. `[nice, -n, "10"]`
    pub worker_args: Option<Vec<String>>,

    pub shutdown_grace_secs: Option<u64>,
    pub command: Option<CommandTemplate>,

    /// Extra `format:file` reporters
    #[serde(default)]
    pub writers: Vec<String>,

    pub manifest: Option<PathBuf>,
    pub record_dir: Option<PathBuf>,
}

fn default_version() -> String {
    "1".to_string()
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_json_file(path) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }
        if self.workers == Some(0) {
            anyhow::bail!("Config sets workers to 0; at least one worker is required");
        }
        if let Some(CommandTemplate::Argv(argv)) = &self.command {
            if argv.is_empty() {
                anyhow::bail!("Config sets an empty test command");
            }
        }
        Ok(())
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn is_json_file(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}
