//! Environment variable configuration
//!
//! Provides `TESTLANE_*` overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "TESTLANE";

/// Overrides read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Worker count from TESTLANE_WORKERS
    pub workers: Option<usize>,
    /// Formatter from TESTLANE_FORMAT
    pub format: Option<String>,
    /// Stop on first failure from TESTLANE_STOP_ON_ERROR
    pub stop_on_error: Option<bool>,
    /// Config file from TESTLANE_CONFIG
    pub config_file: Option<String>,
    /// Log level from TESTLANE_LOG
    pub log: Option<String>,
    /// Memory tracking from TESTLANE_MEMORY_TRACKING
    pub memory_tracking: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            workers: get_env_parse("WORKERS"),
            format: get_env("FORMAT"),
            stop_on_error: get_env_bool("STOP_ON_ERROR"),
            config_file: get_env("CONFIG"),
            log: get_env("LOG"),
            memory_tracking: get_env_bool("MEMORY_TRACKING"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.workers.is_some()
            || self.format.is_some()
            || self.stop_on_error.is_some()
            || self.config_file.is_some()
            || self.log.is_some()
            || self.memory_tracking.is_some()
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "enabled"
    )
}

/// Builder for setting environment variables (useful for testing)
#[cfg(test)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    pub fn set(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}
