//! Configuration module
//!
//! Merges command-line flags, `TESTLANE_*` environment variables and the
//! configuration file, in that order of precedence, over built-in defaults.

mod env;
mod file;

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub use env::EnvConfig;
pub use file::{CommandTemplate, ConfigFile};

use crate::distributor::DEFAULT_SHUTDOWN_GRACE;
use crate::output::{OutputFormat, WriterSpec};

/// Values given explicitly on the command line
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub workers: Option<usize>,
    pub formatter: Option<String>,
    pub stop_on_error: bool,
    pub memory_tracking: Option<bool>,
    pub worker_args: Vec<String>,
    pub command: Vec<String>,
    pub writers: Vec<String>,
    pub manifest: Option<PathBuf>,
    pub record_dir: Option<PathBuf>,
}

/// Effective settings for one invocation
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub workers: usize,
    pub formatter: OutputFormat,
    pub stop_on_error: bool,
    pub memory_tracking: bool,
    pub worker_args: Vec<String>,
    pub shutdown_grace: Duration,
    pub command: Vec<String>,
    pub writers: Vec<WriterSpec>,
    pub manifest: Option<PathBuf>,
    pub record_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            formatter: OutputFormat::Lane,
            stop_on_error: false,
            memory_tracking: false,
            worker_args: Vec::new(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            command: Vec::new(),
            writers: Vec::new(),
            manifest: None,
            record_dir: None,
        }
    }
}

/// One more worker than there are CPUs, so a lane blocked on I/O does not
/// leave a core idle.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() + 1)
        .unwrap_or(2)
}

impl AppConfig {
    /// Merge the three sources over the defaults and validate the result.
    pub fn resolve(cli: Overrides, env: &EnvConfig, file: ConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let formatter_name = cli
            .formatter
            .or_else(|| env.format.clone())
            .or(file.formatter);
        let formatter = match formatter_name {
            Some(name) => OutputFormat::parse(&name)?,
            None => defaults.formatter,
        };

        let writer_specs = if cli.writers.is_empty() {
            file.writers
        } else {
            cli.writers
        };
        let writers = writer_specs
            .iter()
            .map(|spec| WriterSpec::parse(spec))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let command = if cli.command.is_empty() {
            file.command
                .map(CommandTemplate::into_argv)
                .unwrap_or_default()
        } else {
            cli.command
        };

        let config = Self {
            workers: cli
                .workers
                .or(env.workers)
                .or(file.workers)
                .unwrap_or(defaults.workers),
            formatter,
            stop_on_error: cli.stop_on_error
                || env.stop_on_error.or(file.stop_on_error).unwrap_or(false),
            memory_tracking: cli
                .memory_tracking
                .or(env.memory_tracking)
                .or(file.memory_tracking)
                .unwrap_or(defaults.memory_tracking),
            worker_args: if cli.worker_args.is_empty() {
                file.worker_args.unwrap_or_default()
            } else {
                cli.worker_args
            },
            shutdown_grace: file
                .shutdown_grace_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_grace),
            command,
            writers,
            manifest: cli.manifest.or(file.manifest),
            record_dir: cli.record_dir.or(file.record_dir),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("At least one worker is required");
        }
        Ok(())
    }

    /// The test command template; live runs cannot start without one.
    pub fn require_command(&self) -> Result<&[String]> {
        if self.command.is_empty() {
            bail!("No test command configured; pass one after `--` or set `command` in the config file");
        }
        Ok(&self.command)
    }
}
