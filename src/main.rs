//! testlane - parallel unit test distributor
//!
//! Spreads a list of tests over a pool of worker processes, one test per
//! worker at a time, and merges the per-test outcomes into a single report
//! and exit status.
//!
//! ## Usage
//!
//! ```bash
//! # Run two tests on four workers, one shell command per test
//! testlane run -C 4 Suite::test_a Suite::test_b -- ./run-one '{class}::{name}'
//!
//! # Run a manifest, writing TAP to stdout and JSON to a file
//! testlane run -m tests.yaml -F tap -W json:results.json
//!
//! # Record each lane, then replay one of them
//! testlane run -m tests.yaml --record-dir lanes
//! testlane run --replay lanes/WorkerB.log
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

mod cli;
mod config;
mod distributor;
mod error;
mod events;
mod listeners;
mod locator;
mod models;
mod output;
mod protocol;
mod transport;
mod utils;
mod worker;

use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use distributor::{Distributor, DistributorConfig, ReplayLog, TestSource};
use error::RunnerError;
use listeners::{ExitStatus, ExitStatusListener, ReplayLogRecorder, StopOnErrorListener};
use models::TestUnit;
use output::StreamEcho;
use transport::{generate_token, WorkerSpec};
use utils::logger::{init_logger, LogLevel};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    let env = EnvConfig::load();
    init_logger(LogLevel::resolve(env.log.as_deref(), args.verbose));

    let code = match dispatch(args, env).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("testlane: {:#}", e);
            1
        }
    };

    std::process::exit(code);
}

async fn dispatch(args: Args, env: EnvConfig) -> Result<i32> {
    match args.command {
        cli::Command::Run(run_args) => run_tests(run_args, env, args.verbose).await,
        cli::Command::Worker(worker_args) => {
            worker::worker_main::run(worker_args.exec, worker_args.memory_tracking).await?;
            Ok(0)
        }
        cli::Command::List(list_args) => {
            list_tests(list_args, &env)?;
            Ok(0)
        }
    }
}

async fn run_tests(args: cli::RunArgs, env: EnvConfig, verbose: bool) -> Result<i32> {
    let file = load_config_file(args.config.as_ref(), &env)?;
    if env.has_any() {
        debug!("Applying TESTLANE_* environment overrides");
    }
    let config = AppConfig::resolve(args.overrides(), &env, file)?;

    let (source, worker_count) = match &args.replay {
        Some(replay) => {
            let (path, label) = locator::parse_replay_spec(replay)?;
            (TestSource::Replay(ReplayLog::open(&path, label)?), 1)
        }
        None => {
            let units = locate_units(&args.names, config.manifest.as_ref())?;
            (TestSource::Live(units), config.workers)
        }
    };

    if source.is_empty() {
        warn!("No tests to run");
    } else {
        debug!("{} test(s) queued", source.len());
    }

    let spec = match &source {
        TestSource::Live(_) => WorkerSpec::current_exe(
            &config.worker_args,
            config.memory_tracking,
            config.require_command()?,
            &generate_token(),
        )
        .context("Cannot locate the testlane executable")?,
        // Replay never spawns a worker.
        TestSource::Replay(_) => WorkerSpec::new("testlane"),
    };

    let mut distributor = Distributor::new(
        source,
        DistributorConfig::new(spec).with_shutdown_grace(config.shutdown_grace),
    );

    distributor.add_listener(config.formatter.stdout_reporter());
    for writer in &config.writers {
        let reporter = writer
            .open()
            .with_context(|| format!("Cannot open report file {}", writer.path.display()))?;
        distributor.add_listener(reporter);
    }

    let status = ExitStatus::new();
    distributor.add_listener(Box::new(ExitStatusListener::new(status.clone())));

    if config.stop_on_error {
        distributor.add_listener(Box::new(StopOnErrorListener::new(
            distributor.cancel_handle(),
        )));
    }

    if let Some(dir) = &config.record_dir {
        let recorder = ReplayLogRecorder::create(dir)
            .with_context(|| format!("Cannot create record directory {}", dir.display()))?;
        distributor.add_listener(Box::new(recorder));
    }

    distributor.add_listener(Box::new(StreamEcho::stderr(verbose)));

    match distributor.run(worker_count).await {
        Ok(_) => Ok(status.code()),
        Err(e @ RunnerError::AllWorkersExited { .. }) => {
            error!("{}", e);
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

fn list_tests(args: cli::ListArgs, env: &EnvConfig) -> Result<()> {
    let file = load_config_file(args.config.as_ref(), env)?;
    let manifest = args.manifest.or(file.manifest);
    let units = locate_units(&args.names, manifest.as_ref())?;

    for unit in &units {
        println!("{:>4}  {}", unit.id, unit.qualified_name());
    }
    info!("{} test(s)", units.len());
    Ok(())
}

/// Explicit path, then `TESTLANE_CONFIG`, then the standard locations.
fn load_config_file(explicit: Option<&PathBuf>, env: &EnvConfig) -> Result<ConfigFile> {
    let path = explicit
        .cloned()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from))
        .or_else(ConfigFile::find);

    match path {
        Some(path) => {
            info!("Loading config from {}", path.display());
            ConfigFile::load(path)
        }
        None => Ok(ConfigFile::default()),
    }
}

/// Names on the command line win over a manifest.
fn locate_units(names: &[String], manifest: Option<&PathBuf>) -> Result<Vec<TestUnit>> {
    if !names.is_empty() {
        return Ok(locator::from_names(names));
    }
    match manifest {
        Some(path) => locator::from_manifest(path),
        None => Ok(Vec::new()),
    }
}
